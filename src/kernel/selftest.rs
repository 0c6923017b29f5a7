//! # Self test
//!
//! Exercises the live kernel components from the shell. Each check logs
//! its progress on the serial port and adds one summary line to the result.
//!
//! - heap: allocate and free, usage returns to where it started
//! - ring: fill past capacity, drain in order
//! - tasks: spawn an idle task, kill it
//! - disk: read the directory if a data disk is attached

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use chocola::input::RingBuffer;
use chocola::println;

use super::{kill_task, list_files, spawn_task, tasks, ALLOCATOR, FS};

static RUNS: AtomicUsize = AtomicUsize::new(0);

pub fn run_all() -> String {
    let run = RUNS.fetch_add(1, Ordering::Relaxed) + 1;
    println!("SELFTEST: run {}", run);

    let mut result = String::new();
    for (name, check) in [
        ("heap", test_heap as fn() -> Result<(), String>),
        ("ring", test_ring),
        ("tasks", test_tasks),
        ("disk", test_disk),
    ] {
        match check() {
            Ok(()) => result.push_str(&format!("  ✓ {}\n", name)),
            Err(e) => result.push_str(&format!("  ✗ {}: {}\n", name, e)),
        }
    }
    result
}

fn test_heap() -> Result<(), String> {
    let before = ALLOCATOR.stats();
    println!("SELFTEST: heap used {} bytes in {} blocks", before.used, before.blocks);
    {
        let small: Vec<u64> = (0..16).collect();
        let large: Vec<u8> = alloc::vec![0xA5; 8 * 1024];
        if small.iter().sum::<u64>() != 120 || large.iter().any(|&b| b != 0xA5) {
            return Err(String::from("allocation contents corrupted"));
        }
    }
    let after = ALLOCATOR.stats();
    if after.used != before.used {
        return Err(format!("{} bytes leaked", after.used - before.used));
    }
    Ok(())
}

fn test_ring() -> Result<(), String> {
    let ring: RingBuffer<8> = RingBuffer::new();
    let accepted = (0u8..10).filter(|&b| ring.push(b)).count();
    if accepted != ring.capacity() {
        return Err(format!("accepted {} of {}", accepted, ring.capacity()));
    }
    let drained: Vec<u8> = core::iter::from_fn(|| ring.pop()).collect();
    if drained != [0, 1, 2, 3, 4, 5, 6] {
        return Err(String::from("bytes out of order"));
    }
    Ok(())
}

fn test_tasks() -> Result<(), String> {
    let entry = tasks::lookup("idle").ok_or_else(|| String::from("no idle task"))?;
    let id = spawn_task(entry, "selftest").map_err(|e| format!("spawn: {}", e))?;
    println!("SELFTEST: spawned task {}", id);
    kill_task(id).map_err(|e| format!("kill: {}", e))?;
    if kill_task(id).is_ok() {
        return Err(String::from("task killed twice"));
    }
    Ok(())
}

fn test_disk() -> Result<(), String> {
    if FS.lock().is_none() {
        println!("SELFTEST: no data disk, skipped");
        return Ok(());
    }
    let files = list_files().map_err(|e| format!("{}", e))?;
    println!("SELFTEST: {} file(s) on disk", files.len());
    Ok(())
}
