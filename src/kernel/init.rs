//! Boot sequence. Every phase logs to the serial port; a failing phase
//! aborts the boot except where noted.

use bootloader_api::BootInfo;
use chocola::config::{DATA_DRIVE, HEAP_SIZE, SCREEN_BPP, SCREEN_HEIGHT, SCREEN_WIDTH};
use chocola::cpu::WaitPolicy;
use chocola::display::{vbe, BankedFramebuffer, Console, VgaWindow};
use chocola::input::mouse;
use chocola::memory::{kind_label, MemoryReport};
use chocola::println;
use chocola::storage::{AtaPio, FileSystem, PortBus};
use chocola::task::Scheduler;

use super::{ALLOCATOR, CONSOLE, FS, MEMORY_MAP, MOUSE, SCHEDULER};
use crate::arch;

#[repr(C, align(4096))]
struct HeapSpace([u8; HEAP_SIZE]);

static mut HEAP_SPACE: HeapSpace = HeapSpace([0; HEAP_SIZE]);

const PHASES: usize = 8;

pub fn init_kernel(boot_info: &'static mut BootInfo) -> Result<(), &'static str> {
    println!("========================================");
    println!("       Chocola Kernel Initialization    ");
    println!("========================================\n");

    init_phase(1, "Serial Port", || {
        chocola::serial::init();
        Ok(())
    })?;
    init_phase(2, "Heap", init_heap)?;
    init_phase(3, "Memory Map", || init_memory_map(boot_info))?;
    init_phase(4, "Interrupt System", || {
        arch::init();
        Ok(())
    })?;
    let phys_offset = boot_info.physical_memory_offset.into_option();
    init_phase(5, "Display System", || init_display(phys_offset))?;
    init_phase(6, "Input Devices", init_input)?;
    init_phase(7, "Storage", init_storage)?;
    init_phase(8, "Scheduler", || {
        *SCHEDULER.lock() = Some(Scheduler::new(arch::context_template()));
        Ok(())
    })?;

    x86_64::instructions::interrupts::enable();
    println!("Kernel initialization complete\n");
    Ok(())
}

fn init_phase(
    n: usize,
    name: &'static str,
    init_fn: impl FnOnce() -> Result<(), &'static str>,
) -> Result<(), &'static str> {
    println!("[{}/{}] Initializing {}...", n, PHASES, name);

    match init_fn() {
        Ok(()) => {
            println!("    ✓ {} initialized successfully\n", name);
            Ok(())
        }
        Err(e) => {
            println!("    ✗ {} failed: {}\n", name, e);
            Err(e)
        }
    }
}

fn init_heap() -> Result<(), &'static str> {
    let start = core::ptr::addr_of_mut!(HEAP_SPACE) as usize;
    unsafe { ALLOCATOR.init(start, HEAP_SIZE) }.map_err(|_| "heap arena too small")?;
    let stats = ALLOCATOR.stats();
    println!("    arena {:#x}, {} KiB", start, stats.arena / 1024);
    Ok(())
}

fn init_memory_map(boot_info: &BootInfo) -> Result<(), &'static str> {
    let regions = &*boot_info.memory_regions;
    if regions.is_empty() {
        return Err("bootloader passed no memory map");
    }
    for region in regions.iter() {
        println!(
            "    {:#012x} - {:#012x}  {}",
            region.start,
            region.end,
            kind_label(region.kind)
        );
    }
    let report = MEMORY_MAP.call_once(|| MemoryReport::from_regions(regions));
    println!(
        "    {} regions, {} KiB usable",
        report.regions,
        report.usable / 1024
    );
    Ok(())
}

fn init_display(phys_offset: Option<u64>) -> Result<(), &'static str> {
    let phys_offset = phys_offset.ok_or("physical memory is not mapped")?;
    vbe::set_mode(SCREEN_WIDTH, SCREEN_HEIGHT, SCREEN_BPP)?;

    let window = unsafe { VgaWindow::new(phys_offset) };
    let mut console = Console::new(BankedFramebuffer::new(window, SCREEN_WIDTH, SCREEN_HEIGHT));
    console.clear_screen();
    let (cols, rows) = console.size();
    println!("    {}x{}x{}, {}x{} cells", SCREEN_WIDTH, SCREEN_HEIGHT, SCREEN_BPP, cols, rows);
    CONSOLE.lock(|slot| *slot = Some(console));
    Ok(())
}

/// Mouse failures are logged, not fatal; the keyboard needs no setup.
fn init_input() -> Result<(), &'static str> {
    if let Err(e) = mouse::init(&MOUSE, WaitPolicy::Bounded(100_000)) {
        println!("    warning: mouse unavailable: {}", e);
    }
    Ok(())
}

/// A missing data disk leaves the file commands failing with a device error.
fn init_storage() -> Result<(), &'static str> {
    let mut disk = AtaPio::new(PortBus::primary(), DATA_DRIVE, WaitPolicy::Unbounded);
    if !disk.detect() {
        println!("    warning: no data disk on {:?}", DATA_DRIVE);
        return Ok(());
    }
    let mut fs = FileSystem::new(disk);
    match fs.list() {
        Ok(files) => println!("    {} file(s) on {:?}", files.len(), DATA_DRIVE),
        Err(e) => println!("    warning: directory unreadable: {}", e),
    }
    *FS.lock() = Some(fs);
    Ok(())
}
