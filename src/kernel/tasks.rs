//! Background tasks the shell can start, and the path a task takes when its
//! entry point returns.

use chocola::cpu::{self, Cpu, InterruptControl};
use chocola::task::TaskEntry;

use super::{sleep_ticks, with_console, SCHEDULER};

/// Name, entry point, description.
pub const CATALOG: &[(&str, TaskEntry, &str)] = &[
    ("counter", counter, "prints ten numbered lines, then exits"),
    ("spinner", spinner, "animates the top right corner"),
    ("idle", idle, "halts until killed"),
];

pub fn lookup(name: &str) -> Option<TaskEntry> {
    CATALOG
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, entry, _)| *entry)
}

/// Reached through the exit trampoline once an entry point returns. The
/// task stops being scheduled and halts until the next tick moves on.
pub extern "C" fn task_finished() -> ! {
    Cpu.without_interrupts(|| {
        if let Some(scheduler) = SCHEDULER.lock().as_mut() {
            scheduler.exit_current();
        }
    });
    cpu::halt_forever()
}

extern "C" fn counter() {
    for i in 1..=10 {
        kprintln!("[counter] {}", i);
        sleep_ticks(50);
    }
}

extern "C" fn spinner() {
    const FRAMES: &[u8] = b"|/-\\";
    let mut frame = 0;
    loop {
        with_console(|c| {
            let (cols, _) = c.size();
            c.put_char_at(cols - 1, 0, FRAMES[frame]);
        });
        frame = (frame + 1) % FRAMES.len();
        sleep_ticks(10);
    }
}

extern "C" fn idle() {
    loop {
        cpu::wait_for_interrupt();
    }
}
