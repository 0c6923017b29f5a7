//! Kernel-wide instances and the primitive operations the shell is built
//! on. Each component has exactly one owner here, created during boot.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU64, Ordering};

use chocola::cpu::{self, Cpu, InterruptControl, IrqMutex};
use chocola::display::{Console, VgaWindow};
use chocola::input::{Edit, Keyboard, LineEditor, Mouse};
use chocola::memory::{LockedHeap, MemoryReport};
use chocola::storage::{AtaPio, DeviceError, DirEntry, FileSystem, FsError, PortBus};
use chocola::task::{Scheduler, TaskEntry, TaskError, TaskId, TaskInfo};
use spin::{Mutex, Once};

/// Writes to the graphics console.
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::kernel::console_write(format_args!($($arg)*))
    };
}

macro_rules! kprintln {
    () => {
        kprint!("\n")
    };
    ($($arg:tt)*) => {{
        kprint!($($arg)*);
        kprint!("\n");
    }};
}

pub mod init;
pub mod selftest;
pub mod shell;
pub mod tasks;

pub use init::init_kernel;

pub type KernelConsole = Console<VgaWindow>;
pub type DataDisk = FileSystem<AtaPio<PortBus>>;

#[global_allocator]
pub static ALLOCATOR: LockedHeap = LockedHeap::new();

pub static TICKS: AtomicU64 = AtomicU64::new(0);
pub static KEYBOARD: Keyboard = Keyboard::new();
pub static MOUSE: Mouse = Mouse::new();
/// Held with interrupts off so a preempted or killed task never owns it.
pub static CONSOLE: IrqMutex<Option<KernelConsole>> = IrqMutex::new(None);
/// Locked only with interrupts disabled; the timer handler owns it otherwise.
pub static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);
pub static FS: Mutex<Option<DataDisk>> = Mutex::new(None);
pub static MEMORY_MAP: Once<MemoryReport> = Once::new();

pub fn console_write(args: fmt::Arguments) {
    CONSOLE.lock(|console| {
        if let Some(console) = console.as_mut() {
            let _ = console.write_fmt(args);
        }
    });
}

pub fn with_console<R>(f: impl FnOnce(&mut KernelConsole) -> R) -> Option<R> {
    CONSOLE.lock(|console| console.as_mut().map(f))
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Sleeps the calling task for at least `n` timer ticks.
pub fn sleep_ticks(n: u64) {
    let until = ticks() + n;
    while ticks() < until {
        cpu::wait_for_interrupt();
    }
}

/// Reads one edited line from the keyboard, echoing on the console.
pub fn read_line(editor: &mut LineEditor) -> String {
    loop {
        let key = KEYBOARD.read_char(cpu::wait_for_interrupt);
        match editor.feed(key) {
            Edit::Ignored => {}
            Edit::Echo(ch) => {
                with_console(|c| c.put_char(ch));
            }
            Edit::Erase => {
                with_console(|c| c.put_char(0x08));
            }
            Edit::Recall { erased } => {
                with_console(|c| {
                    for _ in 0..erased {
                        c.put_char(0x08);
                    }
                    c.put_string(editor.line());
                });
            }
            Edit::Submit => {
                with_console(|c| c.put_char(b'\n'));
                return editor.submit();
            }
        }
    }
}

fn with_fs<R>(f: impl FnOnce(&mut DataDisk) -> Result<R, FsError>) -> Result<R, FsError> {
    match FS.lock().as_mut() {
        Some(fs) => f(fs),
        None => Err(FsError::Device(DeviceError::Fault)),
    }
}

pub fn list_files() -> Result<Vec<DirEntry>, FsError> {
    with_fs(|fs| fs.list())
}

pub fn read_file(name: &str) -> Result<Vec<u8>, FsError> {
    with_fs(|fs| fs.read(name))
}

pub fn write_file(name: &str, data: &[u8]) -> Result<DirEntry, FsError> {
    with_fs(|fs| fs.write(name, data))
}

pub fn delete_file(name: &str) -> Result<(), FsError> {
    with_fs(|fs| fs.delete(name))
}

fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> Result<R, TaskError>) -> Result<R, TaskError> {
    Cpu.without_interrupts(|| match SCHEDULER.lock().as_mut() {
        Some(scheduler) => f(scheduler),
        None => Err(TaskError::InvalidTaskId),
    })
}

pub fn spawn_task(entry: TaskEntry, name: &str) -> Result<TaskId, TaskError> {
    with_scheduler(|s| s.spawn(&ALLOCATOR, entry, name))
}

pub fn kill_task(id: TaskId) -> Result<(), TaskError> {
    with_scheduler(|s| s.kill(id))
}

pub fn list_tasks() -> Vec<TaskInfo> {
    with_scheduler(|s| Ok(s.tasks().collect())).unwrap_or_default()
}
