//! Kernel-wide tunables. Everything is fixed at build time.

/// Timer interrupt rate.
pub const TIMER_HZ: u32 = 100;

/// Size of the heap arena handed to the first-fit allocator.
pub const HEAP_SIZE: usize = 1024 * 1024;

/// Stack given to every spawned task.
pub const TASK_STACK_SIZE: usize = 16 * 1024;

/// Task control block slots, including slot 0 (the shell).
pub const MAX_TASKS: usize = 8;

/// Keyboard ring capacity (one slot is always kept free).
pub const KBD_BUF_SIZE: usize = 32;

/// Shell line buffer, including the terminator slot.
pub const CMD_BUF_SIZE: usize = 64;

/// Remembered shell lines.
pub const HISTORY_LEN: usize = 8;

/// Largest file accepted by the `write` shell command.
pub const FILE_BUF_SIZE: usize = 2048;

/// Graphics mode programmed through the Bochs VBE interface.
pub const SCREEN_WIDTH: usize = 800;
pub const SCREEN_HEIGHT: usize = 600;
pub const SCREEN_BPP: usize = 32;

/// The data disk sits on the primary channel next to the boot disk.
pub const DATA_DRIVE: crate::storage::ata::Drive = crate::storage::ata::Drive::Slave;
