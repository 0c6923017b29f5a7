//! Preemptive tasking: initial frames (`context`) and the round-robin
//! task table (`scheduler`).

pub mod context;
pub mod scheduler;

pub use context::{materialize, ContextTemplate, InitialContext, TrapFrame};
pub use scheduler::{Scheduler, TaskEntry, TaskError, TaskId, TaskInfo, TaskName, TaskState};
