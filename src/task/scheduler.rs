//! Preemptive round-robin scheduler.
//!
//! # Task lifecycle
//! 1. Slot 0 describes the boot context (the shell) and is active from the
//!    start; it runs on the boot stack.
//! 2. `spawn` takes a stack from the heap, writes an initial trap frame on
//!    it and marks the slot active.
//! 3. Every timer tick calls `on_timer_tick` with the interrupted stack
//!    pointer and resumes whatever pointer it returns.
//! 4. A task becomes inactive when its entry point returns (through the
//!    exit trampoline) or when it is killed. Inactive slots other than the
//!    running one are recycled by later spawns, stack included.

use core::fmt;
use core::ptr::NonNull;

use crate::config::{MAX_TASKS, TASK_STACK_SIZE};
use crate::cpu::InterruptControl;
use crate::memory::LockedHeap;

use super::context::{materialize, ContextTemplate, InitialContext};

pub type TaskId = usize;

/// Entry point of a spawned task. Returning from it ends the task.
pub type TaskEntry = extern "C" fn();

pub const TASK_NAME_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    OutOfMemory,
    TaskTableFull,
    InvalidTaskId,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::OutOfMemory => write!(f, "out of memory for task stack"),
            TaskError::TaskTableFull => write!(f, "task table full"),
            TaskError::InvalidTaskId => write!(f, "no such active task"),
        }
    }
}

/// Fixed-size task name, truncated on a character boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName {
    bytes: [u8; TASK_NAME_LEN],
    len: usize,
}

impl TaskName {
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(TASK_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; TASK_NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { bytes, len }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("?")
    }
}

impl fmt::Debug for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// Task control block.
struct Task {
    id: TaskId,
    saved_sp: usize,
    state: TaskState,
    name: TaskName,
    /// Heap stack; `None` for the boot context.
    stack: Option<NonNull<u8>>,
}

/// Row of `ps` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: TaskName,
    pub state: TaskState,
    pub current: bool,
}

pub struct Scheduler {
    tasks: [Option<Task>; MAX_TASKS],
    current: usize,
    template: ContextTemplate,
    stack_size: usize,
    switches: u64,
}

// Safety: stacks are only touched through the owning scheduler.
unsafe impl Send for Scheduler {}

impl Scheduler {
    pub fn new(template: ContextTemplate) -> Self {
        Self::with_stack_size(template, TASK_STACK_SIZE)
    }

    pub fn with_stack_size(template: ContextTemplate, stack_size: usize) -> Self {
        let mut tasks = [const { None }; MAX_TASKS];
        tasks[0] = Some(Task {
            id: 0,
            saved_sp: 0,
            state: TaskState::Active,
            name: TaskName::new("shell"),
            stack: None,
        });
        Self {
            tasks,
            current: 0,
            template,
            stack_size,
            switches: 0,
        }
    }

    fn is_active(&self, slot: usize) -> bool {
        matches!(&self.tasks[slot], Some(t) if t.state == TaskState::Active)
    }

    /// First empty slot, otherwise the first finished task that is not the
    /// one currently running on its stack.
    fn free_slot(&self) -> Option<usize> {
        self.tasks
            .iter()
            .position(Option::is_none)
            .or_else(|| (1..MAX_TASKS).find(|&i| i != self.current && !self.is_active(i)))
    }

    pub fn spawn<I: InterruptControl>(
        &mut self,
        heap: &LockedHeap<I>,
        entry: TaskEntry,
        name: &str,
    ) -> Result<TaskId, TaskError> {
        let slot = self.free_slot().ok_or(TaskError::TaskTableFull)?;
        let stack = heap
            .allocate(self.stack_size)
            .map_err(|_| TaskError::OutOfMemory)?;

        if let Some(old) = self.tasks[slot].take().and_then(|t| t.stack) {
            // Safety: the slot is inactive and not running, nothing uses
            // its stack any more.
            unsafe { heap.free(old) };
        }

        let ctx = InitialContext::new(entry as usize, self.template);
        // Safety: the whole stack was just handed to us by the heap.
        let saved_sp = unsafe { materialize(&ctx, stack.as_ptr() as usize + self.stack_size) };

        self.tasks[slot] = Some(Task {
            id: slot,
            saved_sp,
            state: TaskState::Active,
            name: TaskName::new(name),
            stack: Some(stack),
        });
        Ok(slot)
    }

    /// Called once per timer interrupt with the stack pointer of the
    /// interrupted context; returns the stack pointer to resume.
    pub fn on_timer_tick(&mut self, sp: usize) -> usize {
        if let Some(task) = self.tasks[self.current].as_mut() {
            task.saved_sp = sp;
        }

        let mut next = self.current;
        for _ in 0..MAX_TASKS {
            next = (next + 1) % MAX_TASKS;
            if self.is_active(next) {
                break;
            }
        }
        if next == self.current || !self.is_active(next) {
            return sp;
        }

        self.current = next;
        self.switches += 1;
        self.tasks[next].as_ref().map_or(sp, |t| t.saved_sp)
    }

    /// Marks a task inactive. A task killing itself keeps running until
    /// the next tick.
    pub fn kill(&mut self, id: TaskId) -> Result<(), TaskError> {
        match self.tasks.get_mut(id) {
            Some(Some(task)) if task.state == TaskState::Active => {
                task.state = TaskState::Inactive;
                Ok(())
            }
            _ => Err(TaskError::InvalidTaskId),
        }
    }

    /// Ends the running task; used by the exit trampoline.
    pub fn exit_current(&mut self) {
        if let Some(task) = self.tasks[self.current].as_mut() {
            task.state = TaskState::Inactive;
        }
    }

    pub fn current(&self) -> TaskId {
        self.current
    }

    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn active_count(&self) -> usize {
        (0..MAX_TASKS).filter(|&i| self.is_active(i)).count()
    }

    pub fn tasks(&self) -> impl Iterator<Item = TaskInfo> + '_ {
        self.tasks.iter().flatten().map(move |t| TaskInfo {
            id: t.id,
            name: t.name,
            state: t.state,
            current: t.id == self.current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::testing::NoIrq;
    use crate::task::context::TrapFrame;

    const TEMPLATE: ContextTemplate = ContextTemplate {
        code_selector: 0x08,
        data_selector: 0x10,
        exit_trampoline: 0x4000,
    };
    const STACK: usize = 1024;

    extern "C" fn worker() {}

    struct Rig {
        _mem: Vec<u64>,
        heap: LockedHeap<NoIrq>,
        sched: Scheduler,
    }

    fn rig(arena_bytes: usize) -> Rig {
        let mut mem = vec![0u64; arena_bytes / 8];
        let heap = LockedHeap::with_irq(NoIrq);
        unsafe { heap.init(mem.as_mut_ptr() as usize, arena_bytes).unwrap() };
        Rig {
            _mem: mem,
            heap,
            sched: Scheduler::with_stack_size(TEMPLATE, STACK),
        }
    }

    /// Drives `ticks` timer interrupts, each "interrupting" the running
    /// task at a distinct fake stack pointer, and records who runs next.
    fn run_ticks(sched: &mut Scheduler, ticks: usize) -> Vec<TaskId> {
        (0..ticks)
            .map(|i| {
                sched.on_timer_tick(0x10_0000 + i * 0x100);
                sched.current()
            })
            .collect()
    }

    #[test]
    fn lone_task_keeps_its_stack_pointer() {
        let mut r = rig(64 * 1024);
        assert_eq!(r.sched.on_timer_tick(0xabc0), 0xabc0);
        assert_eq!(r.sched.current(), 0);
        assert_eq!(r.sched.switches(), 0);
    }

    #[test]
    fn four_tasks_eight_ticks_each_run_twice() {
        let mut r = rig(64 * 1024);
        for name in ["a", "b", "c"] {
            r.sched.spawn(&r.heap, worker, name).unwrap();
        }
        let order = run_ticks(&mut r.sched, 8);
        assert_eq!(order, vec![1, 2, 3, 0, 1, 2, 3, 0]);
        for id in 0..4 {
            assert_eq!(order.iter().filter(|&&t| t == id).count(), 2);
        }
    }

    #[test]
    fn every_task_selected_once_before_any_repeats() {
        let mut r = rig(64 * 1024);
        for _ in 0..5 {
            r.sched.spawn(&r.heap, worker, "w").unwrap();
        }
        let order = run_ticks(&mut r.sched, 6);
        let mut seen = order.clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn switching_back_resumes_saved_pointer() {
        let mut r = rig(64 * 1024);
        r.sched.spawn(&r.heap, worker, "w").unwrap();
        let task_sp = r.sched.on_timer_tick(0x7777_0000);
        let frame = unsafe { *(task_sp as *const TrapFrame) };
        assert_eq!(frame.rip, worker as usize as u64);
        assert_eq!(r.sched.on_timer_tick(task_sp - 64), 0x7777_0000);
        assert_eq!(r.sched.on_timer_tick(0x7777_1000), task_sp - 64);
    }

    #[test]
    fn killed_task_drops_out_without_reordering() {
        let mut r = rig(64 * 1024);
        for _ in 0..3 {
            r.sched.spawn(&r.heap, worker, "w").unwrap();
        }
        r.sched.kill(2).unwrap();
        assert_eq!(run_ticks(&mut r.sched, 6), vec![1, 3, 0, 1, 3, 0]);
    }

    #[test]
    fn kill_rejects_unknown_and_finished_ids() {
        let mut r = rig(64 * 1024);
        let id = r.sched.spawn(&r.heap, worker, "w").unwrap();
        assert_eq!(r.sched.kill(MAX_TASKS), Err(TaskError::InvalidTaskId));
        assert_eq!(r.sched.kill(id + 1), Err(TaskError::InvalidTaskId));
        assert_eq!(r.sched.kill(id), Ok(()));
        assert_eq!(r.sched.kill(id), Err(TaskError::InvalidTaskId));
    }

    #[test]
    fn exited_task_is_switched_away_from() {
        let mut r = rig(64 * 1024);
        r.sched.spawn(&r.heap, worker, "w").unwrap();
        r.sched.on_timer_tick(0x5000);
        assert_eq!(r.sched.current(), 1);
        r.sched.exit_current();
        assert_eq!(r.sched.on_timer_tick(0x6000), 0x5000);
        assert_eq!(r.sched.current(), 0);
        assert_eq!(r.sched.on_timer_tick(0x5100), 0x5100);
    }

    #[test]
    fn running_task_killed_by_itself_finishes_its_slice() {
        let mut r = rig(64 * 1024);
        for _ in 0..3 {
            r.sched.spawn(&r.heap, worker, "w").unwrap();
        }
        r.sched.on_timer_tick(0x5000);
        assert_eq!(r.sched.current(), 1);
        assert_eq!(r.sched.kill(1), Ok(()));
        assert_eq!(r.sched.current(), 1);
        assert_eq!(r.sched.active_count(), 3);

        r.sched.on_timer_tick(0x9000);
        assert_eq!(r.sched.current(), 2);
        assert_eq!(run_ticks(&mut r.sched, 6), vec![3, 0, 2, 3, 0, 2]);
        assert_eq!(r.sched.kill(1), Err(TaskError::InvalidTaskId));
    }

    #[test]
    fn full_table_is_reported_before_allocating() {
        let mut r = rig(64 * 1024);
        for _ in 1..MAX_TASKS {
            r.sched.spawn(&r.heap, worker, "w").unwrap();
        }
        let before = r.heap.stats();
        assert_eq!(r.sched.spawn(&r.heap, worker, "x"), Err(TaskError::TaskTableFull));
        assert_eq!(r.heap.stats(), before);
    }

    #[test]
    fn exhausted_heap_fails_spawn_cleanly() {
        let mut r = rig(2 * 1024);
        r.sched.spawn(&r.heap, worker, "w").unwrap();
        assert_eq!(r.sched.spawn(&r.heap, worker, "x"), Err(TaskError::OutOfMemory));
        assert_eq!(r.sched.tasks().count(), 2);
        assert_eq!(r.sched.active_count(), 2);
    }

    #[test]
    fn finished_slot_and_stack_are_recycled() {
        let mut r = rig(64 * 1024);
        for _ in 1..MAX_TASKS {
            r.sched.spawn(&r.heap, worker, "w").unwrap();
        }
        let used_before = r.heap.stats().used;
        r.sched.kill(3).unwrap();
        assert_eq!(r.sched.spawn(&r.heap, worker, "again"), Ok(3));
        assert_eq!(r.heap.stats().used, used_before);
        let info = r.sched.tasks().find(|t| t.id == 3).unwrap();
        assert_eq!(info.name.as_str(), "again");
        assert_eq!(info.state, TaskState::Active);
    }

    #[test]
    fn running_task_slot_is_not_recycled() {
        let mut r = rig(64 * 1024);
        for _ in 1..MAX_TASKS {
            r.sched.spawn(&r.heap, worker, "w").unwrap();
        }
        r.sched.on_timer_tick(0x1000);
        r.sched.exit_current();
        assert_eq!(r.sched.spawn(&r.heap, worker, "x"), Err(TaskError::TaskTableFull));
    }

    #[test]
    fn names_are_truncated() {
        let name = TaskName::new("a-very-long-task-name");
        assert_eq!(name.as_str(), "a-very-long-task");
        let mut r = rig(64 * 1024);
        let infos: Vec<_> = r.sched.tasks().collect();
        assert_eq!(infos[0].name.as_str(), "shell");
        assert!(infos[0].current);
        r.sched.spawn(&r.heap, worker, "w").unwrap();
    }
}
