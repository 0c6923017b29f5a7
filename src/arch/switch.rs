//! Timer entry stub and the context switch.
//!
//! `timer_entry` pushes the general purpose registers in the order of
//! [`TrapFrame`](chocola::task::TrapFrame), hands the frame's address to
//! [`timer_dispatch`] and resumes whatever frame the returned stack pointer
//! addresses. Interrupts stay off from entry to `iretq`.

use core::arch::global_asm;
use core::sync::atomic::Ordering;

use super::pic::{end_of_interrupt, InterruptIndex};
use crate::kernel::{tasks, CONSOLE, MOUSE, SCHEDULER, TICKS};

extern "C" {
    pub fn timer_entry();
    pub fn task_exit_trampoline();
}

global_asm!(
    ".global timer_entry",
    "timer_entry:",
    "push rax",
    "push rbx",
    "push rcx",
    "push rdx",
    "push rsi",
    "push rdi",
    "push rbp",
    "push r8",
    "push r9",
    "push r10",
    "push r11",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov rdi, rsp",
    "cld",
    "call {dispatch}",
    "mov rsp, rax",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop r11",
    "pop r10",
    "pop r9",
    "pop r8",
    "pop rbp",
    "pop rdi",
    "pop rsi",
    "pop rdx",
    "pop rcx",
    "pop rbx",
    "pop rax",
    "iretq",
    "",
    // A task's entry point returns here; realign for the call.
    ".global task_exit_trampoline",
    "task_exit_trampoline:",
    "and rsp, -16",
    "call {finish}",
    "ud2",
    dispatch = sym timer_dispatch,
    finish = sym tasks::task_finished,
);

/// Runs on the interrupted task's stack with interrupts disabled. Returns
/// the stack pointer of the task to resume.
extern "C" fn timer_dispatch(rsp: usize) -> usize {
    TICKS.fetch_add(1, Ordering::Relaxed);

    // foreground holds the console only with interrupts off; this never
    // spins on a preempted owner
    if let Some(mut console) = CONSOLE.try_lock() {
        if let Some(console) = console.as_mut() {
            console.on_tick(MOUSE.position());
        }
    }

    unsafe { end_of_interrupt(InterruptIndex::Timer) };

    match SCHEDULER.try_lock() {
        Some(mut scheduler) => scheduler
            .as_mut()
            .map_or(rsp, |scheduler| scheduler.on_timer_tick(rsp)),
        None => rsp,
    }
}
