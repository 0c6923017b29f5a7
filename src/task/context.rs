//! Saved register frames and the initial frame of a new task.
//!
//! The timer entry stub pushes the general purpose registers on top of the
//! frame the CPU pushed, hands the resulting stack pointer to the scheduler
//! and pops whatever frame the returned pointer addresses before `iretq`.
//! A task that has never run is given a frame of the same shape so it can
//! be resumed like any interrupted task.
//!
//! ```text
//! high   ┌──────────────────┐ <- stack top (16-byte aligned)
//!        │ exit trampoline  │    return address of `entry`
//!        ├──────────────────┤
//!        │ ss rsp rflags    │
//!        │ cs rip           │    what `iretq` consumes
//!        ├──────────────────┤
//!        │ rax .. r15       │    zeroed
//! low    └──────────────────┘ <- saved stack pointer
//! ```

use core::mem;

/// Interrupt enable flag plus the always-one reserved bit.
pub const INITIAL_RFLAGS: u64 = 0x202;

/// Register state as laid out on a suspended task's stack, lowest address
/// first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

pub const TRAP_FRAME_SIZE: usize = mem::size_of::<TrapFrame>();

/// Platform values every new task starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextTemplate {
    pub code_selector: u16,
    pub data_selector: u16,
    /// Where a returning entry point lands.
    pub exit_trampoline: usize,
}

/// Everything needed to start a task as if it had just been interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialContext {
    pub entry: usize,
    pub flags: u64,
    pub template: ContextTemplate,
}

impl InitialContext {
    pub fn new(entry: usize, template: ContextTemplate) -> Self {
        Self {
            entry,
            flags: INITIAL_RFLAGS,
            template,
        }
    }

    /// Bytes of stack the initial frame occupies.
    pub const fn footprint() -> usize {
        TRAP_FRAME_SIZE + mem::size_of::<u64>()
    }
}

/// Writes the initial frame for `ctx` below `stack_top` and returns the
/// stack pointer to store in the task's control block.
///
/// # Safety
/// `[stack_top - InitialContext::footprint() - 15, stack_top)` must be
/// writable memory owned by the new task.
pub unsafe fn materialize(ctx: &InitialContext, stack_top: usize) -> usize {
    let top = stack_top & !0xF;
    let return_slot = top - mem::size_of::<u64>();
    (return_slot as *mut u64).write(ctx.template.exit_trampoline as u64);

    let frame_addr = return_slot - TRAP_FRAME_SIZE;
    (frame_addr as *mut TrapFrame).write(TrapFrame {
        rip: ctx.entry as u64,
        cs: u64::from(ctx.template.code_selector),
        rflags: ctx.flags,
        rsp: return_slot as u64,
        ss: u64::from(ctx.template.data_selector),
        ..TrapFrame::default()
    });
    frame_addr
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: ContextTemplate = ContextTemplate {
        code_selector: 0x08,
        data_selector: 0x10,
        exit_trampoline: 0xdead_0000,
    };

    #[test]
    fn frame_layout_matches_push_order() {
        assert_eq!(TRAP_FRAME_SIZE, 20 * 8);
        assert_eq!(mem::offset_of!(TrapFrame, rax), 14 * 8);
        assert_eq!(mem::offset_of!(TrapFrame, rip), 15 * 8);
        assert_eq!(mem::offset_of!(TrapFrame, ss), 19 * 8);
    }

    #[test]
    fn initial_frame_resumes_at_entry_with_interrupts_on() {
        let mut stack = vec![0u64; 64];
        let top = stack.as_mut_ptr() as usize + 64 * 8;
        let ctx = InitialContext::new(0x1234_5678, TEMPLATE);

        let sp = unsafe { materialize(&ctx, top) };
        let frame = unsafe { *(sp as *const TrapFrame) };

        assert_eq!(frame.rip, 0x1234_5678);
        assert_eq!(frame.cs, 0x08);
        assert_eq!(frame.ss, 0x10);
        assert_ne!(frame.rflags & 0x200, 0);
        assert_eq!(frame.rax, 0);
        assert_eq!(frame.r15, 0);
        assert_eq!(top - sp, InitialContext::footprint());
    }

    #[test]
    fn entry_returns_into_exit_trampoline() {
        let mut stack = vec![0u64; 64];
        // Deliberately misaligned top.
        let top = stack.as_mut_ptr() as usize + 64 * 8 - 4;
        let sp = unsafe { materialize(&InitialContext::new(0x1000, TEMPLATE), top) };
        let frame = unsafe { *(sp as *const TrapFrame) };

        let return_address = unsafe { *(frame.rsp as *const u64) };
        assert_eq!(return_address, TEMPLATE.exit_trampoline as u64);
        // Call convention: rsp + 8 is 16-byte aligned on function entry.
        assert_eq!((frame.rsp + 8) % 16, 0);
    }
}
