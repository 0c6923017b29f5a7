//! Interrupt-disable critical sections.
//!
//! Code that shares multi-step state with an interrupt handler (the task
//! table, the bank register during a scroll) brackets it with
//! [`InterruptControl::without_interrupts`]. The kernel uses [`Cpu`]; tests
//! substitute a recorder.

use spin::{Mutex, MutexGuard};

pub trait InterruptControl {
    fn without_interrupts<R, F: FnOnce() -> R>(&self, f: F) -> R;
}

impl<I: InterruptControl> InterruptControl for &I {
    fn without_interrupts<R, F: FnOnce() -> R>(&self, f: F) -> R {
        (**self).without_interrupts(f)
    }
}

/// The real CPU: `cli` on entry, previous IF state restored on exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cpu;

impl InterruptControl for Cpu {
    #[inline]
    fn without_interrupts<R, F: FnOnce() -> R>(&self, f: F) -> R {
        x86_64::instructions::interrupts::without_interrupts(f)
    }
}

/// Sleep until the next interrupt.
#[inline]
pub fn wait_for_interrupt() {
    x86_64::instructions::hlt();
}

pub fn halt_forever() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

/// A spin lock that foreground code only holds with interrupts disabled.
///
/// A holder can then never be preempted, so a task that is killed or
/// switched away from can not leave the lock taken. Interrupt handlers use
/// [`try_lock`](Self::try_lock) and skip their work when it fails.
pub struct IrqMutex<T, I = Cpu> {
    inner: Mutex<T>,
    irq: I,
}

impl<T> IrqMutex<T, Cpu> {
    pub const fn new(value: T) -> Self {
        Self::with_irq(value, Cpu)
    }
}

impl<T, I: InterruptControl> IrqMutex<T, I> {
    pub const fn with_irq(value: T, irq: I) -> Self {
        Self {
            inner: Mutex::new(value),
            irq,
        }
    }

    /// Runs `f` on the protected value inside one critical section.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.irq.without_interrupts(|| f(&mut self.inner.lock()))
    }

    /// Interrupt context only.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}

/// How long a driver polls a device status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Spin until the device answers; a dead device hangs the caller.
    Unbounded,
    /// Give up after this many polls.
    Bounded(u32),
}

impl WaitPolicy {
    /// Polls `ready` until it returns `true`. Returns `false` when a bounded
    /// policy runs out of attempts.
    pub fn wait_until(self, mut ready: impl FnMut() -> bool) -> bool {
        match self {
            WaitPolicy::Unbounded => {
                while !ready() {
                    core::hint::spin_loop();
                }
                true
            }
            WaitPolicy::Bounded(polls) => (0..polls).any(|_| ready()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingIrq;
    use super::{IrqMutex, WaitPolicy};

    #[test]
    fn bounded_wait_gives_up() {
        let mut polls = 0;
        assert!(!WaitPolicy::Bounded(5).wait_until(|| {
            polls += 1;
            false
        }));
        assert_eq!(polls, 5);
    }

    #[test]
    fn waits_stop_at_first_ready_poll() {
        let mut polls = 0;
        assert!(WaitPolicy::Unbounded.wait_until(|| {
            polls += 1;
            polls == 3
        }));
        assert_eq!(polls, 3);
        assert!(WaitPolicy::Bounded(10).wait_until(|| true));
    }

    #[test]
    fn irq_mutex_holds_the_lock_inside_a_critical_section() {
        let cell = IrqMutex::with_irq(0u32, RecordingIrq::default());
        cell.lock(|v| {
            assert!(cell.irq.inside.get());
            // an interrupt handler arriving now would back off
            assert!(cell.try_lock().is_none());
            *v += 1;
        });
        assert!(!cell.irq.inside.get());
        assert_eq!(cell.irq.sections.get(), 1);
        assert_eq!(*cell.try_lock().unwrap(), 1);
    }
}
