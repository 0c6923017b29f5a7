//! Single-producer/single-consumer byte ring shared with an IRQ handler.
//!
//! The interrupt handler is the only producer and foreground code the only
//! consumer. Each side publishes its index with one atomic store, so neither
//! needs a lock and the producer never blocks: when the ring is full the
//! byte is dropped.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// `N` slots, of which `N - 1` hold data; full means `next(head) == tail`.
pub struct RingBuffer<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Safety: slots are written only by the producer before it publishes
// `head`, and read only by the consumer before it publishes `tail`.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns `false` if the byte was dropped.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        unsafe {
            (*self.buf.get())[head] = byte;
        }
        self.head.store(next, Ordering::Release);
        true
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let byte = unsafe { (*self.buf.get())[tail] };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(byte)
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let ring = RingBuffer::<8>::new();
        for b in b"abc" {
            assert!(ring.push(*b));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(b'a'));
        assert_eq!(ring.pop(), Some(b'b'));
        assert_eq!(ring.pop(), Some(b'c'));
        assert_eq!(ring.pop(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_ring_drops_newest() {
        let ring = RingBuffer::<4>::new();
        assert_eq!(ring.capacity(), 3);
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert!(!ring.push(4));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(1));
        assert!(ring.push(5));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), Some(5));
    }

    #[test]
    fn indices_wrap_many_times() {
        let ring = RingBuffer::<5>::new();
        for round in 0..100u8 {
            assert!(ring.push(round));
            assert!(ring.push(round.wrapping_mul(3)));
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round.wrapping_mul(3)));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn producer_thread_and_consumer_agree() {
        use std::sync::Arc;

        let ring = Arc::new(RingBuffer::<16>::new());
        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for b in 0..200u8 {
                    while !ring.push(b) {
                        std::hint::spin_loop();
                    }
                }
            })
        };
        let mut next = 0u8;
        while next < 200 {
            if let Some(b) = ring.pop() {
                assert_eq!(b, next);
                next += 1;
            }
        }
        producer.join().unwrap();
    }
}
