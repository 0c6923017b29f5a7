//! PS/2 keyboard: scan-code set 1 translation and the IRQ1-fed key queue.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::KBD_BUF_SIZE;

use super::ring::RingBuffer;

pub const EXTENDED_PREFIX: u8 = 0xE0;

/// Queue sentinels for the extended arrow keys; they never collide with
/// the 7-bit characters produced by the table.
pub const KEY_UP: u8 = 0x80;
pub const KEY_DOWN: u8 = 0x81;

const RELEASE_BIT: u8 = 0x80;

/// US layout, unshifted. Zero means "no character".
#[rustfmt::skip]
static SET1_US: [u8; 0x3A] = [
    0,    0x1B, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08,
    b'\t', b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n',
    0,    b'a', b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`',
    0,    b'\\', b'z', b'x', b'c', b'v', b'b', b'n', b'm', b',', b'.', b'/', 0,
    b'*', 0,    b' ',
];

/// Maps one scancode to a queued key. `extended` is set when the previous
/// byte was the `0xE0` prefix.
pub fn translate(scancode: u8, extended: bool) -> Option<u8> {
    if scancode & RELEASE_BIT != 0 {
        return None;
    }
    if extended {
        return match scancode {
            0x48 => Some(KEY_UP),
            0x50 => Some(KEY_DOWN),
            _ => None,
        };
    }
    match SET1_US.get(usize::from(scancode)) {
        Some(&0) | None => None,
        Some(&ch) => Some(ch),
    }
}

/// Decoder state plus the key queue. The IRQ handler calls
/// [`on_scancode`](Self::on_scancode); one foreground reader calls
/// [`read_char`](Self::read_char).
pub struct Keyboard {
    extended: AtomicBool,
    queue: RingBuffer<KBD_BUF_SIZE>,
}

impl Keyboard {
    pub const fn new() -> Self {
        Self {
            extended: AtomicBool::new(false),
            queue: RingBuffer::new(),
        }
    }

    /// Interrupt context. Never blocks; keys are dropped when the queue is
    /// full.
    pub fn on_scancode(&self, scancode: u8) {
        if scancode == EXTENDED_PREFIX {
            self.extended.store(true, Ordering::Relaxed);
            return;
        }
        let extended = self.extended.swap(false, Ordering::Relaxed);
        if let Some(key) = translate(scancode, extended) {
            self.queue.push(key);
        }
    }

    pub fn try_read(&self) -> Option<u8> {
        self.queue.pop()
    }

    /// Blocks until a key is available, calling `wait` between polls.
    /// Never call this from an interrupt handler.
    pub fn read_char(&self, mut wait: impl FnMut()) -> u8 {
        loop {
            if let Some(key) = self.queue.pop() {
                return key;
            }
            wait();
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}
