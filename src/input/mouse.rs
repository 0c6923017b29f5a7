//! PS/2 mouse: packet decoding and the absolute pointer position.
//!
//! Standard PS/2 mice send 3-byte packets:
//! - Byte 0: status (buttons, always-one bit 3, sign bits, overflow bits)
//! - Byte 1: X movement
//! - Byte 2: Y movement (positive = up)
//!
//! The IRQ12 handler feeds bytes to [`Mouse::on_byte`]; the position is kept
//! in atomics so the timer handler and foreground code can read it without
//! locking.

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::config::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::cpu::WaitPolicy;

const STATUS_ALWAYS_ONE: u8 = 0x08;
const STATUS_X_SIGN: u8 = 0x10;
const STATUS_Y_SIGN: u8 = 0x20;
const STATUS_X_OVERFLOW: u8 = 0x40;
const STATUS_Y_OVERFLOW: u8 = 0x80;
const STATUS_BUTTONS: u8 = 0x07;

/// One decoded packet. `dy` is already in screen orientation (down is
/// positive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseEvent {
    pub dx: i16,
    pub dy: i16,
    /// bit 0 = left, bit 1 = right, bit 2 = middle
    pub buttons: u8,
}

impl MouseEvent {
    #[inline]
    pub fn left_button(&self) -> bool {
        self.buttons & 0x01 != 0
    }

    #[inline]
    pub fn right_button(&self) -> bool {
        self.buttons & 0x02 != 0
    }
}

pub struct MouseDecoder {
    packet: [u8; 3],
    index: usize,
}

impl MouseDecoder {
    pub const fn new() -> Self {
        Self {
            packet: [0; 3],
            index: 0,
        }
    }

    /// Returns an event when the third byte of a packet arrives.
    pub fn process_byte(&mut self, byte: u8) -> Option<MouseEvent> {
        // out of sync: drop bytes until a plausible status byte
        if self.index == 0 && byte & STATUS_ALWAYS_ONE == 0 {
            return None;
        }

        self.packet[self.index] = byte;
        self.index += 1;
        if self.index < 3 {
            return None;
        }
        self.index = 0;
        Some(self.decode())
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    fn decode(&self) -> MouseEvent {
        let status = self.packet[0];
        let dx = delta(
            self.packet[1],
            status & STATUS_X_SIGN != 0,
            status & STATUS_X_OVERFLOW != 0,
        );
        let dy = delta(
            self.packet[2],
            status & STATUS_Y_SIGN != 0,
            status & STATUS_Y_OVERFLOW != 0,
        );
        MouseEvent {
            dx,
            dy: -dy,
            buttons: status & STATUS_BUTTONS,
        }
    }
}

impl Default for MouseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn delta(raw: u8, negative: bool, overflow: bool) -> i16 {
    match (overflow, negative) {
        (true, true) => -256,
        (true, false) => 255,
        (false, true) => i16::from(raw) - 256,
        (false, false) => i16::from(raw),
    }
}

/// Pointer state shared between IRQ12, the timer tick and the shell.
pub struct Mouse {
    decoder: Mutex<MouseDecoder>,
    x: AtomicUsize,
    y: AtomicUsize,
    buttons: AtomicU8,
    width: usize,
    height: usize,
}

impl Mouse {
    /// Pointer starts in the middle of the screen.
    pub const fn new() -> Self {
        Self::with_bounds(SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    pub const fn with_bounds(width: usize, height: usize) -> Self {
        Self {
            decoder: Mutex::new(MouseDecoder::new()),
            x: AtomicUsize::new(width / 2),
            y: AtomicUsize::new(height / 2),
            buttons: AtomicU8::new(0),
            width,
            height,
        }
    }

    /// Interrupt context.
    pub fn on_byte(&self, byte: u8) {
        let event = self.decoder.lock().process_byte(byte);
        if let Some(event) = event {
            self.apply(event);
        }
    }

    fn apply(&self, event: MouseEvent) {
        let x = clamp_axis(self.x.load(Ordering::Relaxed), event.dx, self.width);
        let y = clamp_axis(self.y.load(Ordering::Relaxed), event.dy, self.height);
        self.x.store(x, Ordering::Relaxed);
        self.y.store(y, Ordering::Relaxed);
        self.buttons.store(event.buttons, Ordering::Relaxed);
    }

    pub fn position(&self) -> (usize, usize) {
        (self.x.load(Ordering::Relaxed), self.y.load(Ordering::Relaxed))
    }

    pub fn buttons(&self) -> u8 {
        self.buttons.load(Ordering::Relaxed)
    }

    pub fn reset_decoder(&self) {
        self.decoder.lock().reset();
    }
}

impl Default for Mouse {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_axis(pos: usize, delta: i16, extent: usize) -> usize {
    let max = extent.saturating_sub(1) as i64;
    (pos as i64 + i64::from(delta)).clamp(0, max) as usize
}

// =============================================================================
// CONTROLLER SETUP
// =============================================================================

const DATA_PORT: u16 = 0x60;
const STATUS_PORT: u16 = 0x64;
const ACK: u8 = 0xFA;

struct Controller {
    policy: WaitPolicy,
}

impl Controller {
    fn status() -> u8 {
        unsafe { Port::<u8>::new(STATUS_PORT).read() }
    }

    fn wait_for_write(&self) -> Result<(), &'static str> {
        if self.policy.wait_until(|| Self::status() & 0x02 == 0) {
            Ok(())
        } else {
            Err("PS/2 controller write timeout")
        }
    }

    fn wait_for_read(&self) -> Result<(), &'static str> {
        if self.policy.wait_until(|| Self::status() & 0x01 != 0) {
            Ok(())
        } else {
            Err("PS/2 controller read timeout")
        }
    }

    fn command(&self, cmd: u8) -> Result<(), &'static str> {
        self.wait_for_write()?;
        unsafe { Port::<u8>::new(STATUS_PORT).write(cmd) };
        Ok(())
    }

    fn write_data(&self, data: u8) -> Result<(), &'static str> {
        self.wait_for_write()?;
        unsafe { Port::<u8>::new(DATA_PORT).write(data) };
        Ok(())
    }

    fn read_data(&self) -> Result<u8, &'static str> {
        self.wait_for_read()?;
        Ok(unsafe { Port::<u8>::new(DATA_PORT).read() })
    }

    /// Sends a byte to the auxiliary device and checks its ACK.
    fn mouse_command(&self, cmd: u8) -> Result<(), &'static str> {
        self.command(0xD4)?;
        self.write_data(cmd)?;
        match self.read_data()? {
            ACK => Ok(()),
            _ => Err("Mouse did not ACK command"),
        }
    }
}

/// Enables the auxiliary port, its interrupt and data reporting. Must run
/// before IRQ12 is unmasked.
pub fn init(mouse: &Mouse, policy: WaitPolicy) -> Result<(), &'static str> {
    let ctl = Controller { policy };
    ctl.command(0xA8)?;

    ctl.command(0x20)?;
    let config = ctl.read_data()?;
    // IRQ12 on, aux clock on
    ctl.command(0x60)?;
    ctl.write_data((config | 0x02) & !0x20)?;

    ctl.mouse_command(0xF6)?;
    ctl.mouse_command(0xF4)?;

    mouse.reset_decoder();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(mouse: &Mouse, bytes: &[u8]) {
        for &b in bytes {
            mouse.on_byte(b);
        }
    }

    #[test]
    fn plain_packet_decodes() {
        let mut dec = MouseDecoder::new();
        assert_eq!(dec.process_byte(0x09), None);
        assert_eq!(dec.process_byte(5), None);
        let ev = dec.process_byte(3).unwrap();
        assert_eq!(ev, MouseEvent { dx: 5, dy: -3, buttons: 1 });
        assert!(ev.left_button());
        assert!(!ev.right_button());
    }

    #[test]
    fn sign_and_overflow_bits() {
        let mut dec = MouseDecoder::new();
        // x negative (-2), y negative (-1 => down 1)
        let ev = [0x38, 0xFE, 0xFF].iter().filter_map(|&b| dec.process_byte(b)).next();
        assert_eq!(ev, Some(MouseEvent { dx: -2, dy: 1, buttons: 0 }));

        let ev = [0xC8, 0x10, 0x10].iter().filter_map(|&b| dec.process_byte(b)).next();
        assert_eq!(ev, Some(MouseEvent { dx: 255, dy: -255, buttons: 0 }));

        let ev = [0x58, 0x00, 0x00].iter().filter_map(|&b| dec.process_byte(b)).next();
        assert_eq!(ev.map(|e| e.dx), Some(-256));
    }

    #[test]
    fn resyncs_on_bad_status_byte() {
        let mut dec = MouseDecoder::new();
        assert_eq!(dec.process_byte(0x00), None);
        assert_eq!(dec.process_byte(0x04), None);
        assert_eq!(dec.process_byte(0x08), None);
        assert_eq!(dec.process_byte(1), None);
        assert_eq!(dec.process_byte(0), Some(MouseEvent { dx: 1, dy: 0, buttons: 0 }));
    }

    #[test]
    fn position_moves_and_clamps() {
        let mouse = Mouse::with_bounds(100, 50);
        assert_eq!(mouse.position(), (50, 25));

        feed(&mouse, &[0x08, 10, 5]);
        assert_eq!(mouse.position(), (60, 20));

        feed(&mouse, &[0x4A, 0, 0]);
        assert_eq!(mouse.position(), (99, 20));
        assert_eq!(mouse.buttons(), 0x02);

        feed(&mouse, &[0xB8, 0x00, 0x00]);
        assert_eq!(mouse.position(), (0, 49));
    }
}
