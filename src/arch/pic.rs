//! # Programmable Interrupt Controller (8259 PIC)
//!
//! IRQs 0-15 are remapped past the CPU exception vectors:
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | Timer     |
//! | 1   | 33     | Keyboard  |
//! | 2   | 34     | Cascade   |
//! | 12  | 44     | Mouse     |
//!
//! Every other line stays masked.
use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = 40;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// IRQ0, IRQ1 and the cascade line.
const PIC_1_MASK: u8 = !0b0000_0111;
/// IRQ12.
const PIC_2_MASK: u8 = !0b0001_0000;

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,
    Keyboard = PIC_1_OFFSET + 1,
    Mouse = PIC_2_OFFSET + 4,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

pub fn init() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        pics.write_masks(PIC_1_MASK, PIC_2_MASK);
    }
}

/// # Safety
/// Must be called at the end of the handler for `irq`.
pub unsafe fn end_of_interrupt(irq: InterruptIndex) {
    PICS.lock().notify_end_of_interrupt(irq.as_u8());
}
