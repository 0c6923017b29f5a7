//! Bochs/QEMU VBE "dispi" interface: mode setting and the banked window at
//! physical 0xA0000.

use x86_64::instructions::port::Port;

use super::banked::{BankedMemory, BANK_SIZE};

const DISPI_IOPORT_INDEX: u16 = 0x01CE;
const DISPI_IOPORT_DATA: u16 = 0x01CF;

const DISPI_INDEX_ID: u16 = 0;
const DISPI_INDEX_XRES: u16 = 1;
const DISPI_INDEX_YRES: u16 = 2;
const DISPI_INDEX_BPP: u16 = 3;
const DISPI_INDEX_ENABLE: u16 = 4;
const DISPI_INDEX_BANK: u16 = 5;

const DISPI_DISABLED: u16 = 0x00;
const DISPI_ENABLED: u16 = 0x01;
const DISPI_ID_MIN: u16 = 0xB0C0;

pub const BANK_WINDOW_PHYS: u64 = 0xA0000;

fn write_dispi(index: u16, value: u16) {
    unsafe {
        Port::<u16>::new(DISPI_IOPORT_INDEX).write(index);
        Port::<u16>::new(DISPI_IOPORT_DATA).write(value);
    }
}

fn read_dispi(index: u16) -> u16 {
    unsafe {
        Port::<u16>::new(DISPI_IOPORT_INDEX).write(index);
        Port::<u16>::new(DISPI_IOPORT_DATA).read()
    }
}

/// Programs a banked (no linear framebuffer) graphics mode.
pub fn set_mode(width: usize, height: usize, bpp: usize) -> Result<(), &'static str> {
    if read_dispi(DISPI_INDEX_ID) < DISPI_ID_MIN {
        return Err("no Bochs VBE adapter");
    }
    write_dispi(DISPI_INDEX_ENABLE, DISPI_DISABLED);
    write_dispi(DISPI_INDEX_XRES, width as u16);
    write_dispi(DISPI_INDEX_YRES, height as u16);
    write_dispi(DISPI_INDEX_BPP, bpp as u16);
    write_dispi(DISPI_INDEX_ENABLE, DISPI_ENABLED);
    if read_dispi(DISPI_INDEX_XRES) as usize != width {
        return Err("VBE mode rejected");
    }
    Ok(())
}

/// The 64 KiB legacy window, reached through the bootloader's physical
/// memory mapping.
pub struct VgaWindow {
    base: *mut u32,
}

// Safety: the window is only reached through the console that owns it.
unsafe impl Send for VgaWindow {}

impl VgaWindow {
    /// # Safety
    /// `phys_offset` must be the virtual address at which all physical
    /// memory is mapped, and nothing else may use the window.
    pub unsafe fn new(phys_offset: u64) -> Self {
        Self {
            base: (phys_offset + BANK_WINDOW_PHYS) as *mut u32,
        }
    }
}

impl BankedMemory for VgaWindow {
    fn select_bank(&mut self, bank: usize) {
        write_dispi(DISPI_INDEX_BANK, bank as u16);
    }

    fn read_u32(&self, offset: usize) -> u32 {
        debug_assert!(offset < BANK_SIZE);
        unsafe { self.base.add(offset / 4).read_volatile() }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        debug_assert!(offset < BANK_SIZE);
        unsafe { self.base.add(offset / 4).write_volatile(value) }
    }
}
