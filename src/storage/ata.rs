//! ATA PIO driver, LBA28, one sector per command.
//!
//! Register access goes through [`AtaBus`] so the command sequencing can be
//! exercised against an emulated drive; the kernel uses [`PortBus`] on the
//! primary channel.

use x86_64::instructions::port::Port;

use crate::cpu::WaitPolicy;

use super::{BlockDevice, DeviceError, Sector, SECTOR_SIZE};

pub const PRIMARY_BASE: u16 = 0x1F0;

const STATUS_ERR: u8 = 0x01;
const STATUS_DRQ: u8 = 0x08;
const STATUS_DF: u8 = 0x20;
const STATUS_BSY: u8 = 0x80;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_WRITE_SECTORS: u8 = 0x30;
const CMD_CACHE_FLUSH: u8 = 0xE7;

/// First sector an LBA28 command can not address.
pub const LBA28_LIMIT: u32 = 1 << 28;
const WORDS_PER_SECTOR: usize = SECTOR_SIZE / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Master,
    Slave,
}

impl Drive {
    /// Drive/head register value with LBA mode set.
    pub fn select_bits(self) -> u8 {
        match self {
            Drive::Master => 0xE0,
            Drive::Slave => 0xF0,
        }
    }
}

/// Task-file registers, as offsets from the channel base. Status and
/// command share offset 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Register {
    SectorCount = 2,
    LbaLow = 3,
    LbaMid = 4,
    LbaHigh = 5,
    DriveHead = 6,
    Command = 7,
}

pub trait AtaBus {
    fn read_status(&mut self) -> u8;
    fn write_register(&mut self, reg: Register, value: u8);
    fn read_data(&mut self) -> u16;
    fn write_data(&mut self, word: u16);
}

/// Port I/O on a real channel.
pub struct PortBus {
    base: u16,
}

impl PortBus {
    pub const fn primary() -> Self {
        Self { base: PRIMARY_BASE }
    }
}

impl AtaBus for PortBus {
    fn read_status(&mut self) -> u8 {
        unsafe { Port::<u8>::new(self.base + 7).read() }
    }

    fn write_register(&mut self, reg: Register, value: u8) {
        unsafe { Port::<u8>::new(self.base + reg as u16).write(value) }
    }

    fn read_data(&mut self) -> u16 {
        unsafe { Port::<u16>::new(self.base).read() }
    }

    fn write_data(&mut self, word: u16) {
        unsafe { Port::<u16>::new(self.base).write(word) }
    }
}

pub struct AtaPio<B: AtaBus> {
    bus: B,
    drive: Drive,
    policy: WaitPolicy,
}

impl<B: AtaBus> AtaPio<B> {
    pub fn new(bus: B, drive: Drive, policy: WaitPolicy) -> Self {
        Self { bus, drive, policy }
    }

    /// Selects the drive and checks for a floating bus, which reads as
    /// 0xFF (no controller) or 0x00 (no drive behind it).
    pub fn detect(&mut self) -> bool {
        self.bus
            .write_register(Register::DriveHead, self.drive.select_bits());
        // four status reads give the drive its 400ns to respond
        let mut status = 0;
        for _ in 0..4 {
            status = self.bus.read_status();
        }
        status != 0xFF && status != 0x00
    }

    pub fn drive(&self) -> Drive {
        self.drive
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Polls until BSY clears and `ready(status)` holds or the drive
    /// reports an error.
    fn poll(&mut self, ready: impl Fn(u8) -> bool) -> Result<u8, DeviceError> {
        let policy = self.policy;
        let bus = &mut self.bus;
        let mut status = 0;
        let settled = policy.wait_until(|| {
            status = bus.read_status();
            status & STATUS_BSY == 0 && (ready(status) || status & (STATUS_ERR | STATUS_DF) != 0)
        });
        if !settled {
            return Err(DeviceError::Timeout);
        }
        Ok(status)
    }

    fn check(status: u8) -> Result<(), DeviceError> {
        if status & (STATUS_ERR | STATUS_DF) != 0 {
            Err(DeviceError::Fault)
        } else {
            Ok(())
        }
    }

    /// Waits out any previous command, then programs one sector at `lba`.
    fn issue(&mut self, lba: u32, command: u8) -> Result<(), DeviceError> {
        if lba >= LBA28_LIMIT {
            return Err(DeviceError::Fault);
        }
        // stale ERR from an earlier command is cleared by the next one
        self.poll(|_| true)?;

        let [low, mid, high, top] = lba.to_le_bytes();
        self.bus
            .write_register(Register::DriveHead, self.drive.select_bits() | (top & 0x0F));
        self.bus.write_register(Register::SectorCount, 1);
        self.bus.write_register(Register::LbaLow, low);
        self.bus.write_register(Register::LbaMid, mid);
        self.bus.write_register(Register::LbaHigh, high);
        self.bus.write_register(Register::Command, command);
        Ok(())
    }

    fn wait_data_request(&mut self) -> Result<(), DeviceError> {
        let status = self.poll(|s| s & STATUS_DRQ != 0)?;
        Self::check(status)
    }

    pub fn flush(&mut self) -> Result<(), DeviceError> {
        self.bus.write_register(Register::Command, CMD_CACHE_FLUSH);
        let status = self.poll(|_| true)?;
        Self::check(status)
    }
}

impl<B: AtaBus> BlockDevice for AtaPio<B> {
    fn read_sector(&mut self, lba: u32, buf: &mut Sector) -> Result<(), DeviceError> {
        self.issue(lba, CMD_READ_SECTORS)?;
        self.wait_data_request()?;
        for chunk in buf.chunks_exact_mut(2) {
            chunk.copy_from_slice(&self.bus.read_data().to_le_bytes());
        }
        Ok(())
    }

    fn write_sector(&mut self, lba: u32, buf: &Sector) -> Result<(), DeviceError> {
        self.issue(lba, CMD_WRITE_SECTORS)?;
        self.wait_data_request()?;
        for chunk in buf.chunks_exact(2) {
            self.bus.write_data(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        self.flush()
    }
}
