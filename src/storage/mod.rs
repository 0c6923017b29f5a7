//! Block storage: the ATA PIO driver and the flat directory filesystem
//! that sits on top of any [`BlockDevice`].

use core::fmt;

pub mod ata;
pub mod fs;

pub use ata::{AtaBus, AtaPio, Drive, PortBus};
pub use fs::{DirEntry, FileSystem, FsError};

pub const SECTOR_SIZE: usize = 512;

pub type Sector = [u8; SECTOR_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The drive never became ready.
    Timeout,
    /// The drive reported ERR or DF, or the sector is not addressable.
    Fault,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Timeout => write!(f, "device timeout"),
            DeviceError::Fault => write!(f, "device fault"),
        }
    }
}

/// A disk addressed in 512-byte sectors.
pub trait BlockDevice {
    fn read_sector(&mut self, lba: u32, buf: &mut Sector) -> Result<(), DeviceError>;
    fn write_sector(&mut self, lba: u32, buf: &Sector) -> Result<(), DeviceError>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn read_sector(&mut self, lba: u32, buf: &mut Sector) -> Result<(), DeviceError> {
        (**self).read_sector(lba, buf)
    }

    fn write_sector(&mut self, lba: u32, buf: &Sector) -> Result<(), DeviceError> {
        (**self).write_sector(lba, buf)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{BlockDevice, DeviceError, Sector, SECTOR_SIZE};
    use std::collections::BTreeMap;

    /// Sparse in-memory disk that counts accesses.
    #[derive(Default)]
    pub struct MemDisk {
        pub sectors: BTreeMap<u32, Sector>,
        pub reads: usize,
        pub writes: Vec<u32>,
        /// Sectors at or beyond this LBA fail.
        pub limit: Option<u32>,
    }

    impl MemDisk {
        pub fn sector(&self, lba: u32) -> Sector {
            self.sectors.get(&lba).copied().unwrap_or([0; SECTOR_SIZE])
        }
    }

    impl BlockDevice for MemDisk {
        fn read_sector(&mut self, lba: u32, buf: &mut Sector) -> Result<(), DeviceError> {
            if self.limit.is_some_and(|l| lba >= l) {
                return Err(DeviceError::Fault);
            }
            self.reads += 1;
            *buf = self.sector(lba);
            Ok(())
        }

        fn write_sector(&mut self, lba: u32, buf: &Sector) -> Result<(), DeviceError> {
            if self.limit.is_some_and(|l| lba >= l) {
                return Err(DeviceError::Fault);
            }
            self.writes.push(lba);
            self.sectors.insert(lba, *buf);
            Ok(())
        }
    }
}
