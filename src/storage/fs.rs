//! Flat single-directory filesystem.
//!
//! ```text
//! sector 100        directory: 16 entries x 32 bytes, rest of sector zero
//! sector 110..      file data, each file in consecutive sectors
//!
//! entry:  name[20]  NUL padded, all-zero = free slot
//!         start     u32 LE, first data sector
//!         size      u32 LE, bytes
//!         flags     u32 LE, reserved (0)
//! ```
//!
//! New files are placed after the highest sector used by any live file.
//! Deleting a file frees its directory slot only; its sectors are not
//! reused unless it was the last file on the disk.

use alloc::vec::Vec;
use core::fmt;

use super::ata::LBA28_LIMIT;
use super::{BlockDevice, DeviceError, Sector, SECTOR_SIZE};

pub const FS_DIR_SECTOR: u32 = 100;
pub const FS_DATA_START: u32 = 110;
pub const FS_MAX_FILES: usize = 16;
pub const DIR_ENTRY_SIZE: usize = 32;
pub const NAME_FIELD_LEN: usize = 20;
pub const MAX_NAME_LEN: usize = NAME_FIELD_LEN - 1;

/// A directory entry pointing outside the addressable disk.
const BAD_EXTENT: FsError = FsError::Device(DeviceError::Fault);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    DirectoryFull,
    InvalidName,
    /// Larger than the heap can hold or a 32-bit size can describe.
    TooLarge,
    Device(DeviceError),
}

impl From<DeviceError> for FsError {
    fn from(e: DeviceError) -> Self {
        FsError::Device(e)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound => write!(f, "file not found"),
            FsError::AlreadyExists => write!(f, "file already exists"),
            FsError::DirectoryFull => write!(f, "directory full"),
            FsError::InvalidName => write!(f, "invalid file name"),
            FsError::TooLarge => write!(f, "file too large"),
            FsError::Device(e) => write!(f, "disk error: {}", e),
        }
    }
}

/// One decoded 32-byte directory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirEntry {
    name: [u8; NAME_FIELD_LEN],
    pub start: u32,
    pub size: u32,
    pub flags: u32,
}

impl DirEntry {
    fn new(name: &str, start: u32, size: u32) -> Self {
        let mut field = [0u8; NAME_FIELD_LEN];
        field[..name.len()].copy_from_slice(name.as_bytes());
        Self {
            name: field,
            start,
            size,
            flags: 0,
        }
    }

    pub fn decode(raw: &[u8]) -> Self {
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let mut name = [0u8; NAME_FIELD_LEN];
        name.copy_from_slice(&raw[..NAME_FIELD_LEN]);
        Self {
            name,
            start: word(20),
            size: word(24),
            flags: word(28),
        }
    }

    pub fn encode(&self, out: &mut [u8]) {
        out[..NAME_FIELD_LEN].copy_from_slice(&self.name);
        out[20..24].copy_from_slice(&self.start.to_le_bytes());
        out[24..28].copy_from_slice(&self.size.to_le_bytes());
        out[28..32].copy_from_slice(&self.flags.to_le_bytes());
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    pub fn sectors(&self) -> u32 {
        self.size.div_ceil(SECTOR_SIZE as u32)
    }

    /// First sector after this file's data, `None` when the run does not
    /// fit on the disk. Entries come from disk and are not trusted.
    pub fn end(&self) -> Option<u32> {
        self.start
            .checked_add(self.sectors())
            .filter(|&end| end <= LBA28_LIMIT)
    }
}

/// 1 to 19 visible ASCII characters; spaces would not survive the shell's
/// argument splitting.
pub fn valid_name(name: &str) -> bool {
    (1..=MAX_NAME_LEN).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_graphic())
}

pub struct Directory {
    raw: Sector,
}

impl Directory {
    fn entry(&self, slot: usize) -> DirEntry {
        let at = slot * DIR_ENTRY_SIZE;
        DirEntry::decode(&self.raw[at..at + DIR_ENTRY_SIZE])
    }

    fn set_entry(&mut self, slot: usize, entry: &DirEntry) {
        let at = slot * DIR_ENTRY_SIZE;
        entry.encode(&mut self.raw[at..at + DIR_ENTRY_SIZE]);
    }

    /// Live entries with their slot numbers; free slots are skipped, not
    /// treated as the end of the table.
    pub fn live(&self) -> impl Iterator<Item = (usize, DirEntry)> + '_ {
        (0..FS_MAX_FILES)
            .map(|slot| (slot, self.entry(slot)))
            .filter(|(_, e)| !e.is_free())
    }

    pub fn find(&self, name: &str) -> Option<(usize, DirEntry)> {
        self.live().find(|(_, e)| e.name() == name)
    }

    fn free_slot(&self) -> Option<usize> {
        (0..FS_MAX_FILES).find(|&slot| self.entry(slot).is_free())
    }

    /// Where the next file's data starts. A live entry whose run leaves
    /// the disk makes the directory unusable for placement.
    pub fn watermark(&self) -> Result<u32, FsError> {
        self.live().try_fold(FS_DATA_START, |mark, (_, e)| {
            e.end().map(|end| mark.max(end)).ok_or(BAD_EXTENT)
        })
    }
}

pub struct FileSystem<D: BlockDevice> {
    dev: D,
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn new(dev: D) -> Self {
        Self { dev }
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    pub fn into_inner(self) -> D {
        self.dev
    }

    /// Writes an empty directory.
    pub fn format(&mut self) -> Result<(), FsError> {
        self.dev.write_sector(FS_DIR_SECTOR, &[0; SECTOR_SIZE])?;
        Ok(())
    }

    pub fn directory(&mut self) -> Result<Directory, FsError> {
        let mut raw = [0u8; SECTOR_SIZE];
        self.dev.read_sector(FS_DIR_SECTOR, &mut raw)?;
        Ok(Directory { raw })
    }

    pub fn list(&mut self) -> Result<Vec<DirEntry>, FsError> {
        Ok(self.directory()?.live().map(|(_, e)| e).collect())
    }

    pub fn stat(&mut self, name: &str) -> Result<DirEntry, FsError> {
        self.directory()?
            .find(name)
            .map(|(_, e)| e)
            .ok_or(FsError::NotFound)
    }

    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, FsError> {
        let entry = self.stat(name)?;
        let end = entry.end().ok_or(BAD_EXTENT)?;
        let mut data = Vec::new();
        data.try_reserve_exact(entry.size as usize)
            .map_err(|_| FsError::TooLarge)?;
        let mut sector = [0u8; SECTOR_SIZE];
        for lba in entry.start..end {
            self.dev.read_sector(lba, &mut sector)?;
            let take = (entry.size as usize - data.len()).min(SECTOR_SIZE);
            data.extend_from_slice(&sector[..take]);
        }
        Ok(data)
    }

    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<DirEntry, FsError> {
        if !valid_name(name) {
            return Err(FsError::InvalidName);
        }
        let size = u32::try_from(data.len()).map_err(|_| FsError::TooLarge)?;

        let mut dir = self.directory()?;
        if dir.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = dir.free_slot().ok_or(FsError::DirectoryFull)?;
        let start = dir.watermark()?;
        let entry = DirEntry::new(name, start, size);
        entry.end().ok_or(BAD_EXTENT)?;

        for (lba, chunk) in (start..).zip(data.chunks(SECTOR_SIZE)) {
            let mut sector = [0u8; SECTOR_SIZE];
            sector[..chunk.len()].copy_from_slice(chunk);
            self.dev.write_sector(lba, &sector)?;
        }

        dir.set_entry(slot, &entry);
        self.dev.write_sector(FS_DIR_SECTOR, &dir.raw)?;
        Ok(entry)
    }

    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let mut dir = self.directory()?;
        let (slot, _) = dir.find(name).ok_or(FsError::NotFound)?;
        dir.set_entry(slot, &DirEntry::default());
        self.dev.write_sector(FS_DIR_SECTOR, &dir.raw)?;
        Ok(())
    }
}
