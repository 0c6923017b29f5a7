//! Chocola data disk builder
//!
//! Creates or fills a raw disk image using the kernel's own filesystem code.
//!
//! ```text
//! mkfs <image>                        format and add the sample files
//! mkfs <image> [--format] NAME=PATH.. add host files
//! ```

use chocola::storage::fs::{FS_DATA_START, FS_MAX_FILES};
use chocola::storage::{BlockDevice, DeviceError, FileSystem, FsError, Sector, SECTOR_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::{env, fs, process};

/// Room for the directory plus a few hundred KiB of data.
const MIN_IMAGE_SECTORS: u64 = FS_DATA_START as u64 + 1024;

const SAMPLE_FILES: &[(&str, &str)] = &[
    ("hello.txt", "Hello from Chocola!\n"),
    (
        "readme.txt",
        "Chocola\nA simple hobby operating system.\nType 'help' at the prompt.\n",
    ),
    (
        "help.txt",
        "Available commands:\n  help       Show this help\n  ver        Show version\n  clear      Clear screen\n  echo ..    Echo text\n  uptime     Show uptime\n  dir / ls   List files\n  type FILE  Display file\n  cat FILE   Display file\n",
    ),
];

/// A disk image file addressed in sectors.
struct FileDisk {
    file: File,
}

impl FileDisk {
    fn open(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let min_len = MIN_IMAGE_SECTORS * SECTOR_SIZE as u64;
        if file.metadata()?.len() < min_len {
            file.set_len(min_len)?;
        }
        Ok(Self { file })
    }

    fn seek(&mut self, lba: u32) -> Result<(), DeviceError> {
        self.file
            .seek(SeekFrom::Start(u64::from(lba) * SECTOR_SIZE as u64))
            .map(|_| ())
            .map_err(|_| DeviceError::Fault)
    }
}

impl BlockDevice for FileDisk {
    fn read_sector(&mut self, lba: u32, buf: &mut Sector) -> Result<(), DeviceError> {
        self.seek(lba)?;
        buf.fill(0);
        // Past the end of the image reads as zeros.
        let mut filled = 0;
        while filled < SECTOR_SIZE {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => return Err(DeviceError::Fault),
            }
        }
        Ok(())
    }

    fn write_sector(&mut self, lba: u32, buf: &Sector) -> Result<(), DeviceError> {
        self.seek(lba)?;
        self.file.write_all(buf).map_err(|_| DeviceError::Fault)
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("mkfs: {}", msg);
    process::exit(1);
}

fn add(fs: &mut FileSystem<FileDisk>, name: &str, data: &[u8]) {
    match fs.write(name, data) {
        Ok(entry) => println!(
            "  {:<20}{} bytes at sector {}",
            name, entry.size, entry.start
        ),
        Err(FsError::AlreadyExists) => println!("  {:<20}exists, skipped", name),
        Err(e) => fail(format_args!("{}: {}", name, e)),
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((image, rest)) = args.split_first() else {
        eprintln!("Usage: mkfs <image> [--format] [NAME=PATH ...]");
        eprintln!();
        eprintln!("Without files, formats the image and adds the sample files.");
        process::exit(1);
    };

    let format = rest.is_empty() || rest.iter().any(|a| a == "--format");
    let files: Vec<(&str, &str)> = rest
        .iter()
        .filter(|a| *a != "--format")
        .map(|a| a.split_once('=').unwrap_or_else(|| fail(format_args!("expected NAME=PATH, got '{}'", a))))
        .collect();
    if files.len() > FS_MAX_FILES {
        fail(format_args!("at most {} files fit in the directory", FS_MAX_FILES));
    }

    let disk = FileDisk::open(image).unwrap_or_else(|e| fail(format_args!("{}: {}", image, e)));
    let mut fs = FileSystem::new(disk);
    if format {
        fs.format().unwrap_or_else(|e| fail(e));
    }

    if files.is_empty() {
        for (name, text) in SAMPLE_FILES {
            add(&mut fs, name, text.as_bytes());
        }
    } else {
        for (name, path) in files {
            let data = fs::read(path).unwrap_or_else(|e| fail(format_args!("{}: {}", path, e)));
            add(&mut fs, name, &data);
        }
    }

    let count = fs.list().map(|l| l.len()).unwrap_or_else(|e| fail(e));
    println!("mkfs: {} file(s) on {}", count, image);
}
