//! Chocola bootimage builder
//!
//! Wraps the kernel ELF into a BIOS disk image. The data disk is a separate
//! image, see `tools/mkfs`.

use bootloader::DiskImageBuilder;
use std::path::PathBuf;
use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: bootimage <kernel-binary> [output-path]");
        eprintln!();
        eprintln!("Creates a bootable BIOS disk image from the kernel binary.");
        process::exit(1);
    }

    let kernel_path = PathBuf::from(&args[1]);
    let output_dir = match args.get(2) {
        Some(dir) => PathBuf::from(dir),
        None => kernel_path
            .parent()
            .map_or_else(|| PathBuf::from("."), PathBuf::from),
    };

    if !kernel_path.exists() {
        eprintln!("Error: Kernel binary not found: {}", kernel_path.display());
        process::exit(1);
    }

    let bios_path = output_dir.join("chocola-bios.img");
    println!("Creating boot image...");
    println!("  Kernel: {}", kernel_path.display());

    if let Err(e) = DiskImageBuilder::new(kernel_path).create_bios_image(&bios_path) {
        eprintln!("Error creating BIOS image: {}", e);
        process::exit(1);
    }
    println!("  Created BIOS image: {}", bios_path.display());

    println!();
    println!("Run it with a data disk on the primary slave:");
    println!(
        "    qemu-system-x86_64 -drive format=raw,file={} -drive format=raw,file=disk.img,index=1 -serial stdio",
        bios_path.display()
    );
}
