#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

extern crate alloc;
extern crate rlibc;

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};
use chocola::cpu::halt_forever;
use chocola::println;
use core::panic::PanicInfo;

#[macro_use]
mod kernel;
mod arch;

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    // The bank window at 0xA0000 is reached through the physical mapping.
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config.kernel_stack_size = 128 * 1024;
    config
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    if let Err(e) = kernel::init_kernel(boot_info) {
        println!("Kernel initialization failed: {}", e);
        halt_forever();
    }
    kernel::shell::run()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    println!("KERNEL PANIC: {}", info);
    halt_forever()
}
