//! # Chocola kernel runtime
//!
//! Hardware-independent core of the Chocola kernel plus the thin port-level
//! drivers it needs. The `kernel` binary wires these pieces to the real
//! interrupt vectors; everything here can also be driven by the host test
//! harness through the trait seams (`BlockDevice`, `AtaBus`,
//! `BankedMemory`, `InterruptControl`).
//!
//! ## Modules
//!
//! | Module     | Role                                                  |
//! |------------|-------------------------------------------------------|
//! | `memory`   | first-fit heap arena, memory map report               |
//! | `task`     | trap frames and the preemptive round-robin scheduler  |
//! | `input`    | IRQ-fed ring buffers, scancode and mouse decoding     |
//! | `storage`  | ATA PIO block driver and the directory filesystem     |
//! | `display`  | bank-switched framebuffer, console, cursor overlay    |
//! | `shell`    | command grammar and report formats                    |
//! | `cpu`      | interrupt-disable critical sections                   |

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod serial;

pub mod config;
pub mod cpu;
pub mod display;
pub mod input;
pub mod memory;
pub mod shell;
pub mod storage;
pub mod task;
