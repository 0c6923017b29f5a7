//! Graphics console: a Bochs VBE banked mode, the bank window capability,
//! pixel drawing, the text console and the mouse cursor overlay.

pub mod banked;
pub mod color;
pub mod console;
pub mod cursor;
pub mod framebuffer;
pub mod vbe;

pub use banked::{BankWindow, BankedMemory, BANK_SIZE};
pub use color::Color;
pub use console::{Console, CELL_HEIGHT, CELL_WIDTH};
pub use cursor::CursorOverlay;
pub use framebuffer::BankedFramebuffer;
pub use vbe::VgaWindow;
