//! Interrupt-fed input: the shared ring buffer, keyboard and mouse
//! decoding, and the shell's line editor.

pub mod keyboard;
pub mod line;
pub mod mouse;
pub mod ring;

pub use keyboard::{Keyboard, KEY_DOWN, KEY_UP};
pub use line::{Edit, LineEditor};
pub use mouse::{Mouse, MouseEvent};
pub use ring::RingBuffer;
