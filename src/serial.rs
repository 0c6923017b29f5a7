//! Serial console on COM1, used for all kernel logging.
//!
//! `println!`/`print!` write through [`SERIAL`]. Host test builds link `std`
//! instead and its own macros take over at the same call sites.

use spin::Mutex;
use uart_16550::SerialPort;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

pub fn init() {
    SERIAL.lock().init();
}

#[cfg(not(test))]
#[macro_export]
macro_rules! println {
    () => {{
        $crate::print!("\n")
    }};
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut serial = $crate::serial::SERIAL.lock();
        let _ = writeln!(serial, $($arg)*);
    }};
}

#[cfg(not(test))]
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut serial = $crate::serial::SERIAL.lock();
        let _ = write!(serial, $($arg)*);
    }};
}
