//! 8253/8254 PIT channel 0 as the scheduler tick.
use x86_64::instructions::port::Port;

const PIT_FREQUENCY: u32 = 1_193_182;
const CHANNEL0: u16 = 0x40;
const COMMAND: u16 = 0x43;
/// Channel 0, lobyte/hibyte, mode 2 (rate generator), binary.
const MODE_RATE_GENERATOR: u8 = 0x34;

pub fn divisor(hz: u32) -> u16 {
    (PIT_FREQUENCY / hz).clamp(1, u32::from(u16::MAX)) as u16
}

pub fn init(hz: u32) {
    let [low, high] = divisor(hz).to_le_bytes();
    unsafe {
        Port::<u8>::new(COMMAND).write(MODE_RATE_GENERATOR);
        let mut data = Port::<u8>::new(CHANNEL0);
        data.write(low);
        data.write(high);
    }
}
