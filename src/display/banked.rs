//! Access to a linear pixel buffer through a 64 KiB bank window.
//!
//! [`BankWindow`] is the only code that touches the bank register. It
//! remembers the selected bank, maps every logical byte address onto
//! `(bank, offset)` and skips redundant switches, so callers address the
//! whole framebuffer as if it were flat.

pub const BANK_SIZE: usize = 64 * 1024;

/// Words moved per step of a cross-bank copy.
const COPY_CHUNK_WORDS: usize = 256;

/// The hardware side: a bank register plus a window of `BANK_SIZE` bytes.
/// Offsets are window-relative and 4-byte aligned.
pub trait BankedMemory {
    fn select_bank(&mut self, bank: usize);
    fn read_u32(&self, offset: usize) -> u32;
    fn write_u32(&mut self, offset: usize, value: u32);
}

pub struct BankWindow<M: BankedMemory> {
    mem: M,
    current: Option<usize>,
    switches: u64,
}

impl<M: BankedMemory> BankWindow<M> {
    pub fn new(mem: M) -> Self {
        Self {
            mem,
            current: None,
            switches: 0,
        }
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn current_bank(&self) -> Option<usize> {
        self.current
    }

    /// Selects the bank holding `addr` and returns the window offset.
    fn map(&mut self, addr: usize) -> usize {
        let bank = addr / BANK_SIZE;
        if self.current != Some(bank) {
            self.mem.select_bank(bank);
            self.current = Some(bank);
            self.switches += 1;
        }
        addr % BANK_SIZE
    }

    pub fn read_u32(&mut self, addr: usize) -> u32 {
        let offset = self.map(addr);
        self.mem.read_u32(offset)
    }

    pub fn write_u32(&mut self, addr: usize, value: u32) {
        let offset = self.map(addr);
        self.mem.write_u32(offset, value);
    }

    /// Writes `value` to `words` consecutive words starting at `addr`.
    pub fn fill(&mut self, addr: usize, words: usize, value: u32) {
        let mut addr = addr;
        let mut left = words;
        while left > 0 {
            let offset = self.map(addr);
            let run = left.min((BANK_SIZE - offset) / 4);
            for i in 0..run {
                self.mem.write_u32(offset + i * 4, value);
            }
            addr += run * 4;
            left -= run;
        }
    }

    /// Copies `words` words from `src` to `dst`. Overlapping ranges are
    /// allowed when `dst <= src`.
    pub fn copy(&mut self, dst: usize, src: usize, words: usize) {
        debug_assert!(dst <= src || dst >= src + words * 4);
        let mut tmp = [0u32; COPY_CHUNK_WORDS];
        let (mut dst, mut src, mut left) = (dst, src, words);

        while left > 0 {
            let run = left
                .min((BANK_SIZE - src % BANK_SIZE) / 4)
                .min((BANK_SIZE - dst % BANK_SIZE) / 4)
                .min(COPY_CHUNK_WORDS);

            if src / BANK_SIZE == dst / BANK_SIZE {
                let s = self.map(src);
                let d = dst % BANK_SIZE;
                for i in 0..run {
                    let v = self.mem.read_u32(s + i * 4);
                    self.mem.write_u32(d + i * 4, v);
                }
            } else {
                // one bank is visible at a time: stage through `tmp`
                let s = self.map(src);
                for (i, slot) in tmp[..run].iter_mut().enumerate() {
                    *slot = self.mem.read_u32(s + i * 4);
                }
                let d = self.map(dst);
                for (i, &v) in tmp[..run].iter().enumerate() {
                    self.mem.write_u32(d + i * 4, v);
                }
            }

            src += run * 4;
            dst += run * 4;
            left -= run;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{BankedMemory, BANK_SIZE};

    /// Flat buffer that behaves like a banked window over it.
    pub struct FlatBanks {
        pub words: Vec<u32>,
        pub bank: usize,
        pub selects: Vec<usize>,
    }

    impl FlatBanks {
        pub fn new(bytes: usize) -> Self {
            Self {
                words: vec![0; bytes / 4],
                bank: 0,
                selects: Vec::new(),
            }
        }

        pub fn word(&self, addr: usize) -> u32 {
            self.words[addr / 4]
        }

        fn index(&self, offset: usize) -> usize {
            assert!(offset < BANK_SIZE, "offset outside the window");
            (self.bank * BANK_SIZE + offset) / 4
        }
    }

    impl BankedMemory for FlatBanks {
        fn select_bank(&mut self, bank: usize) {
            self.bank = bank;
            self.selects.push(bank);
        }

        fn read_u32(&self, offset: usize) -> u32 {
            self.words[self.index(offset)]
        }

        fn write_u32(&mut self, offset: usize, value: u32) {
            let i = self.index(offset);
            self.words[i] = value;
        }
    }
}
