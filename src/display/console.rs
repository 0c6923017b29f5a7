//! Character-cell console on the banked framebuffer.
//!
//! The console owns the framebuffer, a shadow grid of the characters shown
//! and the mouse cursor overlay. The timer interrupt reaches the overlay only
//! through [`Console::on_tick`], and only when it can take the console lock,
//! so the sequencing in [`Console::scroll`] is what keeps the two consistent.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::cpu::{Cpu, InterruptControl};

use super::banked::BankedMemory;
use super::color::Color;
use super::cursor::CursorOverlay;
use super::framebuffer::BankedFramebuffer;

pub const CELL_WIDTH: usize = 8;
pub const CELL_HEIGHT: usize = 14;
pub const TAB_WIDTH: usize = 4;

const BACKSPACE: u8 = 0x08;
/// Scanline of the cell used for the text caret; glyphs stop above it.
const CARET_LINE: usize = CELL_HEIGHT - 1;

pub struct Console<M: BankedMemory, I: InterruptControl = Cpu> {
    fb: BankedFramebuffer<M>,
    cursor: CursorOverlay,
    irq: I,
    cells: Vec<u8>,
    cols: usize,
    rows: usize,
    col: usize,
    row: usize,
    fg: Color,
    bg: Color,
}

impl<M: BankedMemory> Console<M, Cpu> {
    pub fn new(fb: BankedFramebuffer<M>) -> Self {
        Self::with_irq(fb, Cpu)
    }
}

impl<M: BankedMemory, I: InterruptControl> Console<M, I> {
    pub fn with_irq(fb: BankedFramebuffer<M>, irq: I) -> Self {
        let cols = fb.width / CELL_WIDTH;
        let rows = fb.height / CELL_HEIGHT;
        let centre = (fb.width / 2, fb.height / 2);
        Self {
            fb,
            cursor: CursorOverlay::new(centre),
            irq,
            cells: vec![b' '; cols * rows],
            cols,
            rows,
            col: 0,
            row: 0,
            fg: Color::LIGHT_GRAY,
            bg: Color::BLACK,
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn position(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    /// Character currently shown in a cell.
    pub fn cell(&self, col: usize, row: usize) -> u8 {
        self.cells[row * self.cols + col]
    }

    pub fn framebuffer(&self) -> &BankedFramebuffer<M> {
        &self.fb
    }

    pub fn cursor(&self) -> &CursorOverlay {
        &self.cursor
    }

    pub fn set_colors(&mut self, fg: Color, bg: Color) {
        self.fg = fg;
        self.bg = bg;
    }

    /// Runs `f` on the framebuffer with the mouse cursor lifted if it
    /// covers the given pixel rectangle.
    fn paint(
        &mut self,
        (x, y, w, h): (usize, usize, usize, usize),
        f: impl FnOnce(&mut BankedFramebuffer<M>),
    ) {
        let lift = self.cursor.overlaps(x, y, w, h);
        if lift {
            self.cursor.hide(&mut self.fb);
        }
        f(&mut self.fb);
        if lift {
            self.cursor.draw(&mut self.fb);
        }
    }

    fn draw_cell(&mut self, col: usize, row: usize, ch: u8) {
        self.cells[row * self.cols + col] = ch;
        let (x, y) = (col * CELL_WIDTH, row * CELL_HEIGHT);
        let (fg, bg) = (self.fg, self.bg);
        self.paint((x, y, CELL_WIDTH, CELL_HEIGHT), |fb| {
            fb.draw_glyph(char::from(ch), x, y, (CELL_WIDTH, CELL_HEIGHT), fg, bg)
        });
    }

    fn caret(&mut self, visible: bool) {
        if self.row >= self.rows {
            return;
        }
        let (x, y) = (self.col * CELL_WIDTH, self.row * CELL_HEIGHT + CARET_LINE);
        let color = if visible { self.fg } else { self.bg };
        self.paint((x, y, CELL_WIDTH, 1), |fb| fb.fill_rect(x, y, CELL_WIDTH, 1, color));
    }

    /// Draws `ch` at a fixed cell without moving the text position.
    pub fn put_char_at(&mut self, col: usize, row: usize, ch: u8) {
        if col < self.cols && row < self.rows {
            self.draw_cell(col, row, ch);
        }
    }

    pub fn put_char(&mut self, ch: u8) {
        self.caret(false);
        self.emit(ch);
        self.caret(true);
    }

    pub fn put_string(&mut self, s: &str) {
        self.caret(false);
        for b in s.bytes() {
            self.emit(b);
        }
        self.caret(true);
    }

    pub fn put_unsigned(&mut self, mut n: u64) {
        let mut digits = [0u8; 20];
        let mut i = digits.len();
        loop {
            i -= 1;
            digits[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.put_bytes(&digits[i..]);
    }

    /// `0x` followed by eight upper-case hex digits.
    pub fn put_hex(&mut self, n: u32) {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut out = *b"0x00000000";
        for (i, slot) in out[2..].iter_mut().enumerate() {
            *slot = HEX[(n >> (28 - i * 4)) as usize & 0xF];
        }
        self.put_bytes(&out);
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.caret(false);
        for &b in bytes {
            self.emit(b);
        }
        self.caret(true);
    }

    fn emit(&mut self, ch: u8) {
        match ch {
            b'\n' => self.new_line(),
            b'\r' => self.col = 0,
            BACKSPACE => {
                if self.col > 0 {
                    self.col -= 1;
                    self.draw_cell(self.col, self.row, b' ');
                }
            }
            b'\t' => {
                self.col = (self.col / TAB_WIDTH + 1) * TAB_WIDTH;
                if self.col >= self.cols {
                    self.new_line();
                }
            }
            0x20..=0x7E => {
                self.draw_cell(self.col, self.row, ch);
                self.col += 1;
                if self.col >= self.cols {
                    self.new_line();
                }
            }
            _ => {}
        }
    }

    fn new_line(&mut self) {
        self.col = 0;
        self.row += 1;
        if self.row >= self.rows {
            self.scroll();
            self.row = self.rows - 1;
        }
    }

    /// Moves every text row up by one and blanks the last row.
    pub fn scroll(&mut self) {
        self.cursor.suppress();
        let shown = self.cursor.is_drawn();
        self.cursor.hide(&mut self.fb);

        let text_height = self.rows * CELL_HEIGHT;
        let last_row_y = text_height - CELL_HEIGHT;
        let width = self.fb.width;
        let bg = self.bg;
        let fb = &mut self.fb;
        self.irq.without_interrupts(|| {
            fb.copy_rows(0, CELL_HEIGHT, last_row_y);
            fb.fill_rect(0, last_row_y, width, CELL_HEIGHT, bg);
        });

        self.cells.copy_within(self.cols.., 0);
        let last = self.cells.len() - self.cols;
        self.cells[last..].fill(b' ');

        if shown {
            self.cursor.draw(&mut self.fb);
        }
        self.cursor.unsuppress();
    }

    pub fn clear_screen(&mut self) {
        let shown = self.cursor.is_drawn();
        self.cursor.hide(&mut self.fb);
        self.fb.clear(self.bg);
        self.cells.fill(b' ');
        self.col = 0;
        self.row = 0;
        if shown {
            self.cursor.draw(&mut self.fb);
        }
        self.caret(true);
    }

    /// Timer-tick hook: follows the mouse unless a scroll is in progress.
    pub fn on_tick(&mut self, mouse: (usize, usize)) -> bool {
        self.cursor.on_tick(&mut self.fb, mouse)
    }
}

impl<M: BankedMemory, I: InterruptControl> fmt::Write for Console<M, I> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_string(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::testing::{NoIrq, RecordingIrq};
    use crate::cpu::IrqMutex;
    use crate::display::banked::testing::FlatBanks;
    use core::fmt::Write;

    // 10 columns x 4 rows
    const W: usize = 80;
    const H: usize = 56;

    fn console() -> Console<FlatBanks, RecordingIrq> {
        let fb = BankedFramebuffer::new(FlatBanks::new(W * H * 4), W, H);
        let mut con = Console::with_irq(fb, RecordingIrq::default());
        con.clear_screen();
        con
    }

    fn row_text(con: &Console<FlatBanks, RecordingIrq>, row: usize) -> String {
        (0..con.size().0).map(|c| char::from(con.cell(c, row))).collect()
    }

    fn cell_pixels(con: &Console<FlatBanks, RecordingIrq>, col: usize, row: usize) -> Vec<u32> {
        let mem = con.framebuffer().window().memory();
        let mut out = Vec::new();
        for y in row * CELL_HEIGHT..(row + 1) * CELL_HEIGHT - 1 {
            for x in col * CELL_WIDTH..(col + 1) * CELL_WIDTH {
                out.push(mem.word((y * W + x) * 4));
            }
        }
        out
    }

    #[test]
    fn grid_dimensions() {
        let con = console();
        assert_eq!(con.size(), (10, 4));
    }

    #[test]
    fn text_wraps_at_last_column() {
        let mut con = console();
        con.put_string("0123456789ab");
        assert_eq!(row_text(&con, 0), "0123456789");
        assert_eq!(&row_text(&con, 1)[..2], "ab");
        assert_eq!(con.position(), (2, 1));
    }

    #[test]
    fn glyphs_reach_the_framebuffer() {
        let mut con = console();
        con.put_char(b'#');
        let lit = cell_pixels(&con, 0, 0)
            .iter()
            .filter(|&&p| p == Color::LIGHT_GRAY.to_pixel())
            .count();
        assert!(lit > 0);
        assert!(cell_pixels(&con, 1, 0).iter().all(|&p| p == 0));
    }

    #[test]
    fn tab_stops_every_four_columns() {
        let mut con = console();
        con.put_string("a\t");
        assert_eq!(con.position(), (4, 0));
        con.put_char(b'\t');
        assert_eq!(con.position(), (8, 0));
        con.put_char(b'\t');
        assert_eq!(con.position(), (0, 1));
    }

    #[test]
    fn backspace_erases_previous_cell() {
        let mut con = console();
        con.put_string("ab\x08");
        assert_eq!(con.position(), (1, 0));
        assert_eq!(con.cell(1, 0), b' ');
        assert!(cell_pixels(&con, 1, 0).iter().all(|&p| p == 0));
        con.put_string("\n\x08");
        assert_eq!(con.position(), (0, 1));
    }

    #[test]
    fn numbers() {
        let mut con = console();
        con.put_unsigned(0);
        con.put_char(b' ');
        con.put_unsigned(1203);
        assert_eq!(&row_text(&con, 0)[..6], "0 1203");
        con.put_char(b'\n');
        con.put_hex(0xBEEF);
        assert_eq!(row_text(&con, 1), "0x0000BEEF");
    }

    #[test]
    fn scroll_moves_rows_and_blanks_the_last() {
        let mut con = console();
        write!(con, "one\ntwo\nthree\nfour").unwrap();
        let two = cell_pixels(&con, 0, 1);
        let sections = con.irq.sections.get();

        con.put_char(b'\n');
        assert_eq!(con.irq.sections.get(), sections + 1);
        assert_eq!(&row_text(&con, 0)[..3], "two");
        assert_eq!(&row_text(&con, 2)[..4], "four");
        assert_eq!(row_text(&con, 3), "          ");
        assert_eq!(cell_pixels(&con, 0, 0), two);
        assert!(cell_pixels(&con, 0, 3).iter().all(|&p| p == 0));
        assert_eq!(con.position(), (0, 3));
        assert!(!con.cursor().is_suppressed());
    }

    #[test]
    fn scroll_keeps_cursor_save_under_consistent() {
        let mut with_cursor = console();
        let mut plain = console();
        with_cursor.on_tick((3, 5));
        assert!(with_cursor.cursor().is_drawn());
        for con in [&mut with_cursor, &mut plain] {
            write!(con, "abc\ndef\nghi\njkl\nmno").unwrap();
        }
        assert!(with_cursor.cursor().is_drawn());

        let fb = &mut with_cursor.fb;
        with_cursor.cursor.hide(fb);
        assert_eq!(
            with_cursor.framebuffer().window().memory().words,
            plain.framebuffer().window().memory().words
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut con = console();
        con.put_string("hello\nworld");
        con.clear_screen();
        assert_eq!(con.position(), (0, 0));
        assert_eq!(row_text(&con, 1), "          ");
        assert!(cell_pixels(&con, 0, 1).iter().all(|&p| p == 0));
    }

    #[test]
    fn shared_console_is_drawn_with_interrupts_off() {
        let irq = RecordingIrq::default();
        let fb = BankedFramebuffer::new(FlatBanks::new(W * H * 4), W, H);
        let shared = IrqMutex::with_irq(Some(Console::with_irq(fb, NoIrq)), &irq);

        shared.lock(|console| {
            assert!(irq.inside.get());
            // the timer's cursor update backs off instead of spinning
            assert!(shared.try_lock().is_none());
            if let Some(console) = console.as_mut() {
                console.put_string("hi\n");
            }
        });
        assert!(!irq.inside.get());
        assert_eq!(irq.sections.get(), 1);

        let shown = shared.lock(|console| console.as_ref().map(|c| (c.cell(0, 0), c.cell(1, 0))));
        assert_eq!(shown, Some((b'h', b'i')));
        assert_eq!(irq.sections.get(), 2);
    }
}
