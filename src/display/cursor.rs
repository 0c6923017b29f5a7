//! # Mouse Cursor
//!
//! Arrow sprite drawn over the console with save-under: drawing records the
//! pixels beneath every opaque sprite pixel, hiding writes exactly those
//! values back. The timer tick moves the sprite only when the mouse
//! position changed, and not at all while the console has it suppressed.

use super::banked::BankedMemory;
use super::color::Color;
use super::framebuffer::BankedFramebuffer;

pub const CURSOR_WIDTH: usize = 12;
pub const CURSOR_HEIGHT: usize = 19;

/// 0 = transparent, 1 = black outline, 2 = white fill
#[rustfmt::skip]
const CURSOR_BITMAP: [[u8; CURSOR_WIDTH]; CURSOR_HEIGHT] = [
    [1,0,0,0,0,0,0,0,0,0,0,0],
    [1,1,0,0,0,0,0,0,0,0,0,0],
    [1,2,1,0,0,0,0,0,0,0,0,0],
    [1,2,2,1,0,0,0,0,0,0,0,0],
    [1,2,2,2,1,0,0,0,0,0,0,0],
    [1,2,2,2,2,1,0,0,0,0,0,0],
    [1,2,2,2,2,2,1,0,0,0,0,0],
    [1,2,2,2,2,2,2,1,0,0,0,0],
    [1,2,2,2,2,2,2,2,1,0,0,0],
    [1,2,2,2,2,2,2,2,2,1,0,0],
    [1,2,2,2,2,2,2,2,2,2,1,0],
    [1,2,2,2,2,2,2,1,1,1,1,1],
    [1,2,2,2,1,2,2,1,0,0,0,0],
    [1,2,2,1,0,1,2,2,1,0,0,0],
    [1,2,1,0,0,1,2,2,1,0,0,0],
    [1,1,0,0,0,0,1,2,2,1,0,0],
    [1,0,0,0,0,0,1,2,2,1,0,0],
    [0,0,0,0,0,0,0,1,2,2,1,0],
    [0,0,0,0,0,0,0,1,1,1,1,0],
];

pub struct CursorOverlay {
    /// Hotspot of the last drawn or requested position.
    pos: (usize, usize),
    drawn: bool,
    suppressed: bool,
    saved: [[u32; CURSOR_WIDTH]; CURSOR_HEIGHT],
}

impl CursorOverlay {
    pub const fn new(pos: (usize, usize)) -> Self {
        Self {
            pos,
            drawn: false,
            suppressed: false,
            saved: [[0; CURSOR_WIDTH]; CURSOR_HEIGHT],
        }
    }

    pub fn position(&self) -> (usize, usize) {
        self.pos
    }

    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn unsuppress(&mut self) {
        self.suppressed = false;
    }

    /// Whether the sprite's bounding box meets the given pixel rectangle.
    pub fn overlaps(&self, x: usize, y: usize, w: usize, h: usize) -> bool {
        let (cx, cy) = self.pos;
        self.drawn && x < cx + CURSOR_WIDTH && cx < x + w && y < cy + CURSOR_HEIGHT && cy < y + h
    }

    fn opaque() -> impl Iterator<Item = (usize, usize, u8)> {
        CURSOR_BITMAP.iter().enumerate().flat_map(|(row, line)| {
            line.iter()
                .enumerate()
                .filter(|(_, &p)| p != 0)
                .map(move |(col, &p)| (row, col, p))
        })
    }

    pub fn draw<M: BankedMemory>(&mut self, fb: &mut BankedFramebuffer<M>) {
        if self.drawn {
            return;
        }
        let (cx, cy) = self.pos;
        for (row, col, p) in Self::opaque() {
            self.saved[row][col] = fb.get_raw(cx + col, cy + row);
            let color = if p == 1 { Color::BLACK } else { Color::WHITE };
            fb.put_pixel(cx + col, cy + row, color);
        }
        self.drawn = true;
    }

    pub fn hide<M: BankedMemory>(&mut self, fb: &mut BankedFramebuffer<M>) {
        if !self.drawn {
            return;
        }
        let (cx, cy) = self.pos;
        for (row, col, _) in Self::opaque() {
            fb.put_raw(cx + col, cy + row, self.saved[row][col]);
        }
        self.drawn = false;
    }

    /// Timer-tick update. Returns whether anything was redrawn.
    pub fn on_tick<M: BankedMemory>(
        &mut self,
        fb: &mut BankedFramebuffer<M>,
        mouse: (usize, usize),
    ) -> bool {
        if self.suppressed || (self.drawn && mouse == self.pos) {
            return false;
        }
        self.hide(fb);
        self.pos = mouse;
        self.draw(fb);
        true
    }
}
