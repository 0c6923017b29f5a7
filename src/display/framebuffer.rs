//! Pixel-level drawing on the banked framebuffer, using embedded-graphics
//! for glyph rendering.
use embedded_graphics::{
    mono_font::{ascii::FONT_8X13, MonoTextStyleBuilder},
    text::{Baseline, Text},
};
use embedded_graphics_core::{
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Point, Size},
    pixelcolor::Rgb888,
    primitives::Rectangle,
    Drawable, Pixel,
};

use super::banked::{BankWindow, BankedMemory};
use super::color::Color;

const BYTES_PER_PIXEL: usize = 4;

pub struct BankedFramebuffer<M: BankedMemory> {
    window: BankWindow<M>,
    pub width: usize,
    pub height: usize,
    /// Bytes per scanline.
    pub stride: usize,
}

impl<M: BankedMemory> BankedFramebuffer<M> {
    pub fn new(mem: M, width: usize, height: usize) -> Self {
        Self {
            window: BankWindow::new(mem),
            width,
            height,
            stride: width * BYTES_PER_PIXEL,
        }
    }

    pub fn window(&self) -> &BankWindow<M> {
        &self.window
    }

    fn addr(&self, x: usize, y: usize) -> usize {
        y * self.stride + x * BYTES_PER_PIXEL
    }

    pub fn put_pixel(&mut self, x: usize, y: usize, color: Color) {
        self.put_raw(x, y, color.to_pixel());
    }

    pub fn put_raw(&mut self, x: usize, y: usize, pixel: u32) {
        if x < self.width && y < self.height {
            let addr = self.addr(x, y);
            self.window.write_u32(addr, pixel);
        }
    }

    /// Raw pixel value, 0 outside the screen.
    pub fn get_raw(&mut self, x: usize, y: usize) -> u32 {
        if x < self.width && y < self.height {
            let addr = self.addr(x, y);
            self.window.read_u32(addr)
        } else {
            0
        }
    }

    /// Fill a rectangular region, clipped to the screen.
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: Color) {
        let x_end = (x + width).min(self.width);
        let y_end = (y + height).min(self.height);
        if x >= x_end {
            return;
        }
        let pixel = color.to_pixel();
        for row in y..y_end {
            let addr = self.addr(x, row);
            self.window.fill(addr, x_end - x, pixel);
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.fill_rect(0, 0, self.width, self.height, color);
    }

    /// Moves `rows` full scanlines from `src_y` up to `dst_y`.
    pub fn copy_rows(&mut self, dst_y: usize, src_y: usize, rows: usize) {
        let rows = rows.min(self.height.saturating_sub(src_y));
        let words = rows * self.stride / BYTES_PER_PIXEL;
        self.window.copy(self.addr(0, dst_y), self.addr(0, src_y), words);
    }

    /// Draws `ch` with its cell background; `(x, y)` is the cell's top-left
    /// corner and `cell` its size in pixels.
    pub fn draw_glyph(
        &mut self,
        ch: char,
        x: usize,
        y: usize,
        cell: (usize, usize),
        fg: Color,
        bg: Color,
    ) {
        self.fill_rect(x, y, cell.0, cell.1, bg);
        if ch == ' ' {
            return;
        }
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_8X13)
            .text_color(fg.to_rgb888())
            .build();
        let mut buf = [0u8; 4];
        let s = ch.encode_utf8(&mut buf);
        Text::with_baseline(s, Point::new(x as i32, y as i32), style, Baseline::Top)
            .draw(self)
            .ok();
    }
}

impl<M: BankedMemory> DrawTarget for BankedFramebuffer<M> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 {
                continue;
            }
            self.put_pixel(x as usize, y as usize, Color::from_rgb888(color));
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        if let Some(bottom_right) = area.bottom_right() {
            let (x, y) = (area.top_left.x as usize, area.top_left.y as usize);
            let w = (bottom_right.x - area.top_left.x + 1) as usize;
            let h = (bottom_right.y - area.top_left.y + 1) as usize;
            self.fill_rect(x, y, w, h, Color::from_rgb888(color));
        }
        Ok(())
    }
}

impl<M: BankedMemory> OriginDimensions for BankedFramebuffer<M> {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::banked::testing::FlatBanks;
    use embedded_graphics::primitives::{Primitive, PrimitiveStyle};

    fn fb() -> BankedFramebuffer<FlatBanks> {
        BankedFramebuffer::new(FlatBanks::new(64 * 48 * 4), 64, 48)
    }

    #[test]
    fn pixels_round_trip_and_clip() {
        let mut fb = fb();
        fb.put_pixel(63, 47, Color::RED);
        fb.put_pixel(64, 0, Color::RED);
        assert_eq!(fb.get_raw(63, 47), Color::RED.to_pixel());
        assert_eq!(fb.get_raw(64, 0), 0);
    }

    #[test]
    fn glyph_fills_cell_and_sets_some_foreground() {
        let mut fb = fb();
        fb.draw_glyph('A', 8, 14, (8, 14), Color::WHITE, Color::DARK_GRAY);
        let mut fg = 0;
        let mut bg = 0;
        for y in 14..28 {
            for x in 8..16 {
                match fb.get_raw(x, y) {
                    p if p == Color::WHITE.to_pixel() => fg += 1,
                    p if p == Color::DARK_GRAY.to_pixel() => bg += 1,
                    p => panic!("unexpected pixel {p:#x}"),
                }
            }
        }
        assert!(fg > 10);
        assert_eq!(fg + bg, 8 * 14);
        // nothing outside the cell
        assert_eq!(fb.get_raw(7, 14), 0);
        assert_eq!(fb.get_raw(8, 28), 0);
    }

    #[test]
    fn embedded_graphics_fill_uses_clipped_rect() {
        let mut fb = fb();
        Rectangle::new(Point::new(60, 40), Size::new(10, 10))
            .into_styled(PrimitiveStyle::with_fill(Color::GREEN.to_rgb888()))
            .draw(&mut fb)
            .ok();
        assert_eq!(fb.get_raw(63, 47), Color::GREEN.to_pixel());
        assert_eq!(fb.get_raw(59, 40), 0);
    }

    #[test]
    fn copy_rows_moves_scanlines_up() {
        let mut fb = fb();
        fb.fill_rect(0, 10, 64, 1, Color::YELLOW);
        fb.copy_rows(0, 10, 38);
        assert_eq!(fb.get_raw(5, 0), Color::YELLOW.to_pixel());
        assert_eq!(fb.get_raw(5, 10), 0);
    }
}
