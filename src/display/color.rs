//! Console colours and their 32-bpp pixel encoding.
use embedded_graphics_core::pixelcolor::{Rgb888, RgbColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const LIGHT_GRAY: Color = Color::new(192, 192, 192);
    pub const DARK_GRAY: Color = Color::new(64, 64, 64);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const CHOCOLATE: Color = Color::new(123, 63, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// `0x00RRGGBB`, the layout of a 32-bpp VBE pixel.
    pub const fn to_pixel(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub const fn from_pixel(pixel: u32) -> Self {
        Self::from_hex(pixel & 0x00FF_FFFF)
    }

    pub fn to_rgb888(self) -> Rgb888 {
        Rgb888::new(self.r, self.g, self.b)
    }

    pub fn from_rgb888(c: Rgb888) -> Self {
        Self::new(c.r(), c.g(), c.b())
    }
}
