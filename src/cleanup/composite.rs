/// Compositing a cut-out foreground onto a solid background
///
/// The background removal step leaves an RGBA image whose alpha channel
/// marks the subject. Here it is flattened onto an opaque color so the
/// result can be written as a plain RGB JPEG or PNG.

use image::{Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Opaque RGB background color
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    pub const WHITE: BackgroundColor = BackgroundColor([255, 255, 255]);
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl FromStr for BackgroundColor {
    type Err = Error;

    /// Accepts "#rrggbb", "rrggbb" or "r,g,b"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidColor(s.to_string());
        let trimmed = s.trim();

        if trimmed.contains(',') {
            let parts: Vec<u8> = trimmed
                .split(',')
                .map(|part| part.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?;
            return match parts.as_slice() {
                [r, g, b] => Ok(BackgroundColor([*r, *g, *b])),
                _ => Err(invalid()),
            };
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(BackgroundColor([channel(0)?, channel(2)?, channel(4)?]))
    }
}

/// Alpha-composite `foreground` over an opaque `background` and drop alpha.
/// The output has the same pixel dimensions as the input.
pub fn flatten_onto(foreground: &RgbaImage, background: BackgroundColor) -> RgbImage {
    let (width, height) = foreground.dimensions();
    let mut out = RgbImage::new(width, height);

    for (x, y, pixel) in foreground.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |fg: u8, bg: u8| -> u8 {
            // Rounded integer blend; exact at alpha 0 and 255
            ((fg as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8
        };
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(r, background.0[0]),
                blend(g, background.0[1]),
                blend(b, background.0[2]),
            ]),
        );
    }

    out
}
