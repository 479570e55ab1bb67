/*
 * nestri - A CLI tool to manage your cloud gaming service
 * Copyright (C) 2025 Nestri <contact@nestri.io>
 *
 * This program is free software; you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation; either version 2 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along
 * with this program; if not, write to the Free Software Foundation, Inc.,
 * 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.
 */

//! Palette handling for the banner: hex parsing, vertical banding and
//! downsampling 24-bit colors for terminals without true color.

use crossterm::style::Color;
use std::cmp;
use thiserror::Error;

use crate::terminal::ColorSupport;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("invalid hex color '{0}'")]
    InvalidHex(String),

    #[error("palette must contain at least one color")]
    EmptyPalette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ColorError::InvalidHex(hex.to_string()))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Terminal color for this value, or `None` when color is disabled.
    pub fn to_terminal(self, support: ColorSupport) -> Option<Color> {
        match support {
            ColorSupport::TrueColor => Some(Color::Rgb {
                r: self.r,
                g: self.g,
                b: self.b,
            }),
            ColorSupport::Ansi256 => Some(Color::AnsiValue(rgb_to_256color(self.r, self.g, self.b))),
            ColorSupport::None => None,
        }
    }
}

/// Convert 24-bit RGB values to the closest 256-color palette index
pub fn rgb_to_256color(r: u8, g: u8, b: u8) -> u8 {
    // The 256-color palette consists of:
    // - Colors 0-15: Standard 16 ANSI colors
    // - Colors 16-231: 6x6x6 RGB color cube
    // - Colors 232-255: 24 grayscale colors

    // Check if it's a grayscale color (when R, G, B are very close)
    let max_diff = cmp::max(
        cmp::max((r as i16 - g as i16).abs(), (g as i16 - b as i16).abs()),
        (r as i16 - b as i16).abs(),
    );

    if max_diff < 8 {
        // It's grayscale, use the grayscale palette (colors 232-255)
        let gray_avg = ((r as u16 + g as u16 + b as u16) / 3) as u8;
        if gray_avg < 8 {
            return 16; // Black from the color cube
        } else if gray_avg > 238 {
            return 231; // White from the color cube
        } else {
            // Map to grayscale colors 232-255 (24 levels)
            let scaled = (gray_avg.saturating_sub(8) as u16 * 23 / 230) as u8;
            return 232 + scaled.min(23);
        }
    }

    // Convert to 6x6x6 RGB color cube (colors 16-231)
    let r6 = (r as u16 * 5 / 255) as u8;
    let g6 = (g as u16 * 5 / 255) as u8;
    let b6 = (b as u16 * 5 / 255) as u8;

    16 + (36 * r6) + (6 * g6) + b6
}

/// Palette index for `line` out of `line_count` lines.
///
/// Lines are split into `palette_len` equal bands from top to bottom. The
/// result is always within `0..palette_len`; a zero-length palette maps
/// everything to 0.
pub fn band_index(line: usize, line_count: usize, palette_len: usize) -> usize {
    if palette_len == 0 {
        return 0;
    }
    let band = cmp::max(1, line_count / palette_len);
    cmp::min(line / band, palette_len - 1)
}

/// An ordered, non-empty list of colors applied top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn from_hex(hex: &[&str]) -> Result<Self, ColorError> {
        if hex.is_empty() {
            return Err(ColorError::EmptyPalette);
        }
        let colors = hex.iter().map(|h| Rgb::from_hex(h)).collect::<Result<_, _>>()?;
        Ok(Self { colors })
    }

    pub fn color_for_line(&self, line: usize, line_count: usize) -> Rgb {
        self.colors[band_index(line, line_count, self.colors.len())]
    }
}
