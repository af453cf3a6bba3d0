// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation colours.

/// Label colours offered in the label dialog. The first is the default.
pub const PALETTE: [&str; 8] = [
    "#ff3b30", // red
    "#ff9500", // orange
    "#ffcc00", // yellow
    "#34c759", // green
    "#007aff", // blue
    "#5856d6", // purple
    "#ff2d55", // pink
    "#8e8e93", // gray
];

pub const DEFAULT_LABEL_COLOR: &str = PALETTE[0];

/// Measurement line, handles and chip.
pub const MEASURE_RGBA: [u8; 4] = [0, 120, 255, 242];

/// Fallback for labels whose colour cannot be parsed.
pub const FALLBACK_LABEL_RGBA: [u8; 4] = [255, 0, 0, 242];

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(text: &str) -> Option<[u8; 4]> {
    let hex = text.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgba[i] = v * 17;
            }
            Some(rgba)
        }
        6 | 8 => {
            let mut rgba = [255u8; 4];
            for i in 0..hex.len() / 2 {
                rgba[i] = channel(&hex[i * 2..i * 2 + 2])?;
            }
            Some(rgba)
        }
        _ => None,
    }
}

/// Colour of a label, falling back to translucent red.
pub fn label_rgba(color: &str) -> [u8; 4] {
    parse_hex_color(color).unwrap_or(FALLBACK_LABEL_RGBA)
}
