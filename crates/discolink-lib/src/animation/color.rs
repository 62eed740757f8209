//! Color helpers for the pixel strips.

use smart_leds::RGB8;

use crate::error::{DiscoError, Result};

/// Strip off.
pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Classic 3-segment color wheel: red → green → blue → red over `0..=255`.
pub fn colorwheel(pos: u8) -> RGB8 {
    let pos = 255 - pos;
    if pos < 85 {
        RGB8 {
            r: 255 - pos * 3,
            g: 0,
            b: pos * 3,
        }
    } else if pos < 170 {
        let pos = pos - 85;
        RGB8 {
            r: 0,
            g: pos * 3,
            b: 255 - pos * 3,
        }
    } else {
        let pos = pos - 170;
        RGB8 {
            r: pos * 3,
            g: 255 - pos * 3,
            b: 0,
        }
    }
}

/// Parse a color string into an [`RGB8`].
///
/// Accepts:
/// - Hex: `"#FF0000"`, `"FF0000"`, `"#ff0000"`
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`, `"purple"`, `"cyan"`, `"black"`/`"off"`
pub fn parse_color(s: &str) -> Result<RGB8> {
    let s = s.trim();

    let named = match s.to_lowercase().as_str() {
        "red" => Some(0xFF0000),
        "green" => Some(0x00FF00),
        "blue" => Some(0x0000FF),
        "white" => Some(0xFFFFFF),
        "orange" => Some(0xFF8000),
        "yellow" => Some(0xFFFF00),
        "purple" => Some(0x8000FF),
        "cyan" => Some(0x00FFFF),
        "off" | "black" => Some(0x000000),
        _ => None,
    };
    if let Some(val) = named {
        return Ok(rgb_from_u32(val));
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return Err(DiscoError::Config(format!(
            "Invalid color: {s} (use #RRGGBB or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| DiscoError::Config(format!("Invalid hex color: {s}")))?;
    Ok(rgb_from_u32(val))
}

/// Format a color as `#RRGGBB`.
pub fn format_color(c: RGB8) -> String {
    format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)
}

const fn rgb_from_u32(val: u32) -> RGB8 {
    RGB8 {
        r: ((val >> 16) & 0xFF) as u8,
        g: ((val >> 8) & 0xFF) as u8,
        b: (val & 0xFF) as u8,
    }
}
