use crate::error::{MapError, Result};
use macroquad::color::Color;

/// Parse a Tiled hex color.
///
/// Tiled writes `#RRGGBB` or `#AARRGGBB` (alpha first); the short `#RGB` and
/// `#ARGB` forms are accepted as well. The leading `#` is optional.
pub fn parse_hex_color(input: &str) -> Result<Color> {
    let hex = input.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    let invalid = || MapError::InvalidColor(input.to_owned());

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_owned(),
        _ => return Err(invalid()),
    };

    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    let (a, rgb) = if expanded.len() == 8 {
        (byte(0)?, 2)
    } else {
        (255, 0)
    };

    Ok(Color::from_rgba(byte(rgb)?, byte(rgb + 2)?, byte(rgb + 4)?, a))
}
