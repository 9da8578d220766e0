/*
 *  color.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  RGBA color value plus parsing of "#RRGGBB" strings and the small
 *  named palette accepted in the configuration file.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

/// Packed RGBA color, always fully opaque on the Nexus panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }
}

/// Looks up one of the named palette colors.
fn named(name: &str) -> Option<Rgba> {
    let c = match name {
        "black" => Rgba::new(0, 0, 0),
        "red" => Rgba::new(255, 0, 0),
        "green" => Rgba::new(0, 255, 0),
        "blue" => Rgba::new(0, 0, 255),
        "white" => Rgba::new(255, 255, 255),
        "yellow" => Rgba::new(255, 255, 0),
        "cyan" => Rgba::new(0, 255, 255),
        "magenta" => Rgba::new(255, 0, 255),
        "purple" => Rgba::new(128, 0, 128),
        "orange" => Rgba::new(255, 165, 0),
        "pink" => Rgba::new(255, 192, 203),
        "gray" => Rgba::new(128, 128, 128),
        "brown" => Rgba::new(165, 42, 42),
        "teal" => Rgba::new(0, 128, 128),
        "silver" => Rgba::new(192, 192, 192),
        _ => return None,
    };
    Some(c)
}

/// Parses a "#RRGGBB" hex string or a named color, falling back to
/// `default` when the input is not recognized.
pub fn parse_color(color_str: &str, default: Rgba) -> Rgba {
    // byte-indexed slicing below requires single-byte chars
    if color_str.len() == 7 && color_str.is_ascii() && color_str.starts_with('#') {
        let hex = &color_str[1..];
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            return Rgba::new(r, g, b);
        }
    }

    named(color_str).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#FF0000", Rgba::BLACK), Rgba::new(255, 0, 0));
        assert_eq!(parse_color("#00ff7f", Rgba::BLACK), Rgba::new(0, 255, 127));
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!(parse_color("orange", Rgba::BLACK), Rgba::new(255, 165, 0));
        assert_eq!(parse_color("teal", Rgba::BLACK), Rgba::new(0, 128, 128));
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(parse_color("", Rgba::WHITE), Rgba::WHITE);
        assert_eq!(parse_color("#GGGGGG", Rgba::WHITE), Rgba::WHITE);
        assert_eq!(parse_color("#FFF", Rgba::BLACK), Rgba::BLACK);
        assert_eq!(parse_color("chartreuse", Rgba::WHITE), Rgba::WHITE);
    }

    #[test]
    fn falls_back_on_multibyte_input() {
        // 7 bytes but only 6 chars: must not panic mid-codepoint
        assert_eq!(parse_color("#aébcd", Rgba::WHITE), Rgba::WHITE);
        assert_eq!(parse_color("#°°°", Rgba::BLACK), Rgba::BLACK);
    }
}
