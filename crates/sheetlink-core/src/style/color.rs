//! `#RRGGBB` colors and the packed BGR integers used by automation objects

use crate::error::{Error, Result};
use std::fmt;

/// An opaque 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`, `RRGGBB` or ARGB `AARRGGBB` (alpha is dropped)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let invalid = || Error::style(format!("invalid color {hex:?}"));
        let digits = hex.trim().trim_start_matches('#');
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let digits = match digits.len() {
            6 => digits,
            8 => &digits[2..],
            _ => return Err(invalid()),
        };
        let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
        Ok(Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        })
    }

    /// Uppercase `#RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Uppercase opaque `FFRRGGBB`
    pub fn to_argb_hex(&self) -> String {
        format!("FF{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Pack as `0x00BBGGRR`
    pub fn to_bgr(&self) -> i32 {
        self.r as i32 | (self.g as i32) << 8 | (self.b as i32) << 16
    }

    /// Unpack a `0x00BBGGRR` integer; higher bits are ignored
    pub fn from_bgr(value: i64) -> Self {
        Self {
            r: (value & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: ((value >> 16) & 0xFF) as u8,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// `#RRGGBB` to packed BGR
pub fn hex_to_bgr(hex: &str) -> Result<i32> {
    Ok(Rgb::from_hex(hex)?.to_bgr())
}

/// Packed BGR to uppercase `#RRGGBB`
pub fn bgr_to_hex(value: i64) -> String {
    Rgb::from_bgr(value).to_hex()
}

/// Re-render any accepted hex spelling as uppercase `#RRGGBB`
pub fn normalize_hex(hex: &str) -> Result<String> {
    Ok(Rgb::from_hex(hex)?.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bgr_swaps_byte_order() {
        assert_eq!(hex_to_bgr("#FF0000").unwrap(), 0x0000FF);
        assert_eq!(hex_to_bgr("#0000FF").unwrap(), 0xFF0000);
        assert_eq!(hex_to_bgr("#123456").unwrap(), 0x563412);
        assert_eq!(bgr_to_hex(0x563412), "#123456");
    }

    #[test]
    fn test_round_trip_uppercases() {
        assert_eq!(bgr_to_hex(hex_to_bgr("#abcdef").unwrap() as i64), "#ABCDEF");
        assert_eq!(normalize_hex("ff00aa").unwrap(), "#FF00AA");
    }

    #[test]
    fn test_argb() {
        let c = Rgb::from_hex("FF336699").unwrap();
        assert_eq!(c, Rgb::new(0x33, 0x66, 0x99));
        assert_eq!(c.to_argb_hex(), "FF336699");
    }

    #[test]
    fn test_invalid_colors() {
        for bad in ["", "#12345", "#GGGGGG", "red", "#1234567", "#+12345", "+1234567"] {
            assert!(Rgb::from_hex(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_multibyte_text_is_rejected() {
        for bad in ["#a\u{e9}xxxxx", "\u{e9}\u{e9}\u{e9}\u{e9}", "#12\u{e9}345"] {
            assert!(Rgb::from_hex(bad).is_err(), "{bad:?}");
        }
    }

    proptest! {
        #[test]
        fn test_hex_survives_bgr_packing(r: u8, g: u8, b: u8) {
            let hex = Rgb::new(r, g, b).to_hex();
            let packed = hex_to_bgr(&hex).unwrap();
            prop_assert_eq!(bgr_to_hex(packed as i64), hex);
        }

        #[test]
        fn test_arbitrary_text_never_panics(text in "\\PC{0,10}") {
            let _ = Rgb::from_hex(&text);
        }
    }
}
