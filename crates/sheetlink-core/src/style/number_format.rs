//! Number format helpers

use once_cell::sync::Lazy;
use regex::Regex;

/// The built-in "General" format
pub const GENERAL_FORMAT: &str = "General";

/// The built-in text format
pub const TEXT_FORMAT: &str = "@";

static DECIMAL_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([0#]+)").expect("decimal run regex must compile"));

/// Number of `0`/`#` placeholders after the first literal decimal point
///
/// # Examples
/// ```
/// use sheetlink_core::style::decimal_places;
///
/// assert_eq!(decimal_places("#,##0.00"), 2);
/// assert_eq!(decimal_places("0%"), 0);
/// ```
pub fn decimal_places(format: &str) -> u32 {
    DECIMAL_RUN
        .captures(format)
        .and_then(|c| c.get(1))
        .map_or(0, |m| m.as_str().len() as u32)
}

/// Rewrite `format` so it shows `places` decimals
///
/// The first decimal run is replaced; formats without one (or no format at
/// all) become a plain `0.00…` pattern.
pub fn format_with_decimal_places(format: Option<&str>, places: u32) -> String {
    let zeros = "0".repeat(places as usize);
    let replacement = if places == 0 {
        String::new()
    } else {
        format!(".{zeros}")
    };

    if let Some(format) = format {
        if let Some(run) = DECIMAL_RUN.find(format) {
            let mut out = String::with_capacity(format.len() + places as usize);
            out.push_str(&format[..run.start()]);
            out.push_str(&replacement);
            out.push_str(&format[run.end()..]);
            return out;
        }
    }
    format!("0{replacement}")
}
