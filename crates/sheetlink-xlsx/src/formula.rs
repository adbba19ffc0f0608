//! Relative reference shifting for shared formulas
//!
//! A shared formula is stored once on its anchor cell; every other cell in
//! the group carries only the group index. On load each member gets its own
//! formula text with the relative references moved by its offset from the
//! anchor, so cells can be edited independently afterwards.

use once_cell::sync::Lazy;
use regex::Regex;
use sheetlink_core::{column_name, column_number, MAX_ROWS};

static CELL_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]{1,7})").expect("cell reference pattern must compile")
});

/// Move every relative reference in `formula` by `rows`/`cols`
///
/// `$`-anchored parts stay put; text inside string literals and quoted
/// sheet names is left alone. References pushed off the grid become `#REF!`.
pub fn shift_formula(formula: &str, rows: i64, cols: i64) -> String {
    if rows == 0 && cols == 0 {
        return formula.to_string();
    }
    let mut out = String::with_capacity(formula.len() + 8);
    let mut quote: Option<char> = None;
    let mut segment_start = 0;

    for (i, ch) in formula.char_indices() {
        match quote {
            Some(q) if ch == q => {
                out.push_str(&formula[segment_start..=i]);
                segment_start = i + 1;
                quote = None;
            }
            Some(_) => {}
            None if ch == '"' || ch == '\'' => {
                out.push_str(&shift_segment(&formula[segment_start..i], rows, cols));
                segment_start = i;
                quote = Some(ch);
            }
            None => {}
        }
    }
    let rest = &formula[segment_start..];
    if quote.is_some() {
        out.push_str(rest);
    } else {
        out.push_str(&shift_segment(rest, rows, cols));
    }
    out
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn shift_segment(text: &str, rows: i64, cols: i64) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in CELL_REF.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let (start, end) = (whole.start(), whole.end());
        if start > 0 && (is_name_byte(bytes[start - 1]) || bytes[start - 1] == b'$') {
            continue;
        }
        if end < bytes.len() && (is_name_byte(bytes[end]) || bytes[end] == b'(') {
            continue;
        }
        let Ok(col) = column_number(&caps[2]) else { continue };
        let Ok(row) = caps[4].parse::<i64>() else { continue };

        let col_fixed = !caps[1].is_empty();
        let row_fixed = !caps[3].is_empty();
        let new_col = if col_fixed { col as i64 } else { col as i64 + cols };
        let new_row = if row_fixed { row } else { row + rows };

        out.push_str(&text[last..start]);
        match (u32::try_from(new_col).ok().map(column_name), new_row) {
            (Some(Ok(letters)), r) if (1..=MAX_ROWS as i64).contains(&r) => {
                out.push_str(&caps[1]);
                out.push_str(&letters);
                out.push_str(&caps[3]);
                out.push_str(&r.to_string());
            }
            _ => out.push_str("#REF!"),
        }
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
