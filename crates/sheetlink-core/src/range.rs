//! A1-style range notation
//!
//! Coordinates are 1-based: column `A` is 1 and the first row is 1. A range
//! always renders with both corners (`"B2:B2"`), but a single reference such
//! as `"B2"` parses to the same degenerate rectangle.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (`XFD`)
pub const MAX_COLS: u32 = 16_384;

/// An axis-aligned rectangle of cells
///
/// Invariant: `start_col <= end_col` and `start_row <= end_row`, all
/// coordinates inside the sheet grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_col: u32,
    pub start_row: u32,
    pub end_col: u32,
    pub end_row: u32,
}

impl Range {
    /// Create a range from two corners, reordering them if needed
    pub fn new(start_col: u32, start_row: u32, end_col: u32, end_row: u32) -> Result<Self> {
        check_coordinate(start_col, start_row)?;
        check_coordinate(end_col, end_row)?;
        Ok(Self {
            start_col: start_col.min(end_col),
            start_row: start_row.min(end_row),
            end_col: start_col.max(end_col),
            end_row: start_row.max(end_row),
        })
    }

    /// A one-cell range
    pub fn cell(col: u32, row: u32) -> Result<Self> {
        Self::new(col, row, col, row)
    }

    /// Parse `"A1:C10"`, `"$A$1:$C$10"` or a single reference like `"B2"`
    ///
    /// # Examples
    /// ```
    /// use sheetlink_core::Range;
    ///
    /// let r = Range::parse("B2").unwrap();
    /// assert_eq!((r.start_col, r.start_row, r.end_col, r.end_row), (2, 2, 2, 2));
    /// assert_eq!(r.to_string(), "B2:B2");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let mut parts = text.split(':');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(Error::InvalidRangeFormat(s.to_string()));
        }

        let (c1, r1) = parse_cell_reference(first).ok_or_else(|| invalid(s))??;
        let (c2, r2) = match second {
            Some(end) => parse_cell_reference(end).ok_or_else(|| invalid(s))??,
            None => (c1, r1),
        };
        Self::new(c1, r1, c2, r2)
    }

    /// Number of columns spanned
    pub fn columns(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    /// Number of rows spanned
    pub fn rows(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.columns() as u64 * self.rows() as u64
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_col == self.end_col && self.start_row == self.end_row
    }

    /// True iff `inner` lies entirely inside this range (inclusive)
    pub fn contains(&self, inner: &Range) -> bool {
        inner.start_col >= self.start_col
            && inner.end_col <= self.end_col
            && inner.start_row >= self.start_row
            && inner.end_row <= self.end_row
    }

    pub fn contains_cell(&self, col: u32, row: u32) -> bool {
        (self.start_col..=self.end_col).contains(&col)
            && (self.start_row..=self.end_row).contains(&row)
    }

    /// Fail with `RangeOutOfBounds` unless this range lies inside `bounds`
    pub fn validate_within(&self, bounds: &Range) -> Result<()> {
        if bounds.contains(self) {
            Ok(())
        } else {
            Err(Error::RangeOutOfBounds {
                range: self.to_string(),
                bounds: bounds.to_string(),
            })
        }
    }

    /// Smallest range covering both this range and the given cell
    pub fn extend_to(&self, col: u32, row: u32) -> Range {
        Range {
            start_col: self.start_col.min(col),
            start_row: self.start_row.min(row),
            end_col: self.end_col.max(col),
            end_row: self.end_row.max(row),
        }
    }

    /// Smallest range covering both ranges
    pub fn union(&self, other: &Range) -> Range {
        self.extend_to(other.start_col, other.start_row)
            .extend_to(other.end_col, other.end_row)
    }

    /// Top-left cell name
    pub fn start_cell(&self) -> String {
        format_cell(self.start_col, self.start_row)
    }

    /// Bottom-right cell name
    pub fn end_cell(&self) -> String {
        format_cell(self.end_col, self.end_row)
    }

    /// Cell coordinates in row-major order as `(col, row)` pairs
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> {
        let Range {
            start_col,
            start_row,
            end_col,
            end_row,
        } = *self;
        (start_row..=end_row).flat_map(move |row| (start_col..=end_col).map(move |col| (col, row)))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_cell(), self.end_cell())
    }
}

impl FromStr for Range {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse a range string; see [`Range::parse`]
pub fn parse_range(s: &str) -> Result<Range> {
    Range::parse(s)
}

/// Parse then re-render, dropping `$` anchors and ordering the corners
pub fn normalize_range(s: &str) -> Result<String> {
    Ok(Range::parse(s)?.to_string())
}

/// Name of the cell at `(col, row)`, e.g. `(3, 10)` is `"C10"`
pub fn cell_name(col: u32, row: u32) -> Result<String> {
    check_coordinate(col, row)?;
    Ok(format_cell(col, row))
}

/// Inverse of [`cell_name`]; accepts `$` anchors
pub fn cell_coordinates(name: &str) -> Result<(u32, u32)> {
    parse_cell_reference(name).ok_or_else(|| invalid(name))?
}

/// Column letters for a 1-based column number (1 = A, 27 = AA)
pub fn column_name(col: u32) -> Result<String> {
    check_coordinate(col, 1)?;
    Ok(column_letters(col))
}

/// 1-based column number for column letters (case-insensitive)
pub fn column_number(letters: &str) -> Result<u32> {
    if letters.is_empty() || letters.len() > 3 || !letters.bytes().all(|b| b.is_ascii_alphabetic())
    {
        return Err(invalid(letters));
    }
    let col = letters_to_number(letters);
    check_coordinate(col, 1)?;
    Ok(col)
}

/// Parse a defined-name area such as `'My Sheet'!$A$1:$E$50`
///
/// The sheet qualifier is dropped; for multi-area references only the first
/// area is used. Returns `None` when the text is not a cell area.
pub fn parse_area_reference(reference: &str) -> Option<Range> {
    let first = first_area(reference.trim());
    let area = match first.rfind('!') {
        Some(pos) => &first[pos + 1..],
        None => first,
    };
    Range::parse(area).ok()
}

fn first_area(reference: &str) -> &str {
    let mut quoted = false;
    for (i, ch) in reference.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            ',' if !quoted => return &reference[..i],
            _ => {}
        }
    }
    reference
}

fn invalid(s: &str) -> Error {
    Error::InvalidRangeFormat(s.to_string())
}

fn check_coordinate(col: u32, row: u32) -> Result<()> {
    if (1..=MAX_COLS).contains(&col) && (1..=MAX_ROWS).contains(&row) {
        Ok(())
    } else {
        Err(Error::InvalidCoordinate { col, row })
    }
}

fn format_cell(col: u32, row: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

fn column_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

fn letters_to_number(letters: &str) -> u32 {
    letters
        .bytes()
        .fold(0, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u32)
}

/// `None` for syntax errors, `Some(Err)` for references outside the grid
fn parse_cell_reference(s: &str) -> Option<Result<(u32, u32)>> {
    let bytes = s.trim().as_bytes();
    let mut pos = 0;

    if bytes.get(pos) == Some(&b'$') {
        pos += 1;
    }
    let col_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    let letters = &bytes[col_start..pos];
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    if bytes.get(pos) == Some(&b'$') {
        pos += 1;
    }
    let digits = &bytes[pos..];
    if digits.is_empty() || digits.len() > 7 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let col = letters_to_number(std::str::from_utf8(letters).ok()?);
    let row: u32 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some(check_coordinate(col, row).map(|_| (col, row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_single_reference() {
        let r = Range::parse("B2").unwrap();
        assert_eq!(
            r,
            Range {
                start_col: 2,
                start_row: 2,
                end_col: 2,
                end_row: 2
            }
        );
        assert_eq!(normalize_range("B2").unwrap(), "B2:B2");
    }

    #[test]
    fn test_parse_anchored_and_lowercase() {
        let r = Range::parse("$a$1:c$10").unwrap();
        assert_eq!(r.to_string(), "A1:C10");
        assert_eq!(r.columns(), 3);
        assert_eq!(r.rows(), 10);
        assert_eq!(r.cell_count(), 30);
    }

    #[test]
    fn test_parse_reversed_corners() {
        assert_eq!(normalize_range("D5:A1").unwrap(), "A1:D5");
        assert_eq!(normalize_range("A5:D1").unwrap(), "A1:D5");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", ":", "A", "1", "A1:", "A1:B2:C3", "A0", "1A", "A1B", "ABCD1", "A 1"] {
            assert!(
                matches!(Range::parse(bad), Err(Error::InvalidRangeFormat(_)) | Err(Error::InvalidCoordinate { .. })),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_parse_outside_grid() {
        assert_eq!(
            Range::parse("XFE1"),
            Err(Error::InvalidCoordinate { col: 16_385, row: 1 })
        );
        assert!(Range::parse("XFD1048576").is_ok());
        assert!(Range::parse("A1048577").is_err());
    }

    #[test]
    fn test_cell_name_round_trip() {
        assert_eq!(cell_name(1, 1).unwrap(), "A1");
        assert_eq!(cell_name(26, 3).unwrap(), "Z3");
        assert_eq!(cell_name(27, 3).unwrap(), "AA3");
        assert_eq!(cell_name(16_384, 1).unwrap(), "XFD1");
        assert_eq!(cell_coordinates("$AA$3").unwrap(), (27, 3));
        assert_eq!(cell_name(0, 1), Err(Error::InvalidCoordinate { col: 0, row: 1 }));
        assert!(cell_name(1, MAX_ROWS + 1).is_err());
    }

    #[test]
    fn test_column_conversions() {
        assert_eq!(column_name(52).unwrap(), "AZ");
        assert_eq!(column_number("az").unwrap(), 52);
        assert!(column_number("XFE").is_err());
        assert!(column_number("").is_err());
    }

    #[test]
    fn test_contains() {
        let outer = Range::parse("A1:D10").unwrap();
        assert!(outer.contains(&Range::parse("B2:C3").unwrap()));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&Range::parse("C9:E10").unwrap()));
        assert!(Range::parse("E1").unwrap().validate_within(&outer).is_err());
    }

    #[test]
    fn test_extend_to() {
        let dim = Range::parse("A1:D5").unwrap();
        assert_eq!(dim.extend_to(6, 10).to_string(), "A1:F10");
        assert_eq!(dim.extend_to(2, 2), dim);
        let moved = Range::parse("C3:D4").unwrap().extend_to(1, 1);
        assert_eq!(moved.to_string(), "A1:D4");
    }

    #[test]
    fn test_cells_row_major() {
        let cells: Vec<_> = Range::parse("A1:B2").unwrap().cells().collect();
        assert_eq!(cells, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_parse_area_reference() {
        assert_eq!(
            parse_area_reference("'My Sheet'!$A$1:$E$50").unwrap().to_string(),
            "A1:E50"
        );
        assert_eq!(
            parse_area_reference("'a,b'!$A$1:$B$2,'a,b'!$D$1:$E$2")
                .unwrap()
                .to_string(),
            "A1:B2"
        );
        assert_eq!(parse_area_reference("Sheet1!$A:$C"), None);
        assert_eq!(parse_area_reference("#REF!"), None);
    }
}
