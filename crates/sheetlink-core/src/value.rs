//! Values written into cells

use std::fmt;

/// A literal cell value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Interpret user text the way a spreadsheet would on entry:
    /// numbers and `TRUE`/`FALSE` become typed values, everything else text.
    pub fn infer(text: &str) -> Self {
        if text.is_empty() {
            return CellValue::Empty;
        }
        if text.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && text.trim() == text => CellValue::Number(n),
            _ => CellValue::Text(text.to_string()),
        }
    }
}

/// Render a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer() {
        assert_eq!(CellValue::infer("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::infer("-1.5"), CellValue::Number(-1.5));
        assert_eq!(CellValue::infer("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::infer(" 42"), CellValue::Text(" 42".into()));
        assert_eq!(CellValue::infer("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(CellValue::infer("abc"), CellValue::Text("abc".into()));
        assert_eq!(CellValue::infer(""), CellValue::Empty);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(0.25).to_string(), "0.25");
        assert_eq!(CellValue::Bool(false).to_string(), "FALSE");
        assert_eq!(CellValue::from(Some("x")).to_string(), "x");
        assert_eq!(CellValue::from(None::<f64>), CellValue::Empty);
    }
}
