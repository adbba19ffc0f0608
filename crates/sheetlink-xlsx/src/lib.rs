//! # sheetlink-xlsx
//!
//! An in-memory model of an `.xlsx` package, used by sheetlink's file
//! backend. Cells, styles, shared strings, tables and defined names are
//! editable; every part the model does not understand is preserved as-is.
//!
//! ## Example
//!
//! ```rust
//! use sheetlink_xlsx::Document;
//!
//! let mut doc = Document::new();
//! doc.set_value("Sheet1", 2, 3, 42.0).unwrap();
//! let bytes = doc.to_bytes().unwrap();
//!
//! let reopened = Document::from_bytes(&bytes).unwrap();
//! assert_eq!(reopened.cell_text("Sheet1", 2, 3).unwrap(), "42");
//! ```

pub mod color;
mod document;
mod error;
pub mod formula;
mod package;
mod shared_strings;
mod sheet;
pub mod styles;
mod table;
mod xml;

pub use color::{NativeColor, ThemePalette};
pub use document::{quote_sheet_name, validate_sheet_name, DefinedName, Document, MAX_SHEET_NAME_LEN};
pub use error::{XlsxError, XlsxResult};
pub use shared_strings::SharedStrings;
pub use sheet::{Cell, CellContent, PivotInfo, TableInfo, Worksheet};
pub use styles::{BorderDef, Edge, Fill, Font, GradientStop, StyleSheet, Xf};
pub use table::{validate_table_name, DEFAULT_TABLE_STYLE};
