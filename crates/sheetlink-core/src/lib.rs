//! # sheetlink-core
//!
//! Backend-independent building blocks for sheetlink:
//! - [`Range`] - A1-style range notation and coordinate math
//! - [`paging`] - Slicing a worksheet into bounded pages
//! - [`style`] - The [`CellStyle`] model shared by every backend
//! - [`CellValue`] - Literal values written into cells
//!
//! ## Example
//!
//! ```rust
//! use sheetlink_core::paging::{FixedSizeStrategy, PagingRangeService};
//! use sheetlink_core::Range;
//!
//! let dimension = Range::parse("A1:B1000").unwrap();
//! let service = PagingRangeService::new(Box::new(FixedSizeStrategy::new(1000, Some(dimension))));
//! assert_eq!(service.paging_ranges(), vec!["A1:B500", "A501:B1000"]);
//! ```

pub mod error;
pub mod paging;
pub mod range;
pub mod style;
pub mod value;

pub use error::{Error, Result};
pub use paging::{PagingKind, PagingRangeService, PagingStrategy};
pub use range::{
    cell_coordinates, cell_name, column_name, column_number, normalize_range, parse_range, Range,
    MAX_COLS, MAX_ROWS,
};
pub use style::CellStyle;
pub use value::CellValue;
