//! # sheetlink
//!
//! Inspect and edit spreadsheets through one interface, whether the document
//! is an `.xlsx` file on disk or a workbook open in a running Excel.
//!
//! - [`open_file`] / [`open_file_with`] - pick a backend and open a workbook
//! - [`Workbook`] / [`Worksheet`] - the operations every backend supports
//! - [`FileWorkbook`] - an `.xlsx` package edited in memory
//! - [`LiveWorkbook`] - a document driven through the COM bridge
//!
//! ## Example
//!
//! ```rust,no_run
//! use sheetlink::prelude::*;
//!
//! # fn main() -> sheetlink::Result<()> {
//! let (workbook, mut cleanup) = open_file("/data/report.xlsx")?;
//! let sheet = workbook.find_sheet("Summary")?;
//! let service = PagingRangeService::new(sheet.paging_strategy(4000)?);
//! for page in service.paging_ranges() {
//!     println!("{page}: {:?}", sheet.read_range(&page)?);
//! }
//! sheet.set_value("A1", "reviewed".into())?;
//! workbook.save()?;
//! cleanup.run()?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
pub mod file;
pub mod live;
pub mod prelude;
pub mod session;

pub use backend::{PivotTable, Table, Workbook, Worksheet};
pub use error::{Error, Result};
pub use file::{FileWorkbook, FileWorksheet};
pub use live::{LiveWorkbook, LiveWorksheet};
pub use session::{open_file, open_file_with, BackendPreference, Cleanup, LiveOptions, SessionConfig};

// Re-export core types
pub use sheetlink_core::paging::{PagingKind, PagingRangeService, PagingStrategy};
pub use sheetlink_core::style::{
    Border, BorderStyle, BorderType, CellStyle, FillPattern, FillShading, FillStyle, FillType,
    FontStyle, FontUnderline, FontVertAlign, Rgb, StyleRegistry,
};
pub use sheetlink_core::{cell_name, normalize_range, parse_range, CellValue, Range};
pub use sheetlink_excel_com::ExcelBridgeConfig;
