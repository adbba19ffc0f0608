//! The capability interface shared by the file and live backends
//!
//! Callers only ever see `dyn Workbook` and `dyn Worksheet`. Cells and ranges
//! are addressed with A1 strings; they are validated with the range model
//! before a backend sees them.

use std::fmt;

use sheetlink_core::{cell_coordinates, cell_name, CellStyle, CellValue, PagingStrategy, Range};

use crate::error::Result;

/// A table (list object) on a worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub range: Range,
}

/// A pivot table on a worksheet, located by the range it renders into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    pub name: String,
    pub range: Range,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.range)
    }
}

impl fmt::Display for PivotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.range)
    }
}

/// An open workbook, either an in-memory package or a live document
pub trait Workbook {
    /// `"file"` or `"live"`
    fn backend_name(&self) -> &'static str;

    /// Sheet names in tab order
    fn sheet_names(&self) -> Result<Vec<String>>;

    /// Every sheet, in tab order
    fn sheets(&self) -> Result<Vec<Box<dyn Worksheet>>>;

    /// Locate a sheet by name (case-insensitive)
    fn find_sheet(&self, name: &str) -> Result<Box<dyn Worksheet>>;

    /// Add an empty sheet; fails with `DuplicateSheetName` if the name is taken
    fn create_new_sheet(&self, name: &str) -> Result<()>;

    /// Copy `src` to a new sheet right after it and return the name used
    ///
    /// A taken `dst` becomes `dst (2)`, `dst (3)`, ...
    fn copy_sheet(&self, src: &str, dst: &str) -> Result<String>;

    /// Persist the document in place
    fn save(&self) -> Result<()>;
}

/// One sheet of a [`Workbook`]
pub trait Worksheet {
    fn name(&self) -> Result<String>;

    /// Display text of a cell; formulas are never evaluated locally
    fn get_value(&self, cell: &str) -> Result<String>;

    fn set_value(&self, cell: &str, value: CellValue) -> Result<()>;

    /// Formula of a cell without the leading `=`, empty if it holds a literal
    fn get_formula(&self, cell: &str) -> Result<String>;

    fn set_formula(&self, cell: &str, formula: &str) -> Result<()>;

    /// Bounding range of the used cells, `A1:A1` for an empty sheet
    fn dimension(&self) -> Result<Range>;

    /// Paging policy for this sheet, frozen at the time of the call
    fn paging_strategy(&self, budget: usize) -> Result<Box<dyn PagingStrategy>>;

    fn tables(&self) -> Result<Vec<Table>>;

    fn pivot_tables(&self) -> Result<Vec<PivotTable>>;

    /// Turn `range` into a table whose header row is the first row
    fn add_table(&self, range: &str, name: &str) -> Result<Table>;

    /// Formatting of a cell, with fields equal to the defaults left unset
    fn cell_style(&self, cell: &str) -> Result<CellStyle>;

    /// Apply the set fields of `style`; unset fields are left alone
    fn set_cell_style(&self, cell: &str, style: &CellStyle) -> Result<()>;

    /// Picture of a range as a base64 BMP
    fn capture_picture(&self, range: &str) -> Result<String>;

    /// Drop backend resources held by this sheet
    fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    /// Display text of every cell of `range`, row by row
    fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let range = Range::parse(range)?;
        let mut rows = Vec::with_capacity(range.rows() as usize);
        for row in range.start_row..=range.end_row {
            let mut values = Vec::with_capacity(range.columns() as usize);
            for col in range.start_col..=range.end_col {
                values.push(self.get_value(&cell_name(col, row)?)?);
            }
            rows.push(values);
        }
        Ok(rows)
    }

    /// Write `rows` starting at the `top_left` cell
    ///
    /// Stops at the first failure; cells already written stay written.
    fn write_range(&self, top_left: &str, rows: &[Vec<CellValue>]) -> Result<()> {
        let (start_col, start_row) = cell_coordinates(top_left)?;
        for (row, values) in (start_row..).zip(rows) {
            for (col, value) in (start_col..).zip(values) {
                self.set_value(&cell_name(col, row)?, value.clone())?;
            }
        }
        Ok(())
    }
}

/// Validate a single cell reference and return its coordinates
pub(crate) fn parse_cell(cell: &str) -> Result<(u32, u32)> {
    Ok(cell_coordinates(cell)?)
}
