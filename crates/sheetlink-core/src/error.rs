//! Error types for sheetlink-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Validation errors raised by the range, paging and style models
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Range text is not A1 notation
    #[error("Invalid range format: {0:?}")]
    InvalidRangeFormat(String),

    /// Column or row number outside the sheet grid
    #[error("Invalid coordinate: column {col}, row {row}")]
    InvalidCoordinate { col: u32, row: u32 },

    /// Range is not part of the allowed area
    #[error("Range {range} is out of bounds of {bounds}")]
    RangeOutOfBounds { range: String, bounds: String },

    /// Range holds more cells than one page may
    #[error("Range {range} has {cells} cells, more than the page budget of {budget}")]
    PageTooLarge {
        range: String,
        cells: u64,
        budget: usize,
    },

    /// Range lies in the print area but is not one of its pages
    #[error("Range {0} does not match a print page")]
    NotAPage(String),

    /// Nothing to page: no used range or no usable print area
    #[error("Sheet has no pages")]
    NoPages,

    /// Style value cannot be expressed in the requested representation
    #[error("Style conversion error: {0}")]
    StyleConversion(String),
}

impl Error {
    pub fn style<S: Into<String>>(msg: S) -> Self {
        Error::StyleConversion(msg.into())
    }
}
