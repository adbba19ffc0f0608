//! XLSX error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while loading, editing or saving a package
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// No sheet with this name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Sheet name already used in the workbook
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Sheet name breaks the naming rules
    #[error("Invalid sheet name: {0:?}")]
    InvalidSheetName(String),

    /// Table name is invalid or already taken
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Range, coordinate or style validation error
    #[error(transparent)]
    Core(#[from] sheetlink_core::Error),
}

impl From<quick_xml::events::attributes::AttrError> for XlsxError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        XlsxError::Xml(quick_xml::Error::InvalidAttr(e))
    }
}

impl From<std::string::FromUtf8Error> for XlsxError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        XlsxError::InvalidFormat(format!("part is not UTF-8: {e}"))
    }
}
