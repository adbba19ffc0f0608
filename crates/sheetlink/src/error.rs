//! Error types for sheetlink

use sheetlink_excel_com::BridgeError;
use sheetlink_xlsx::XlsxError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by workbooks, worksheets and the session selector
#[derive(Debug, Error)]
pub enum Error {
    /// The document exists but could not be opened by any backend
    #[error("Failed to open workbook {path}: {message}")]
    Open { path: String, message: String },

    #[error("Workbook not found: {0}")]
    WorkbookNotFound(String),

    /// Paths must be absolute and OS-native
    #[error("Invalid workbook path {0:?}: path must be absolute")]
    InvalidPath(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The sheet to copy from does not exist
    #[error("Source sheet not found: {0}")]
    SourceNotFound(String),

    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    #[error("{operation} is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: &'static str,
        backend: &'static str,
    },

    /// Another live session already owns this thread's COM apartment
    #[error("A live session is already active on this thread")]
    ApartmentBusy,

    /// The live session was closed while a workbook or worksheet was still held
    #[error("The live session has been closed")]
    SessionClosed,

    /// Range, coordinate or style validation error
    #[error(transparent)]
    Core(#[from] sheetlink_core::Error),

    #[error(transparent)]
    Xlsx(XlsxError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        Error::UnsupportedOperation { operation, backend }
    }

    pub(crate) fn style<S: Into<String>>(msg: S) -> Self {
        Error::Core(sheetlink_core::Error::style(msg))
    }

    /// True for failures caused by the caller's input rather than the backend
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidPath(_)
                | Error::SheetNotFound(_)
                | Error::SourceNotFound(_)
                | Error::DuplicateSheetName(_)
                | Error::Core(_)
        ) || matches!(
            self,
            Error::Xlsx(XlsxError::InvalidSheetName(_) | XlsxError::InvalidTable(_))
        )
    }
}

impl From<XlsxError> for Error {
    fn from(e: XlsxError) -> Self {
        match e {
            XlsxError::SheetNotFound(name) => Error::SheetNotFound(name),
            XlsxError::DuplicateSheetName(name) => Error::DuplicateSheetName(name),
            XlsxError::Core(e) => Error::Core(e),
            e => Error::Xlsx(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xlsx_errors_are_classified() {
        let err: Error = XlsxError::SheetNotFound("Data".into()).into();
        assert!(matches!(err, Error::SheetNotFound(ref n) if n == "Data"));
        assert!(err.is_validation());

        let err: Error = XlsxError::MissingPart("xl/workbook.xml".into()).into();
        assert!(matches!(err, Error::Xlsx(_)));
        assert!(!err.is_validation());

        let err: Error = XlsxError::Core(sheetlink_core::Error::InvalidRangeFormat("A0".into())).into();
        assert!(matches!(err, Error::Core(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_unsupported_message() {
        let err = Error::unsupported("capture_picture", "file");
        assert_eq!(
            err.to_string(),
            "capture_picture is not supported by the file backend"
        );
        assert!(!err.is_validation());
    }
}
