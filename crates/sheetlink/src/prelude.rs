//! Prelude module - common imports for sheetlink users
//!
//! ```rust
//! use sheetlink::prelude::*;
//! ```

pub use crate::{
    // Sessions
    open_file,
    open_file_with,
    BackendPreference,
    Cleanup,
    SessionConfig,

    // Backend interface
    Workbook,
    Worksheet,

    // Cell and range types
    CellValue,
    Range,

    // Paging
    PagingRangeService,
    PagingStrategy,

    // Style types
    CellStyle,
    FillStyle,
    FontStyle,

    // Error types
    Error,
    Result,
};
