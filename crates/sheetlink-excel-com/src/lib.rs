//! Client for the Excel COM bridge process.
//!
//! The bridge is a Windows `.exe` (run natively, or under WINE on Linux) that
//! relays late-bound COM calls over JSON-over-stdio. This crate spawns it and
//! exposes the objects it holds as [`RemoteObject`] handles that release
//! themselves when dropped.
//!
//! # Architecture
//!
//! ```text
//! sheetlink live backend
//!     └── ExcelBridge (this crate)
//!           └── spawns: [wine] excel-com-bridge.exe
//!                 └── COM: Excel.Application
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sheetlink_excel_com::{ExcelBridge, ExcelBridgeConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = ExcelBridge::start(&ExcelBridgeConfig::default())?;
//!     let app = bridge.attach_application("Excel.Application")?;
//!     let workbooks = app.get_object("Workbooks")?;
//!     println!("{} workbooks open", workbooks.get_i64("Count")?);
//!     drop(workbooks);
//!     drop(app);
//!     bridge.shutdown()?;
//!     Ok(())
//! }
//! ```

mod bridge;
mod error;
mod object;

pub use bridge::{linux_to_wine_path, ExcelBridge, ExcelBridgeConfig, BRIDGE_EXE_ENV};
pub use error::{BridgeError, Result};
pub use excel_com_protocol::Variant;
pub use object::RemoteObject;
