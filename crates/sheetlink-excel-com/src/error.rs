//! Errors from the Excel COM bridge.

use std::time::Duration;

use excel_com_protocol::Variant;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn bridge process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Failed to send command to bridge: {0}")]
    SendFailed(String),

    #[error("Failed to read response from bridge: {0}")]
    ReadFailed(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The bridge ran the command and COM reported an error
    #[error("Bridge returned error: {0}")]
    Remote(String),

    #[error("Response {got} does not answer request {expected}")]
    ResponseMismatch { expected: u64, got: u64 },

    #[error("Unexpected response data for {0}")]
    UnexpectedResponse(&'static str),

    #[error("'{member}' returned {value:?}, expected {expected}")]
    UnexpectedValue {
        member: String,
        value: Variant,
        expected: &'static str,
    },

    #[error("Bridge did not start within {0:?}")]
    StartupTimeout(Duration),

    #[error("WINE not found. Install WINE and ensure 'wine' is in PATH.")]
    WineNotFound,

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(String),
}
