//! Shared protocol types for communication between the sheetlink client
//! and the Windows COM bridge process.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! The bridge does not know anything about spreadsheets; it relays late-bound
//! `IDispatch` property gets, property puts and method calls against remote
//! objects identified by numeric handles.

use serde::{Deserialize, Serialize};

/// A command sent from the client to the bridge process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params", rename_all = "snake_case")]
pub enum Command {
    /// Initialize COM (single-threaded apartment).
    Init,

    /// Attach to the running instance registered for `prog_id`.
    /// Returns [`ResponseData::Application`].
    AttachApplication { prog_id: String },

    /// Start a new instance of `prog_id`. Returns [`ResponseData::Application`].
    LaunchApplication { prog_id: String },

    /// `target.name(args...)` as a property read. Returns [`ResponseData::Value`].
    GetProperty {
        target: u64,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Variant>,
    },

    /// `target.name(args...) = value`.
    SetProperty {
        target: u64,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Variant>,
        value: Variant,
    },

    /// `target.name(args...)` as a method call. Returns [`ResponseData::Value`].
    CallMethod {
        target: u64,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Variant>,
    },

    /// Drop the bridge's reference to a remote object.
    Release { handle: u64 },

    /// Read the bitmap currently on the clipboard. Returns [`ResponseData::Image`].
    CaptureClipboardImage,

    /// Release every handle, quit a launched application and uninitialize COM.
    Shutdown,
}

/// A COM `VARIANT` as it crosses the wire.
///
/// Objects never cross the wire themselves; the bridge keeps them in a
/// handle table and sends the handle instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Empty,
    Null,
    Bool(bool),
    Int(i32),
    Number(f64),
    String(String),
    /// Handle of a remote object.
    Object(u64),
    /// `VT_ERROR` with its `SCODE` (cell errors such as `#N/A` arrive this way).
    Error(i32),
    /// An omitted optional argument.
    Missing,
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty | Variant::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Numeric value of `Int` and `Number`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Int(i) => Some(*i as f64),
            Variant::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer value of `Int`, or of a `Number` without a fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i as i64),
            Variant::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<u64> {
        match self {
            Variant::Object(h) => Some(*h),
            _ => None,
        }
    }
}

/// A response sent from the bridge back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

impl Response {
    pub fn ok(id: u64, data: Option<ResponseData>) -> Self {
        Self {
            id,
            result: ResponseResult::Ok { data },
        }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: ResponseResult::Error {
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Handle of the application object, and whether the bridge started it.
    Application { handle: u64, launched: bool },
    /// Result of a property read or method call.
    Value { value: Variant },
    /// Clipboard bitmap as a base64-encoded BMP file.
    Image { bmp_base64: String },
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i32> for Variant {
    fn from(n: i32) -> Self {
        Variant::Int(n)
    }
}

impl From<f64> for Variant {
    fn from(n: f64) -> Self {
        Variant::Number(n)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Empty | Variant::Null | Variant::Missing => Ok(()),
            Variant::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Number(n) => write!(f, "{n}"),
            Variant::String(s) => write!(f, "{s}"),
            Variant::Object(h) => write!(f, "<object {h}>"),
            Variant::Error(code) => write!(f, "#ERR({code})"),
        }
    }
}
