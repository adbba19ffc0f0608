//! Remote COM objects held by the bridge.

use std::cell::Cell;
use std::fmt;

use excel_com_protocol::Variant;

use crate::bridge::ExcelBridge;
use crate::error::{BridgeError, Result};

/// A scoped reference to an `IDispatch` object living in the bridge.
///
/// Dropping it sends `release` for the handle. Objects obtained from one
/// another are independent: releasing a child never releases its parent.
pub struct RemoteObject {
    bridge: ExcelBridge,
    handle: u64,
    released: Cell<bool>,
}

impl RemoteObject {
    pub(crate) fn new(bridge: ExcelBridge, handle: u64) -> Self {
        Self {
            bridge,
            handle,
            released: Cell::new(false),
        }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn bridge(&self) -> &ExcelBridge {
        &self.bridge
    }

    /// Pass this object as a call argument.
    pub fn as_arg(&self) -> Variant {
        Variant::Object(self.handle)
    }

    /// Property read. Objects in the result are released immediately; use
    /// [`RemoteObject::get_object`] to keep them.
    pub fn get(&self, name: &str) -> Result<Variant> {
        self.get_with(name, Vec::new())
    }

    pub fn get_with(&self, name: &str, args: Vec<Variant>) -> Result<Variant> {
        let value = self.bridge.get_property(self.handle, name, args)?;
        Ok(self.discard_object(value))
    }

    pub fn get_object(&self, name: &str) -> Result<RemoteObject> {
        self.get_object_with(name, Vec::new())
    }

    pub fn get_object_with(&self, name: &str, args: Vec<Variant>) -> Result<RemoteObject> {
        let value = self.bridge.get_property(self.handle, name, args)?;
        self.adopt(value, name)
    }

    pub fn set(&self, name: &str, value: impl Into<Variant>) -> Result<()> {
        self.set_with(name, Vec::new(), value)
    }

    pub fn set_with(&self, name: &str, args: Vec<Variant>, value: impl Into<Variant>) -> Result<()> {
        self.bridge
            .set_property(self.handle, name, args, value.into())
    }

    /// Method call. Objects in the result are released immediately; use
    /// [`RemoteObject::call_object`] to keep them.
    pub fn call(&self, name: &str, args: Vec<Variant>) -> Result<Variant> {
        let value = self.bridge.call_method(self.handle, name, args)?;
        Ok(self.discard_object(value))
    }

    pub fn call_object(&self, name: &str, args: Vec<Variant>) -> Result<RemoteObject> {
        let value = self.bridge.call_method(self.handle, name, args)?;
        self.adopt(value, name)
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        match self.get(name)? {
            Variant::String(s) => Ok(s),
            Variant::Empty | Variant::Null => Ok(String::new()),
            value => Err(unexpected(name, value, "string")),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value
            .as_i64()
            .ok_or_else(|| unexpected(name, value, "integer"))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let value = self.get(name)?;
        value
            .as_bool()
            .ok_or_else(|| unexpected(name, value, "boolean"))
    }

    /// Drop the handle now, reporting bridge failures.
    pub fn release(self) -> Result<()> {
        self.released.set(true);
        self.bridge.release(self.handle)
    }

    fn adopt(&self, value: Variant, member: &str) -> Result<RemoteObject> {
        match value {
            Variant::Object(handle) => Ok(RemoteObject::new(self.bridge.clone(), handle)),
            value => Err(unexpected(member, value, "object")),
        }
    }

    fn discard_object(&self, value: Variant) -> Variant {
        match value {
            Variant::Object(handle) => {
                drop(RemoteObject::new(self.bridge.clone(), handle));
                Variant::Empty
            }
            value => value,
        }
    }
}

fn unexpected(member: &str, value: Variant, expected: &'static str) -> BridgeError {
    BridgeError::UnexpectedValue {
        member: member.to_string(),
        value,
        expected,
    }
}

impl Drop for RemoteObject {
    fn drop(&mut self) {
        if self.released.get() {
            return;
        }
        if let Err(e) = self.bridge.release(self.handle) {
            tracing::warn!(handle = self.handle, "failed to release remote object: {e}");
        }
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("handle", &self.handle)
            .finish()
    }
}
