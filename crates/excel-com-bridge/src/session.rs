//! Bridge state: the remote object handle table and command execution.

#![cfg(windows)]

use excel_com_protocol::{Command, ResponseData, Variant};
use windows::Win32::System::Variant::VARIANT;

use crate::clipboard;
use crate::dispatch::{
    variant_bool, variant_dispatch, variant_empty, variant_error, variant_f64, variant_get_bool,
    variant_get_dispatch, variant_get_error, variant_get_f64, variant_get_i32, variant_get_string,
    variant_i32, variant_is_empty, variant_is_null, variant_missing, variant_null, variant_str,
    variant_vt, DispatchObject,
};
use crate::handles::HandleTable;

/// Objects handed out to the client, keyed by handle.
pub struct Session {
    objects: HandleTable<DispatchObject>,
    /// Application handle, if the bridge started the application itself.
    launched: Option<u64>,
    com_initialized: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            objects: HandleTable::new(),
            launched: None,
            com_initialized: false,
        }
    }

    fn insert(&mut self, object: DispatchObject) -> u64 {
        self.objects.insert(object)
    }

    fn object(&self, handle: u64) -> Result<&DispatchObject, String> {
        self.objects
            .get(handle)
            .ok_or_else(|| format!("Unknown object handle: {handle}"))
    }

    fn require_com(&self) -> Result<(), String> {
        if self.com_initialized {
            Ok(())
        } else {
            Err("COM not initialized. Send 'init' first.".to_string())
        }
    }

    /// Run one command. `Shutdown` is handled by [`Session::shutdown`].
    pub fn execute(&mut self, command: &Command) -> Result<Option<ResponseData>, String> {
        match command {
            Command::Init => {
                self.init()?;
                Ok(None)
            }
            Command::AttachApplication { prog_id } => {
                self.require_com()?;
                let app = DispatchObject::active_from_progid(prog_id)?;
                let handle = self.insert(app);
                tracing::info!(prog_id = %prog_id, handle, "attached to running application");
                Ok(Some(ResponseData::Application {
                    handle,
                    launched: false,
                }))
            }
            Command::LaunchApplication { prog_id } => {
                self.require_com()?;
                let app = DispatchObject::create_from_progid(prog_id)?;
                let handle = self.insert(app);
                self.launched = Some(handle);
                tracing::info!(prog_id = %prog_id, handle, "launched application");
                Ok(Some(ResponseData::Application {
                    handle,
                    launched: true,
                }))
            }
            Command::GetProperty { target, name, args } => {
                let args = self.native_args(args)?;
                let result = self.object(*target)?.get_property(name, args)?;
                Ok(Some(ResponseData::Value {
                    value: self.wire_value(&result)?,
                }))
            }
            Command::SetProperty {
                target,
                name,
                args,
                value,
            } => {
                let args = self.native_args(args)?;
                let value = self.native_value(value)?;
                self.object(*target)?.set_property(name, args, value)?;
                Ok(None)
            }
            Command::CallMethod { target, name, args } => {
                let args = self.native_args(args)?;
                let result = self.object(*target)?.invoke_method(name, args)?;
                Ok(Some(ResponseData::Value {
                    value: self.wire_value(&result)?,
                }))
            }
            Command::Release { handle } => {
                // the launched application stays reachable for Quit on shutdown
                if self.launched != Some(*handle) {
                    self.objects.remove(*handle);
                }
                Ok(None)
            }
            Command::CaptureClipboardImage => {
                self.require_com()?;
                let bmp_base64 = clipboard::read_bitmap_base64()?;
                Ok(Some(ResponseData::Image { bmp_base64 }))
            }
            Command::Shutdown => self.shutdown().map(|()| None),
        }
    }

    fn init(&mut self) -> Result<(), String> {
        use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

        if self.com_initialized {
            return Ok(());
        }
        // Excel requires a single-threaded apartment
        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(|e| format!("CoInitializeEx failed: {e}"))?;
        }
        self.com_initialized = true;
        tracing::info!("COM initialized (STA)");
        Ok(())
    }

    /// Release every handle newest first, quit an application the bridge launched, and
    /// uninitialize COM. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), String> {
        let mut result = Ok(());
        if let Some(handle) = self.launched.take() {
            if let Some(app) = self.objects.get(handle) {
                if let Err(e) = app.invoke_method("Quit", Vec::new()) {
                    result = Err(format!("Quit failed: {e}"));
                }
            }
        }
        let released = self.objects.release_all();
        if released > 0 {
            tracing::debug!(released, "released remaining handles");
        }
        if self.com_initialized {
            unsafe {
                windows::Win32::System::Com::CoUninitialize();
            }
            self.com_initialized = false;
            tracing::info!("COM uninitialized");
        }
        result
    }

    fn native_args(&self, values: &[Variant]) -> Result<Vec<VARIANT>, String> {
        values.iter().map(|v| self.native_value(v)).collect()
    }

    fn native_value(&self, value: &Variant) -> Result<VARIANT, String> {
        Ok(match value {
            Variant::Empty => variant_empty(),
            Variant::Null => variant_null(),
            Variant::Bool(b) => variant_bool(*b),
            Variant::Int(i) => variant_i32(*i),
            Variant::Number(n) => variant_f64(*n),
            Variant::String(s) => variant_str(s),
            Variant::Object(handle) => variant_dispatch(self.object(*handle)?.as_idispatch()),
            Variant::Error(code) => variant_error(*code),
            Variant::Missing => variant_missing(),
        })
    }

    /// Returned objects are entered into the handle table.
    fn wire_value(&mut self, value: &VARIANT) -> Result<Variant, String> {
        if variant_is_empty(value) {
            return Ok(Variant::Empty);
        }
        if variant_is_null(value) {
            return Ok(Variant::Null);
        }
        if let Some(b) = variant_get_bool(value) {
            return Ok(Variant::Bool(b));
        }
        if let Some(i) = variant_get_i32(value) {
            return Ok(Variant::Int(i));
        }
        if let Some(n) = variant_get_f64(value) {
            return Ok(Variant::Number(n));
        }
        if let Some(s) = variant_get_string(value) {
            return Ok(Variant::String(s));
        }
        if let Some(code) = variant_get_error(value) {
            return Ok(Variant::Error(code));
        }
        if let Some(disp) = variant_get_dispatch(value) {
            return Ok(match disp {
                Some(disp) => Variant::Object(self.insert(DispatchObject::from_idispatch(disp))),
                None => Variant::Null,
            });
        }
        Err(format!("unsupported VARIANT type (VT={})", variant_vt(value)))
    }
}
