//! Safe wrapper around IDispatch for late-bound COM automation.
//!
//! Every member is resolved by name through `GetIDsOfNames` and invoked
//! through `Invoke`, the way VBScript talks to Excel.

#![cfg(windows)]

use std::mem::ManuallyDrop;
use std::ptr;

use windows::{
    core::{Interface, IUnknown, BSTR, GUID, HSTRING, PCWSTR},
    Win32::{
        Foundation::{DISP_E_EXCEPTION, DISP_E_PARAMNOTFOUND, VARIANT_BOOL},
        Globalization::GetSystemDefaultLCID,
        System::{
            Com::{
                CLSIDFromProgID, CoCreateInstance, IDispatch, CLSCTX_LOCAL_SERVER,
                DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT,
                DISPPARAMS, EXCEPINFO,
            },
            Ole::{GetActiveObject, DISPID_PROPERTYPUT},
            Variant::{
                VARIANT, VT_BOOL, VT_BSTR, VT_DATE, VT_DISPATCH, VT_EMPTY, VT_ERROR, VT_I1, VT_I2,
                VT_I4, VT_INT, VT_NULL, VT_R4, VT_R8, VT_UI1, VT_UI2, VT_UI4,
            },
        },
    },
};

// -- VARIANT construction helpers --
// The VARIANT struct wraps inner unions in ManuallyDrop, so we use ptr::write
// to set fields without triggering the DerefMut lint.

pub fn variant_empty() -> VARIANT {
    VARIANT::default()
}

pub fn variant_null() -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_NULL);
        v
    }
}

pub fn variant_bool(val: bool) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_BOOL);
        ptr::write(
            &mut inner.Anonymous.boolVal,
            VARIANT_BOOL(if val { -1 } else { 0 }),
        );
        v
    }
}

pub fn variant_f64(val: f64) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_R8);
        ptr::write(&mut inner.Anonymous.dblVal, val);
        v
    }
}

pub fn variant_i32(val: i32) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_I4);
        ptr::write(&mut inner.Anonymous.lVal, val);
        v
    }
}

pub fn variant_str(val: &str) -> VARIANT {
    unsafe {
        let bstr = BSTR::from(val);
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_BSTR);
        ptr::write(&mut inner.Anonymous.bstrVal, ManuallyDrop::new(bstr));
        v
    }
}

/// `VT_ERROR` carrying an `SCODE`
pub fn variant_error(scode: i32) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_ERROR);
        ptr::write(&mut inner.Anonymous.scode, scode);
        v
    }
}

/// An omitted optional argument
pub fn variant_missing() -> VARIANT {
    variant_error(DISP_E_PARAMNOTFOUND.0)
}

pub fn variant_dispatch(disp: &IDispatch) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_DISPATCH);
        ptr::write(
            &mut inner.Anonymous.pdispVal,
            ManuallyDrop::new(Some(disp.clone())),
        );
        v
    }
}

/// Get the VT type of a VARIANT.
pub fn variant_vt(v: &VARIANT) -> u16 {
    unsafe { v.Anonymous.Anonymous.vt.0 }
}

pub fn variant_is_empty(v: &VARIANT) -> bool {
    unsafe { v.Anonymous.Anonymous.vt == VT_EMPTY }
}

pub fn variant_is_null(v: &VARIANT) -> bool {
    unsafe { v.Anonymous.Anonymous.vt == VT_NULL }
}

pub fn variant_get_bool(v: &VARIANT) -> Option<bool> {
    unsafe {
        if v.Anonymous.Anonymous.vt == VT_BOOL {
            Some(v.Anonymous.Anonymous.Anonymous.boolVal.0 != 0)
        } else {
            None
        }
    }
}

/// Integer types that fit an `i32`
pub fn variant_get_i32(v: &VARIANT) -> Option<i32> {
    unsafe {
        let vt = v.Anonymous.Anonymous.vt;
        let anon = &v.Anonymous.Anonymous.Anonymous;
        if vt == VT_I4 || vt == VT_INT {
            Some(anon.lVal)
        } else if vt == VT_I2 {
            Some(anon.iVal as i32)
        } else if vt == VT_I1 {
            Some(anon.cVal as i32)
        } else if vt == VT_UI1 {
            Some(anon.bVal as i32)
        } else if vt == VT_UI2 {
            Some(anon.uiVal as i32)
        } else if vt == VT_UI4 {
            i32::try_from(anon.ulVal).ok()
        } else {
            None
        }
    }
}

/// Floating point types; dates arrive as their serial number
pub fn variant_get_f64(v: &VARIANT) -> Option<f64> {
    unsafe {
        let vt = v.Anonymous.Anonymous.vt;
        let anon = &v.Anonymous.Anonymous.Anonymous;
        if vt == VT_R8 {
            Some(anon.dblVal)
        } else if vt == VT_R4 {
            Some(anon.fltVal as f64)
        } else if vt == VT_DATE {
            Some(anon.date)
        } else if vt == VT_UI4 {
            Some(anon.ulVal as f64)
        } else {
            None
        }
    }
}

pub fn variant_get_string(v: &VARIANT) -> Option<String> {
    unsafe {
        if v.Anonymous.Anonymous.vt == VT_BSTR {
            let bstr = &v.Anonymous.Anonymous.Anonymous.bstrVal;
            Some(bstr.to_string())
        } else {
            None
        }
    }
}

pub fn variant_get_error(v: &VARIANT) -> Option<i32> {
    unsafe {
        if v.Anonymous.Anonymous.vt == VT_ERROR {
            Some(v.Anonymous.Anonymous.Anonymous.scode)
        } else {
            None
        }
    }
}

/// `Some(None)` for a `VT_DISPATCH` holding a null pointer
pub fn variant_get_dispatch(v: &VARIANT) -> Option<Option<IDispatch>> {
    unsafe {
        if v.Anonymous.Anonymous.vt == VT_DISPATCH {
            // pdispVal is ManuallyDrop<Option<IDispatch>>
            let opt_disp: &Option<IDispatch> = &v.Anonymous.Anonymous.Anonymous.pdispVal;
            Some(opt_disp.clone())
        } else {
            None
        }
    }
}

// -- DispatchObject --

/// A wrapper around an IDispatch COM object providing ergonomic access.
#[derive(Clone)]
pub struct DispatchObject {
    inner: IDispatch,
}

impl DispatchObject {
    /// Start a new COM server for a ProgID (e.g., "Excel.Application").
    pub fn create_from_progid(progid: &str) -> Result<Self, String> {
        unsafe {
            let clsid = clsid_from_progid(progid)?;
            let disp: IDispatch = CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| format!("CoCreateInstance failed for '{progid}': {e}"))?;
            Ok(Self { inner: disp })
        }
    }

    /// Attach to the instance registered in the running object table.
    pub fn active_from_progid(progid: &str) -> Result<Self, String> {
        unsafe {
            let clsid = clsid_from_progid(progid)?;
            let mut unknown: Option<IUnknown> = None;
            GetActiveObject(&clsid, None, &mut unknown)
                .map_err(|e| format!("GetActiveObject failed for '{progid}': {e}"))?;
            let unknown = unknown.ok_or_else(|| format!("no running instance of '{progid}'"))?;
            let disp: IDispatch = unknown
                .cast()
                .map_err(|e| format!("'{progid}' does not expose IDispatch: {e}"))?;
            Ok(Self { inner: disp })
        }
    }

    pub fn from_idispatch(disp: IDispatch) -> Self {
        Self { inner: disp }
    }

    pub fn as_idispatch(&self) -> &IDispatch {
        &self.inner
    }

    fn get_dispid(&self, name: &str) -> Result<i32, String> {
        unsafe {
            let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
            let names = [PCWSTR(wide.as_ptr())];
            let mut dispid = 0i32;
            self.inner
                .GetIDsOfNames(
                    &GUID::zeroed(),
                    names.as_ptr(),
                    1,
                    GetSystemDefaultLCID(),
                    &mut dispid,
                )
                .map_err(|e| format!("GetIDsOfNames('{name}') failed: {e}"))?;
            Ok(dispid)
        }
    }

    /// Invoke `name` with arguments in natural order; they are reversed as
    /// DISPPARAMS requires. For a property put, `value` is passed as the
    /// named `DISPID_PROPERTYPUT` argument after the index arguments.
    fn invoke(
        &self,
        name: &str,
        flags: DISPATCH_FLAGS,
        args: Vec<VARIANT>,
        value: Option<VARIANT>,
    ) -> Result<VARIANT, String> {
        let dispid = self.get_dispid(name)?;
        let is_put = value.is_some();
        let mut reversed: Vec<VARIANT> = value.into_iter().chain(args.into_iter().rev()).collect();
        let mut named_args = [DISPID_PROPERTYPUT];
        unsafe {
            let params = DISPPARAMS {
                rgvarg: if reversed.is_empty() {
                    ptr::null_mut()
                } else {
                    reversed.as_mut_ptr()
                },
                rgdispidNamedArgs: if is_put {
                    named_args.as_mut_ptr()
                } else {
                    ptr::null_mut()
                },
                cArgs: reversed.len() as u32,
                cNamedArgs: if is_put { 1 } else { 0 },
            };
            let mut result = VARIANT::default();
            let mut except = EXCEPINFO::default();
            self.inner
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    GetSystemDefaultLCID(),
                    flags,
                    &params,
                    if is_put { None } else { Some(&mut result) },
                    Some(&mut except),
                    None,
                )
                .map_err(|e| format_invoke_error(e, &except, name))?;
            Ok(result)
        }
    }

    /// `obj.Name(args...)`
    pub fn get_property(&self, name: &str, args: Vec<VARIANT>) -> Result<VARIANT, String> {
        self.invoke(name, DISPATCH_PROPERTYGET, args, None)
    }

    /// `obj.Name(args...) = value`
    pub fn set_property(&self, name: &str, args: Vec<VARIANT>, value: VARIANT) -> Result<(), String> {
        self.invoke(name, DISPATCH_PROPERTYPUT, args, Some(value))
            .map(|_| ())
    }

    /// `obj.Name args...`; some members are both methods and properties, so
    /// both flags are passed.
    pub fn invoke_method(&self, name: &str, args: Vec<VARIANT>) -> Result<VARIANT, String> {
        self.invoke(
            name,
            DISPATCH_METHOD | DISPATCH_PROPERTYGET,
            args,
            None,
        )
    }
}

unsafe fn clsid_from_progid(progid: &str) -> Result<GUID, String> {
    let hstr = HSTRING::from(progid);
    CLSIDFromProgID(&hstr).map_err(|e| format!("CLSIDFromProgID('{progid}') failed: {e}"))
}

/// Format an Invoke error, including EXCEPINFO details if available.
fn format_invoke_error(err: windows::core::Error, except: &EXCEPINFO, member_name: &str) -> String {
    if err.code() == DISP_E_EXCEPTION {
        let desc = if !except.bstrDescription.is_empty() {
            except.bstrDescription.to_string()
        } else {
            String::from("(no description)")
        };
        let source = if !except.bstrSource.is_empty() {
            except.bstrSource.to_string()
        } else {
            String::from("(no source)")
        };
        format!("COM exception in '{member_name}': {desc} (source: {source})")
    } else {
        format!("Invoke('{member_name}') failed: {err}")
    }
}
