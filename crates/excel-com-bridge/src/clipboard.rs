//! Reading the bitmap Excel puts on the clipboard after `CopyPicture`.

#![cfg(windows)]

use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use windows::Win32::Foundation::HGLOBAL;
use windows::Win32::System::DataExchange::{
    CloseClipboard, GetClipboardData, IsClipboardFormatAvailable, OpenClipboard,
};
use windows::Win32::System::Memory::{GlobalLock, GlobalSize, GlobalUnlock};

use crate::bmp::dib_to_bmp;

const CF_DIB: u32 = 8;
const OPEN_ATTEMPTS: u32 = 10;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Closes the clipboard when dropped.
struct OpenedClipboard;

impl OpenedClipboard {
    fn open() -> Result<Self, String> {
        // Excel may still hold the clipboard right after CopyPicture
        let mut last_error = None;
        for _ in 0..OPEN_ATTEMPTS {
            match unsafe { OpenClipboard(None) } {
                Ok(()) => return Ok(Self),
                Err(e) => last_error = Some(e),
            }
            thread::sleep(OPEN_RETRY_DELAY);
        }
        Err(match last_error {
            Some(e) => format!("OpenClipboard failed: {e}"),
            None => "OpenClipboard failed".to_string(),
        })
    }
}

impl Drop for OpenedClipboard {
    fn drop(&mut self) {
        let _ = unsafe { CloseClipboard() };
    }
}

/// Copy the clipboard's `CF_DIB` into a BMP file, base64 encoded.
pub fn read_bitmap_base64() -> Result<String, String> {
    let _clipboard = OpenedClipboard::open()?;
    unsafe {
        IsClipboardFormatAvailable(CF_DIB)
            .map_err(|_| "clipboard does not contain a bitmap".to_string())?;
        let handle =
            GetClipboardData(CF_DIB).map_err(|e| format!("GetClipboardData failed: {e}"))?;
        let global = HGLOBAL(handle.0);
        let size = GlobalSize(global);
        let data = GlobalLock(global) as *const u8;
        if data.is_null() || size == 0 {
            return Err("clipboard bitmap is empty".to_string());
        }
        let dib = std::slice::from_raw_parts(data, size).to_vec();
        let _ = GlobalUnlock(global);

        let bmp = dib_to_bmp(&dib)?;
        tracing::debug!(bytes = bmp.len(), "captured clipboard bitmap");
        Ok(STANDARD.encode(bmp))
    }
}
