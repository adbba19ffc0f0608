//! One live session per thread
//!
//! Remote handles are only meaningful on the thread that opened the session,
//! so the slot is thread-local and the guard is `!Send`.

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::{Error, Result};

thread_local! {
    static APARTMENT_TAKEN: Cell<bool> = const { Cell::new(false) };
}

/// Holds this thread's live-session slot until dropped
#[derive(Debug)]
pub(crate) struct ApartmentGuard {
    _not_send: PhantomData<Rc<()>>,
}

impl ApartmentGuard {
    pub(crate) fn acquire() -> Result<Self> {
        APARTMENT_TAKEN.with(|taken| {
            if taken.replace(true) {
                return Err(Error::ApartmentBusy);
            }
            Ok(Self {
                _not_send: PhantomData,
            })
        })
    }
}

impl Drop for ApartmentGuard {
    fn drop(&mut self) {
        APARTMENT_TAKEN.with(|taken| taken.set(false));
    }
}
