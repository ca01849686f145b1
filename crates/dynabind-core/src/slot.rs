//! Function-pointer slots.
//!
//! A [`NativeFn`] is the Rust replacement for an annotated delegate field:
//! it starts empty, is filled by the binder, and is emptied again on
//! teardown before the library behind it is closed.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::platform::RawSymbol;
use crate::signature::{NativeFnPtr, NativeSignature};

/// A location the binder can store a resolved symbol into.
pub trait Slot: Send + Sync {
    /// Signature of the function type the slot holds.
    fn signature(&self) -> NativeSignature;

    /// Store `address` into the slot.
    ///
    /// # Safety
    /// `address` must be a function whose ABI matches [`Slot::signature`]
    /// and must stay valid until [`Slot::detach`] is called.
    unsafe fn attach(&self, address: RawSymbol);

    /// Clear the slot.
    fn detach(&self);

    fn is_bound(&self) -> bool;
}

/// Typed slot holding an optional `extern "C"` function pointer.
///
/// ```ignore
/// type AddFn = extern "C" fn(i32, i32) -> i32;
/// static ADD: NativeFn<AddFn> = NativeFn::new();
/// ```
pub struct NativeFn<F: NativeFnPtr> {
    inner: RwLock<Option<F>>,
}

impl<F: NativeFnPtr> NativeFn<F> {
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::const_rwlock(None),
        }
    }

    /// The bound function, or `None` before binding and after teardown.
    pub fn get(&self) -> Option<F> {
        *self.inner.read()
    }
}

impl<F: NativeFnPtr> Default for NativeFn<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: NativeFnPtr> std::fmt::Debug for NativeFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFn")
            .field("signature", &F::signature().to_string())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl<F: NativeFnPtr> Slot for NativeFn<F> {
    fn signature(&self) -> NativeSignature {
        F::signature()
    }

    unsafe fn attach(&self, address: RawSymbol) {
        *self.inner.write() = Some(F::from_raw(address));
    }

    fn detach(&self) {
        *self.inner.write() = None;
    }

    fn is_bound(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl<T: Slot + ?Sized> Slot for &'static T {
    fn signature(&self) -> NativeSignature {
        (**self).signature()
    }

    unsafe fn attach(&self, address: RawSymbol) {
        (**self).attach(address)
    }

    fn detach(&self) {
        (**self).detach()
    }

    fn is_bound(&self) -> bool {
        (**self).is_bound()
    }
}

impl<T: Slot + ?Sized> Slot for Arc<T> {
    fn signature(&self) -> NativeSignature {
        (**self).signature()
    }

    unsafe fn attach(&self, address: RawSymbol) {
        (**self).attach(address)
    }

    fn detach(&self) {
        (**self).detach()
    }

    fn is_bound(&self) -> bool {
        (**self).is_bound()
    }
}
