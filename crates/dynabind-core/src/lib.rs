//! Native library resolution and binding.
//!
//! Hosts declare function-pointer slots in explicit binding tables. At
//! startup the [`LifecycleController`] loads configuration, finds each
//! declared library on the configured search paths, resolves every symbol
//! and stores the addresses into the slots. On shutdown or reload it clears
//! the slots and closes the libraries.
//!
//! ```ignore
//! type AddFn = extern "C" fn(i32, i32) -> i32;
//! static ADD: NativeFn<AddFn> = NativeFn::new();
//!
//! let source = StaticSource::new().with_module(
//!     BindingModule::new("game.math").with_type(
//!         BindingType::new("Math")
//!             .library("mathlib")
//!             .field(FieldBinding::new("Add", "add_ints", NativeSignature::of::<AddFn>(), &ADD)),
//!     ),
//! );
//! let controller = LifecycleController::new(source);
//! controller.initialize(&ConfigFile("dynabind.toml".into()))?;
//! assert_eq!(ADD.get().unwrap()(2, 3), 5);
//! ```

pub mod binder;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod platform;
pub mod registry;
pub mod resolver;
pub mod signature;
pub mod slot;
pub mod source;
pub mod telemetry;

#[cfg(test)]
mod mock;

pub use binder::{BindReport, Binder};
pub use config::{BindConfig, ConfigFile, ConfigProvider};
pub use error::{BindError, LoaderError, Result};
pub use lifecycle::{LifecycleController, LifecycleSignal, LifecycleState, TeardownTrigger};
pub use platform::{DylibLoader, NativeLoader, RawSymbol};
pub use registry::{LibraryHandle, LibraryInfo, LibraryRegistry};
pub use signature::{NativeFnPtr, NativeSignature, NativeType, ValueType};
pub use slot::{NativeFn, Slot};
pub use source::{BindingModule, BindingType, CandidateSource, FieldBinding, StaticSource};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{BindConfig, ConfigFile, ConfigProvider};
    pub use crate::error::{BindError, Result};
    pub use crate::lifecycle::{LifecycleController, LifecycleSignal, LifecycleState, TeardownTrigger};
    pub use crate::signature::{NativeSignature, ValueType};
    pub use crate::slot::{NativeFn, Slot};
    pub use crate::source::{BindingModule, BindingType, CandidateSource, FieldBinding, StaticSource};
}
