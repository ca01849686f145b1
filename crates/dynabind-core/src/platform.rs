//! Platform loader abstraction.
//!
//! The registry never talks to the dynamic linker directly. It goes through
//! [`NativeLoader`], which production code satisfies with [`DylibLoader`]
//! (backed by `libloading`) and tests satisfy with counting fakes.

use std::ffi::c_void;
use std::path::Path;

use libloading::Library;

use crate::error::LoaderError;

/// Address of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSymbol(*const c_void);

// Symbol addresses are plain code addresses inside a loaded image; the
// registry only hands them out while the owning library is open.
unsafe impl Send for RawSymbol {}
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    pub fn from_ptr(ptr: *const c_void) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

/// Primitives provided by the platform's dynamic loader.
pub trait NativeLoader: Send + Sync {
    /// An open native library. Dropping it must not be relied on to close it;
    /// the registry always calls [`NativeLoader::close`].
    type Library: Send + Sync;

    /// Open the library at `path`.
    fn open(&self, path: &Path) -> Result<Self::Library, LoaderError>;

    /// Look up an exported symbol.
    fn find_symbol(&self, library: &Self::Library, name: &str) -> Result<RawSymbol, LoaderError>;

    /// Close a library previously returned by [`NativeLoader::open`].
    fn close(&self, library: Self::Library) -> Result<(), LoaderError>;
}

/// Loader backed by the system dynamic linker via `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl DylibLoader {
    pub fn new() -> Self {
        Self
    }
}

impl NativeLoader for DylibLoader {
    type Library = Library;

    fn open(&self, path: &Path) -> Result<Library, LoaderError> {
        // Loading runs the library's initialisers; callers opt into that by
        // listing the directory in their search paths.
        unsafe { Library::new(path) }.map_err(loader_error)
    }

    fn find_symbol(&self, library: &Library, name: &str) -> Result<RawSymbol, LoaderError> {
        let symbol = unsafe { library.get::<*const c_void>(name.as_bytes()) }.map_err(loader_error)?;
        Ok(RawSymbol::from_ptr(*symbol))
    }

    fn close(&self, library: Library) -> Result<(), LoaderError> {
        library.close().map_err(loader_error)
    }
}

// Only the Windows variants carry an `io::Error` source; `dlerror` text has no code.
fn loader_error(err: libloading::Error) -> LoaderError {
    let code = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .and_then(|io| io.raw_os_error());

    let mut error = LoaderError::new(err.to_string());
    if let Some(code) = code {
        error = error.with_code(code);
    }
    error
}

/// File extension used for shared libraries on this platform.
pub fn library_extension() -> &'static str {
    std::env::consts::DLL_EXTENSION
}

/// File-name prefix used for shared libraries on this platform.
pub fn library_prefix() -> &'static str {
    std::env::consts::DLL_PREFIX
}
