//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use dynabind_core::platform::library_extension;
use dynabind_core::{LoaderError, NativeLoader, RawSymbol};
use parking_lot::Mutex;

/// Loader that serves in-process functions as if they were library exports.
#[derive(Default)]
pub struct InProcessLoader {
    exports: HashMap<String, HashMap<String, RawSymbol>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    lookups: Mutex<Vec<String>>,
}

#[derive(Clone)]
pub struct InProcessLibrary {
    name: String,
    path: PathBuf,
}

impl InProcessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(mut self, library: &str, symbol: &str, address: *const std::ffi::c_void) -> Self {
        self.exports
            .entry(library.to_string())
            .or_default()
            .insert(symbol.to_string(), RawSymbol::from_ptr(address));
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn lookups_of(&self, symbol: &str) -> usize {
        self.lookups.lock().iter().filter(|s| s.as_str() == symbol).count()
    }
}

impl NativeLoader for InProcessLoader {
    type Library = InProcessLibrary;

    fn open(&self, path: &Path) -> Result<InProcessLibrary, LoaderError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
        if self.exports.contains_key(&name) {
            Ok(InProcessLibrary {
                name,
                path: path.to_path_buf(),
            })
        } else {
            Err(LoaderError::new(format!("{}: not a loadable image", path.display())))
        }
    }

    fn find_symbol(&self, library: &InProcessLibrary, name: &str) -> Result<RawSymbol, LoaderError> {
        self.lookups.lock().push(name.to_string());
        self.exports
            .get(&library.name)
            .and_then(|symbols| symbols.get(name))
            .copied()
            .ok_or_else(|| LoaderError::new(format!("{}: undefined symbol: {}", library.path.display(), name)))
    }

    fn close(&self, _library: InProcessLibrary) -> Result<(), LoaderError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Create an empty file named like library `id` in `dir`.
pub fn place_library(dir: &Path, id: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{}.{}", id, library_extension()));
    std::fs::write(&path, b"").unwrap();
    path
}
