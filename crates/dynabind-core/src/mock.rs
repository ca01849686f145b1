//! Counting loader used by unit tests.

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::LoaderError;
use crate::platform::{NativeLoader, RawSymbol, library_extension};

extern "C" fn placeholder() {}

/// Create an empty file named like library `id` inside `dir`.
pub fn library_file(dir: &Path, id: &str) -> PathBuf {
    let path = dir.join(format!("{}.{}", id, library_extension()));
    std::fs::write(&path, b"").unwrap();
    path
}

#[derive(Clone)]
pub struct MockLibrary {
    pub name: String,
    symbols: HashMap<String, RawSymbol>,
}

#[derive(Default)]
pub struct MockLoader {
    libraries: HashMap<String, HashMap<String, RawSymbol>>,
    failing_close: HashSet<String>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    lookups: Mutex<HashMap<String, usize>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library whose symbols all point at a no-op function.
    pub fn library(self, name: &str, symbols: &[&str]) -> Self {
        let exports = symbols
            .iter()
            .map(|s| (s.to_string(), RawSymbol::from_ptr(placeholder as *const c_void)))
            .collect();
        self.library_with(name, exports)
    }

    pub fn library_with(mut self, name: &str, exports: HashMap<String, RawSymbol>) -> Self {
        self.libraries.insert(name.to_string(), exports);
        self
    }

    pub fn failing_close(mut self, name: &str) -> Self {
        self.failing_close.insert(name.to_string());
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self, symbol: &str) -> usize {
        self.lookups.lock().get(symbol).copied().unwrap_or(0)
    }
}

impl NativeLoader for MockLoader {
    type Library = MockLibrary;

    fn open(&self, path: &Path) -> Result<MockLibrary, LoaderError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        match self.libraries.get(&name) {
            Some(symbols) => Ok(MockLibrary {
                name,
                symbols: symbols.clone(),
            }),
            None => Err(LoaderError::new(format!("cannot open {}", path.display())).with_code(2)),
        }
    }

    fn find_symbol(&self, library: &MockLibrary, name: &str) -> Result<RawSymbol, LoaderError> {
        *self.lookups.lock().entry(name.to_string()).or_default() += 1;
        library
            .symbols
            .get(name)
            .copied()
            .ok_or_else(|| LoaderError::new(format!("undefined symbol: {}", name)))
    }

    fn close(&self, library: MockLibrary) -> Result<(), LoaderError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.failing_close.contains(&library.name) {
            return Err(LoaderError::new(format!("close failed for {}", library.name)));
        }
        Ok(())
    }
}
