//! Library registry.
//!
//! Maps a library identifier to exactly one open native handle and caches
//! every symbol resolved from it. The map, the handle lifecycle and the
//! platform `open` call all sit behind one lock, so two threads asking for
//! the same library cannot both open it.
//!
//! Slots attached to a library's symbols are recorded with that library and
//! detached before it is closed, so no slot outlives the image it points into.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{BindError, Result};
use crate::platform::{DylibLoader, NativeLoader, RawSymbol};
use crate::resolver;
use crate::slot::Slot;

/// Opaque token for an open library.
///
/// Tokens are never reused, so a token kept past [`LibraryRegistry::release_all`]
/// is rejected instead of aliasing a newer library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LibraryHandle(u64);

impl LibraryHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LibraryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of one open library, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryInfo {
    pub id: String,
    pub handle: LibraryHandle,
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub cached_symbols: usize,
    pub bound_slots: usize,
}

struct LoadedLibrary<T> {
    handle: LibraryHandle,
    library: T,
    path: PathBuf,
    loaded_at: DateTime<Utc>,
    symbols: HashMap<String, RawSymbol>,
    slots: Vec<Arc<dyn Slot>>,
}

/// A resolved address waiting to be stored into a slot.
pub(crate) struct SlotAttachment {
    pub handle: LibraryHandle,
    pub slot: Arc<dyn Slot>,
    pub address: RawSymbol,
}

struct RegistryState<T> {
    libraries: HashMap<String, LoadedLibrary<T>>,
    owners: HashMap<LibraryHandle, String>,
}

impl<T> Default for RegistryState<T> {
    fn default() -> Self {
        Self {
            libraries: HashMap::new(),
            owners: HashMap::new(),
        }
    }
}

/// Registry of open native libraries.
pub struct LibraryRegistry<L: NativeLoader = DylibLoader> {
    loader: L,
    search_paths: RwLock<Vec<PathBuf>>,
    state: Mutex<RegistryState<L::Library>>,
    next_handle: AtomicU64,
}

impl LibraryRegistry<DylibLoader> {
    /// Registry backed by the system dynamic linker.
    pub fn system() -> Self {
        Self::new(DylibLoader::new())
    }
}

impl<L: NativeLoader> LibraryRegistry<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            search_paths: RwLock::new(Vec::new()),
            state: Mutex::new(RegistryState::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn with_search_paths(self, paths: Vec<PathBuf>) -> Self {
        *self.search_paths.write() = paths;
        self
    }

    /// Replace the search paths used for libraries not yet loaded.
    pub fn set_search_paths(&self, paths: Vec<PathBuf>) {
        *self.search_paths.write() = paths;
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.read().clone()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Return the handle for `library`, opening it on first use.
    pub fn get_or_load(&self, library: &str) -> Result<LibraryHandle> {
        let mut state = self.state.lock();

        if let Some(loaded) = state.libraries.get(library) {
            tracing::trace!(category = "native", library, handle = %loaded.handle, "Library cache hit");
            return Ok(loaded.handle);
        }

        let search_paths = self.search_paths.read().clone();
        let path = resolver::resolve(library, &search_paths)?;

        let native = self
            .loader
            .open(&path)
            .map_err(|source| BindError::LibraryLoadError {
                library: library.to_string(),
                path: path.clone(),
                source,
            })?;

        let handle = LibraryHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        tracing::info!(category = "native", library, handle = %handle, path = %path.display(), "Opened native library");

        state.owners.insert(handle, library.to_string());
        state.libraries.insert(
            library.to_string(),
            LoadedLibrary {
                handle,
                library: native,
                path,
                loaded_at: Utc::now(),
                symbols: HashMap::new(),
                slots: Vec::new(),
            },
        );

        Ok(handle)
    }

    /// Return the address of `symbol` inside the library behind `handle`.
    pub fn get_or_resolve_symbol(&self, handle: LibraryHandle, symbol: &str) -> Result<RawSymbol> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let owner = state
            .owners
            .get(&handle)
            .ok_or(BindError::UnknownHandle(handle.0))?;
        let loaded = state
            .libraries
            .get_mut(owner)
            .ok_or(BindError::UnknownHandle(handle.0))?;

        if let Some(address) = loaded.symbols.get(symbol) {
            tracing::trace!(category = "native", library = %owner, symbol, "Symbol cache hit");
            return Ok(*address);
        }

        let address = self
            .loader
            .find_symbol(&loaded.library, symbol)
            .map_err(|e| BindError::SymbolNotFound {
                symbol: symbol.to_string(),
                library: owner.clone(),
                reason: e.to_string(),
            })?;

        if address.is_null() {
            return Err(BindError::SymbolNotFound {
                symbol: symbol.to_string(),
                library: owner.clone(),
                reason: "symbol resolved to a null address".to_string(),
            });
        }

        tracing::debug!(category = "native", library = %owner, symbol, "Resolved symbol");
        loaded.symbols.insert(symbol.to_string(), address);
        Ok(address)
    }

    /// Store every address into its slot and record the slot with its library.
    ///
    /// All handles are checked before any slot is written, under the same
    /// lock `release_all` takes, so either every slot is attached to an open
    /// library or none is.
    ///
    /// # Safety
    /// Each address must match the ABI of its slot's signature.
    pub(crate) unsafe fn attach_slots(&self, attachments: &[SlotAttachment]) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(stale) = attachments.iter().find(|a| !state.owners.contains_key(&a.handle)) {
            return Err(BindError::UnknownHandle(stale.handle.0));
        }

        for attachment in attachments {
            let Some(loaded) = state
                .owners
                .get(&attachment.handle)
                .and_then(|owner| state.libraries.get_mut(owner))
            else {
                continue;
            };
            unsafe { attachment.slot.attach(attachment.address) };
            loaded.slots.push(attachment.slot.clone());
        }
        Ok(())
    }

    /// Identifier that owns `handle`, if the handle is still open.
    pub fn library_id(&self, handle: LibraryHandle) -> Option<String> {
        self.state.lock().owners.get(&handle).cloned()
    }

    pub fn is_loaded(&self, library: &str) -> bool {
        self.state.lock().libraries.contains_key(library)
    }

    pub fn len(&self) -> usize {
        self.state.lock().libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open libraries ordered by identifier.
    pub fn loaded_libraries(&self) -> Vec<LibraryInfo> {
        let state = self.state.lock();
        let mut infos: Vec<LibraryInfo> = state
            .libraries
            .iter()
            .map(|(id, loaded)| LibraryInfo {
                id: id.clone(),
                handle: loaded.handle,
                path: loaded.path.clone(),
                loaded_at: loaded.loaded_at,
                cached_symbols: loaded.symbols.len(),
                bound_slots: loaded.slots.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Close every open library and empty the registry.
    ///
    /// Every slot attached to a library is detached before any library is
    /// closed. A close failure is logged and skipped so the remaining handles are
    /// still released. Returns the number of libraries removed.
    pub fn release_all(&self) -> usize {
        let mut state = self.state.lock();

        if state.libraries.is_empty() {
            tracing::trace!(category = "native", "Registry already empty");
            return 0;
        }

        let mut libraries: Vec<(String, LoadedLibrary<L::Library>)> = state.libraries.drain().collect();
        state.owners.clear();

        // Newest first, the reverse of the order they were opened.
        libraries.sort_by(|a, b| b.1.handle.cmp(&a.1.handle));

        let mut detached = 0;
        for (_, loaded) in &libraries {
            for slot in &loaded.slots {
                if slot.is_bound() {
                    slot.detach();
                    detached += 1;
                }
            }
        }
        if detached > 0 {
            tracing::debug!(category = "native", detached, "Detached slots before closing libraries");
        }

        let released = libraries.len();
        for (id, loaded) in libraries {
            match self.loader.close(loaded.library) {
                Ok(()) => {
                    tracing::info!(category = "native", library = %id, handle = %loaded.handle, "Closed native library");
                }
                Err(e) => {
                    tracing::warn!(category = "native", library = %id, handle = %loaded.handle, error = %e, "Failed to close native library");
                }
            }
        }

        released
    }
}
