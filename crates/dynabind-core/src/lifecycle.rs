//! Lifecycle controller.
//!
//! Owns the registry and binder for one host. `initialize` loads the
//! configuration, selects binding types and runs the binding pass once;
//! teardown detaches every slot and then closes every library, so no slot
//! can point into an unloaded image.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::binder::{BindReport, Binder};
use crate::config::{BindConfig, ConfigProvider};
use crate::error::{BindError, Result};
use crate::platform::{DylibLoader, NativeLoader};
use crate::registry::LibraryRegistry;
use crate::source::{CandidateSource, candidate_types};

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initialized,
    TornDown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::TornDown => write!(f, "TornDown"),
        }
    }
}

/// Host events the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// The host process is shutting down.
    Shutdown,
    /// An interactive host left its running mode (e.g. an editor stopped play).
    EnteredEditMode,
    /// Release everything and bind again with the last configuration.
    ReloadRequested,
}

/// Hook a host can hold to release native state without knowing the
/// controller's concrete type.
pub trait TeardownTrigger: Send + Sync {
    fn teardown(&self);
}

/// Drives initialization and teardown of native bindings.
pub struct LifecycleController<S: CandidateSource, L: NativeLoader = DylibLoader> {
    registry: Arc<LibraryRegistry<L>>,
    binder: Binder<L>,
    source: S,
    state: Mutex<LifecycleState>,
    config: Mutex<Option<BindConfig>>,
}

impl<S: CandidateSource> LifecycleController<S, DylibLoader> {
    /// Controller using the system dynamic linker.
    pub fn new(source: S) -> Self {
        Self::with_registry(Arc::new(LibraryRegistry::system()), source)
    }
}

impl<S: CandidateSource, L: NativeLoader> LifecycleController<S, L> {
    pub fn with_registry(registry: Arc<LibraryRegistry<L>>, source: S) -> Self {
        Self {
            binder: Binder::new(registry.clone()),
            registry,
            source,
            state: Mutex::new(LifecycleState::Uninitialized),
            config: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn registry(&self) -> &Arc<LibraryRegistry<L>> {
        &self.registry
    }

    /// Configuration used by the last successful load.
    pub fn config(&self) -> Option<BindConfig> {
        self.config.lock().clone()
    }

    /// Load configuration and bind every selected type.
    ///
    /// Returns `None` when already initialized. On failure every library
    /// opened during the attempt is released and the state is unchanged.
    pub fn initialize(&self, provider: &dyn ConfigProvider) -> Result<Option<BindReport>> {
        let mut state = self.state.lock();

        if *state == LifecycleState::Initialized {
            tracing::info!(category = "native", "Native bindings already initialized");
            return Ok(None);
        }

        let config = provider.load().map_err(|e| {
            tracing::error!(category = "native", error = %e, "Cannot load native binding configuration");
            e
        })?;

        self.registry.set_search_paths(config.resolved_search_paths());
        let types = candidate_types(&self.source, &config.module_prefixes);
        tracing::debug!(category = "native", types = types.len(), "Selected binding types");

        *self.config.lock() = Some(config);

        match self.binder.bind_all(&types) {
            Ok(report) => {
                *state = LifecycleState::Initialized;
                tracing::info!(category = "native", slots = report.slots, libraries = report.libraries.len(), "Native bindings initialized");
                Ok(Some(report))
            }
            Err(e) => {
                self.binder.unbind_all();
                self.registry.release_all();
                Err(e)
            }
        }
    }

    /// Detach every bound slot and close every library.
    ///
    /// Safe in any state; from `Uninitialized` it only clears whatever a
    /// caller loaded through the registry directly.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let detached = self.binder.unbind_all();
        let released = self.registry.release_all();

        if *state == LifecycleState::Initialized {
            *state = LifecycleState::TornDown;
        }
        tracing::info!(category = "native", detached, released, state = %*state, "Native bindings torn down");
    }

    /// React to a host lifecycle event.
    pub fn handle_signal(&self, signal: LifecycleSignal) -> Result<LifecycleState> {
        tracing::debug!(category = "native", signal = ?signal, "Lifecycle signal received");
        match signal {
            LifecycleSignal::Shutdown | LifecycleSignal::EnteredEditMode => {
                self.shutdown();
            }
            LifecycleSignal::ReloadRequested => {
                let config = self.config().ok_or_else(|| {
                    BindError::ConfigurationMissing("reload requested before any configuration was loaded".to_string())
                })?;
                self.shutdown();
                self.initialize(&config)?;
            }
        }
        Ok(self.state())
    }
}

impl<S: CandidateSource, L: NativeLoader> TeardownTrigger for LifecycleController<S, L> {
    fn teardown(&self) {
        self.shutdown();
    }
}
