//! Error handling for library resolution and binding.
//!
//! Every failure that can abort a binding pass is a variant of [`BindError`].
//! None of them are retried: a missing library or symbol is a build or
//! configuration defect.

use std::path::PathBuf;

use crate::signature::NativeSignature;

/// Failure reported by the platform loader.
///
/// `dlopen`/`dlsym` only report a message, so `code` is populated on
/// Windows (`GetLastError`) and stays `None` on Unix targets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", .code.map(|c| format!(" (code: {})", c)).unwrap_or_default())]
pub struct LoaderError {
    /// OS error code, when the platform exposes one.
    pub code: Option<i32>,
    /// Human-readable platform message.
    pub message: String,
}

impl LoaderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

/// Errors raised while configuring, resolving, loading or binding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    /// No configuration could be found; startup cannot proceed.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Configuration exists but could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Every search directory was tried and none held the library.
    #[error("Library '{library}' not found in search paths {searched:?}")]
    LibraryNotFound {
        library: String,
        searched: Vec<PathBuf>,
    },

    /// The file exists but the platform loader refused it.
    #[error("Failed to load library '{library}' from {}: {source}", .path.display())]
    LibraryLoadError {
        library: String,
        path: PathBuf,
        source: LoaderError,
    },

    /// The library is open but does not export the symbol.
    #[error("Symbol '{symbol}' not found in library '{library}': {reason}")]
    SymbolNotFound {
        symbol: String,
        library: String,
        reason: String,
    },

    /// A bound field has neither a field-level nor a type-level library.
    #[error("No library declared for field '{field}' on type '{owner}'")]
    MissingLibraryDeclaration { owner: String, field: String },

    /// The declared signature disagrees with the slot's function type.
    #[error("Signature mismatch for '{owner}.{field}': declared {declared}, slot expects {actual}")]
    SignatureMismatch {
        owner: String,
        field: String,
        declared: NativeSignature,
        actual: NativeSignature,
    },

    /// A handle was used after the registry released it.
    #[error("Unknown library handle: {0}")]
    UnknownHandle(u64),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, BindError>;
