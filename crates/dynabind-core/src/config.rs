//! Configuration loading.
//!
//! The binding engine needs two lists from its host: directories to search
//! for libraries and module-name prefixes selecting which binding modules
//! are scanned. They live in the `[native]` table of a TOML file:
//!
//! ```toml
//! [native]
//! root = "."
//! search_paths = ["plugins", "lib"]
//! module_prefixes = ["game."]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BindError, Result};

/// Environment variable names.
pub mod env_vars {
    /// Path of the configuration file, overriding the default location.
    pub const CONFIG_PATH: &str = "DYNABIND_CONFIG";
}

/// Default values.
pub mod defaults {
    /// Configuration file looked up in the working directory.
    pub const CONFIG_FILE: &str = "dynabind.toml";
    /// Log filter used when `RUST_LOG` is not set.
    pub const LOG_FILTER: &str = "dynabind=info";
}

/// Search paths and module filters for a binding pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Application root that relative search paths are joined onto.
    pub root: PathBuf,
    /// Directories consulted in order; first match wins.
    pub search_paths: Vec<PathBuf>,
    /// Module-name prefixes; empty selects every module.
    #[serde(default)]
    pub module_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    native: Option<NativeSection>,
}

#[derive(Debug, Deserialize)]
struct NativeSection {
    root: Option<PathBuf>,
    #[serde(default)]
    search_paths: Vec<PathBuf>,
    #[serde(default)]
    module_prefixes: Vec<String>,
}

impl BindConfig {
    pub fn new(root: impl Into<PathBuf>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            search_paths,
            module_prefixes: Vec::new(),
        }
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.module_prefixes = prefixes;
        self
    }

    /// Parse a TOML document. A missing `root` defaults to `base_dir`.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let document: ConfigDocument =
            toml::from_str(content).map_err(|e| BindError::InvalidConfiguration(e.to_string()))?;

        let native = document
            .native
            .ok_or_else(|| BindError::ConfigurationMissing("no [native] table".to_string()))?;

        let root = match native.root {
            Some(root) => base_dir.join(root),
            None => base_dir.to_path_buf(),
        };

        let config = Self {
            root,
            search_paths: native.search_paths,
            module_prefixes: native.module_prefixes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. A file that does not exist is `ConfigurationMissing`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                BindError::ConfigurationMissing(format!("{} does not exist", path.display()))
            }
            _ => BindError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e)),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_toml_str(&content, base_dir)?;
        tracing::info!(category = "config", path = %path.display(), search_paths = config.search_paths.len(), "Loaded native binding config");
        Ok(config)
    }

    /// Load from `DYNABIND_CONFIG`, falling back to `dynabind.toml` in the
    /// working directory.
    pub fn discover() -> Result<Self> {
        let path = std::env::var_os(env_vars::CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_FILE));
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_paths.is_empty() {
            return Err(BindError::InvalidConfiguration(
                "search_paths must list at least one directory".to_string(),
            ));
        }
        Ok(())
    }

    /// Search paths joined onto the root, in configured order.
    pub fn resolved_search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|p| self.root.join(p)).collect()
    }
}

/// Anything that can produce a [`BindConfig`] at startup.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<BindConfig>;
}

impl ConfigProvider for BindConfig {
    fn load(&self) -> Result<BindConfig> {
        self.validate()?;
        Ok(self.clone())
    }
}

impl ConfigProvider for Option<BindConfig> {
    fn load(&self) -> Result<BindConfig> {
        match self {
            Some(config) => ConfigProvider::load(config),
            None => Err(BindError::ConfigurationMissing(
                "no native binding configuration provided".to_string(),
            )),
        }
    }
}

/// Configuration read from a TOML file on each load.
#[derive(Debug, Clone)]
pub struct ConfigFile(pub PathBuf);

impl ConfigProvider for ConfigFile {
    fn load(&self) -> Result<BindConfig> {
        BindConfig::load(&self.0)
    }
}
