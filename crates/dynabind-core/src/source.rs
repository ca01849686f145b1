//! Binding descriptors and the sources that supply them.
//!
//! Hosts describe their native bindings with an explicit table: each
//! [`BindingType`] may name a library, and each [`FieldBinding`] names the
//! symbol, an optional library override, the expected signature and the
//! slot to fill. A [`CandidateSource`] groups those tables into named
//! modules so configuration can select which modules are scanned.

use std::sync::Arc;

use crate::signature::NativeSignature;
use crate::slot::Slot;

/// One slot to bind.
#[derive(Clone)]
pub struct FieldBinding {
    pub field: String,
    pub symbol: String,
    pub library: Option<String>,
    pub signature: NativeSignature,
    pub slot: Arc<dyn Slot>,
}

impl FieldBinding {
    pub fn new(
        field: impl Into<String>,
        symbol: impl Into<String>,
        signature: NativeSignature,
        slot: impl Slot + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            symbol: symbol.into(),
            library: None,
            signature,
            slot: Arc::new(slot),
        }
    }

    /// Bind this field from `library` instead of the owning type's library.
    pub fn library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }
}

impl std::fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field", &self.field)
            .field("symbol", &self.symbol)
            .field("library", &self.library)
            .field("signature", &self.signature)
            .field("bound", &self.slot.is_bound())
            .finish()
    }
}

/// A type whose fields are bound to native functions.
#[derive(Debug, Clone)]
pub struct BindingType {
    pub name: String,
    pub library: Option<String>,
    pub fields: Vec<FieldBinding>,
}

impl BindingType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library: None,
            fields: Vec::new(),
        }
    }

    /// Default library for every field on this type.
    pub fn library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn field(mut self, field: FieldBinding) -> Self {
        self.fields.push(field);
        self
    }
}

/// Named group of binding types, selected by prefix filters.
#[derive(Debug, Clone)]
pub struct BindingModule {
    pub name: String,
    pub types: Vec<BindingType>,
}

impl BindingModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, ty: BindingType) -> Self {
        self.types.push(ty);
        self
    }
}

/// Host-side supplier of binding modules.
pub trait CandidateSource: Send + Sync {
    fn modules(&self) -> Vec<BindingModule>;
}

/// In-memory list of modules.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    modules: Vec<BindingModule>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: BindingModule) -> Self {
        self.modules.push(module);
        self
    }
}

impl CandidateSource for StaticSource {
    fn modules(&self) -> Vec<BindingModule> {
        self.modules.clone()
    }
}

impl<S: CandidateSource + ?Sized> CandidateSource for Arc<S> {
    fn modules(&self) -> Vec<BindingModule> {
        (**self).modules()
    }
}

/// Types from modules whose name starts with one of `prefixes`, in
/// enumeration order. An empty prefix list selects every module.
pub fn candidate_types(source: &dyn CandidateSource, prefixes: &[String]) -> Vec<BindingType> {
    source
        .modules()
        .into_iter()
        .filter(|module| {
            let selected = prefixes.is_empty() || prefixes.iter().any(|p| module.name.starts_with(p.as_str()));
            if !selected {
                tracing::trace!(category = "native", module = %module.name, "Module skipped by prefix filter");
            }
            selected
        })
        .flat_map(|module| module.types)
        .collect()
}
