//! Binding pass.
//!
//! Binding runs in two phases. The first resolves every field (library
//! declaration, signature, library handle, symbol address) without writing
//! anything. Only when all fields resolved does the second phase store the
//! addresses, so a failing pass leaves every slot as it was. The second phase
//! goes through the registry, which keeps each slot with the library it
//! points into.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BindError, Result};
use crate::platform::{DylibLoader, NativeLoader, RawSymbol};
use crate::registry::{LibraryHandle, LibraryRegistry, SlotAttachment};
use crate::slot::Slot;
use crate::source::{BindingType, FieldBinding};

/// Outcome of a successful binding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub types: usize,
    pub slots: usize,
    pub libraries: Vec<String>,
}

struct BoundSlot {
    owner: String,
    field: String,
    slot: Arc<dyn Slot>,
}

struct ResolvedField<'a> {
    owner: &'a str,
    field: &'a FieldBinding,
    handle: LibraryHandle,
    address: RawSymbol,
}

/// Resolves binding tables against a [`LibraryRegistry`].
pub struct Binder<L: NativeLoader = DylibLoader> {
    registry: Arc<LibraryRegistry<L>>,
    bound: Mutex<Vec<BoundSlot>>,
}

impl<L: NativeLoader> Binder<L> {
    pub fn new(registry: Arc<LibraryRegistry<L>>) -> Self {
        Self {
            registry,
            bound: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<LibraryRegistry<L>> {
        &self.registry
    }

    /// Bind every field of every type, or none of them.
    pub fn bind_all(&self, types: &[BindingType]) -> Result<BindReport> {
        let mut resolved = Vec::new();
        let mut libraries = BTreeSet::new();

        for ty in types {
            for field in &ty.fields {
                let (library, handle, address) = self.resolve_field(ty, field).map_err(|e| {
                    tracing::error!(category = "native", owner = %ty.name, field = %field.field, error = %e, "Binding failed");
                    e
                })?;
                libraries.insert(library.to_string());
                resolved.push(ResolvedField {
                    owner: &ty.name,
                    field,
                    handle,
                    address,
                });
            }
        }

        let attachments: Vec<SlotAttachment> = resolved
            .iter()
            .map(|entry| SlotAttachment {
                handle: entry.handle,
                slot: entry.field.slot.clone(),
                address: entry.address,
            })
            .collect();

        let mut bound = self.bound.lock();
        // Each address came from the registry for a signature we just
        // checked against the slot's type.
        unsafe { self.registry.attach_slots(&attachments) }.map_err(|e| {
            tracing::error!(category = "native", error = %e, "Library released during binding");
            e
        })?;

        for entry in &resolved {
            tracing::debug!(category = "native", owner = entry.owner, field = %entry.field.field, symbol = %entry.field.symbol, "Bound native function");
            bound.push(BoundSlot {
                owner: entry.owner.to_string(),
                field: entry.field.field.clone(),
                slot: entry.field.slot.clone(),
            });
        }

        let report = BindReport {
            types: types.len(),
            slots: resolved.len(),
            libraries: libraries.into_iter().collect(),
        };
        tracing::info!(category = "native", types = report.types, slots = report.slots, libraries = ?report.libraries, "Binding pass complete");
        Ok(report)
    }

    fn resolve_field<'a>(&self, ty: &'a BindingType, field: &'a FieldBinding) -> Result<(&'a str, LibraryHandle, RawSymbol)> {
        let library = field
            .library
            .as_deref()
            .or(ty.library.as_deref())
            .ok_or_else(|| BindError::MissingLibraryDeclaration {
                owner: ty.name.clone(),
                field: field.field.clone(),
            })?;

        let actual = field.slot.signature();
        if actual != field.signature {
            return Err(BindError::SignatureMismatch {
                owner: ty.name.clone(),
                field: field.field.clone(),
                declared: field.signature.clone(),
                actual,
            });
        }

        let handle = self.registry.get_or_load(library)?;
        let address = self.registry.get_or_resolve_symbol(handle, &field.symbol)?;
        Ok((library, handle, address))
    }

    /// Clear every slot this binder attached. Returns how many were cleared.
    pub fn unbind_all(&self) -> usize {
        let mut bound = self.bound.lock();
        for entry in bound.iter() {
            entry.slot.detach();
            tracing::trace!(category = "native", owner = %entry.owner, field = %entry.field, "Detached native function");
        }
        let count = bound.len();
        bound.clear();
        count
    }

    pub fn bound_count(&self) -> usize {
        self.bound.lock().len()
    }
}
