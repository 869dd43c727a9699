//! Component types.
//!
//! A component type is a named [`Schema`] plus registration metadata.
//! Instances are stored per type in a [`Storage`](crate::storage::Storage),
//! selected by [`StorageKind`].
//!
//! # Dependencies
//! A component type may name other component types as dependencies.
//! Dependencies are registered before their dependents,
//! and when an entity is created with several components,
//! the components are attached in registration order.
//! Dependencies never attach anything automatically.

use std::sync::Arc;

pub mod schema;
pub use schema::{Field, Kind, ScalarKind, Schema};

/// Selects the storage backend of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Fixed-width scalar fields live in chunked little-endian rows
    /// that can be handed to foreign code.
    Packed,
    /// Every field lives in the record.
    #[default]
    Simple,
}

/// Identifies a registered component type.
///
/// Ids are assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// The registration index of the component type.
    pub fn index(self) -> usize { self.0 }
}

/// Describes a component type to be registered in a world.
#[derive(Debug, Clone)]
pub struct ComponentType {
    schema:       Arc<Schema>,
    dependencies: Vec<String>,
    storage:      StorageKind,
}

impl ComponentType {
    /// A component type named after its schema, stored in a simple storage.
    pub fn new(schema: Schema) -> Self {
        Self { schema: Arc::new(schema), dependencies: Vec::new(), storage: StorageKind::Simple }
    }

    /// Declares that `name` must be registered before this type.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Selects the storage backend.
    pub fn storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Shorthand for `storage(StorageKind::Packed)`.
    pub fn packed(self) -> Self { self.storage(StorageKind::Packed) }

    /// The name of the component type.
    pub fn name(&self) -> &str { self.schema.name() }

    /// The field table.
    pub fn schema(&self) -> &Arc<Schema> { &self.schema }

    /// The names of the component types registered before this one.
    pub fn dependencies(&self) -> &[String] { &self.dependencies }

    /// The selected storage backend.
    pub fn storage_kind(&self) -> StorageKind { self.storage }
}
