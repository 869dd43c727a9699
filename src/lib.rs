//! A dirty-tracking entity-component runtime with binary state diffs.
//!
//! # Entities and components
//! Entities are identified by a nonzero `u32` [`EntityId`].
//! Components are records of named fields declared by a [`Schema`](comp::Schema)
//! and registered as a [`ComponentType`](comp::ComponentType) when the [`World`] is built.
//! An entity has at most one instance of each component type.
//!
//! Field kinds are fixed-width scalars, strings, nested objects, arrays and maps.
//! Fixed-width scalars of [packed](comp::StorageKind::Packed) component types
//! live in chunked little-endian rows that foreign code can read and write directly,
//! see [`storage::Pool`].
//!
//! # Dirty tracking
//! Every field has a dirty bit.
//! A write that does not change the value is ignored;
//! any other write sets the bit of the field,
//! and a write inside a nested object, array or map also sets the bit of the enclosing field.
//! The entity is then marked dirty in the world.
//!
//! [`World::diff`] collects the dirty fields, removed components and destroyed entities
//! without changing anything,
//! and [`World::mark_clean`] forgets them.
//! Diffs have a compact binary form (see [`codec`])
//! and can be applied to another world with [`World::set`],
//! so that a replica follows the source world one diff at a time.
//!
//! # Queries
//! A [`Query`](query::Query) is the set of entities that have some components
//! and lack some others.
//! Queries are updated incrementally on every structural change.
//! Each member occupies a row of a linear `u32` buffer
//! holding its slot and the handles of its required components,
//! which foreign code can walk without calling back into the world.
//!
//! # Systems
//! Systems are run by [`World::tick`] in three [phases](system::Phase),
//! ordered by `before`/`after` hints within each phase.
//! A system may run at a fixed interval instead of every tick.
//!
//! # Destruction
//! [`World::destroy`] only marks an entity.
//! The entity is destroyed at the end of a tick,
//! once every [`DestroyDependency`](world::DestroyDependency) on it has been released.
//! Destroy listeners run just before, while the components are still readable.

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod codec;

pub mod comp;

mod digraph;

pub mod entity;
pub use entity::EntityId;

pub mod error;
pub use error::Error;

pub mod prop;

pub mod query;

mod scheduler;

pub mod storage;
pub use storage::Storage;

pub mod system;

#[cfg(any(test, feature = "internal-bench"))]
pub mod test_util;

pub mod value;
pub use value::{Fields, Value};

pub mod world;
pub use world::World;
