use std::collections::HashMap;

use indexmap::IndexSet;

use super::World;
use crate::comp::ComponentType;
use crate::digraph::Digraph;
use crate::error::{Error, RegistrationError};
use crate::query::DEFAULT_GROW_ROWS;
use crate::scheduler::Scheduler;
use crate::storage::{self, DEFAULT_CHUNK_LEN};
use crate::system;

/// This type is used to build a world.
///
/// Component types and systems cannot be added after the world is built.
pub struct Builder {
    components:      Vec<ComponentType>,
    systems:         Vec<system::Descriptor>,
    chunk_len:       usize,
    query_grow_rows: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            components:      Vec::new(),
            systems:         Vec::new(),
            chunk_len:       DEFAULT_CHUNK_LEN,
            query_grow_rows: DEFAULT_GROW_ROWS,
        }
    }
}

impl Builder {
    /// Registers a component type.
    pub fn component(mut self, ty: ComponentType) -> Self {
        self.components.push(ty);
        self
    }

    /// Schedules a system.
    pub fn system(mut self, descriptor: system::Descriptor) -> Self {
        self.systems.push(descriptor);
        self
    }

    /// Sets the number of rows per chunk of packed storages.
    pub fn chunk_len(mut self, rows: usize) -> Self {
        self.chunk_len = rows;
        self
    }

    /// Sets the number of rows added whenever a query buffer is full.
    pub fn query_grow_rows(mut self, rows: usize) -> Self {
        self.query_grow_rows = rows;
        self
    }

    /// Constructs the world.
    ///
    /// Component types are registered after their dependencies,
    /// and systems are ordered by phase and ordering hints.
    /// Every query declared by a system is registered here.
    pub fn build(self) -> Result<World, Error> {
        let mut graph = Digraph::new();
        let mut types: HashMap<String, ComponentType> = HashMap::new();
        for ty in self.components {
            graph.add_vertex(ty.name().to_string());
            if let Some(ty) = types.insert(ty.name().to_string(), ty) {
                return Err(RegistrationError::Duplicate(ty.name().to_string()).into());
            }
        }

        for ty in types.values() {
            for dep in ty.dependencies() {
                if !types.contains_key(dep) {
                    return Err(RegistrationError::UnknownReference {
                        owner:  ty.name().to_string(),
                        target: dep.clone(),
                    }
                    .into());
                }
                graph.add_dependency(ty.name().to_string(), dep.clone());
            }
        }

        let order = graph.sort().map_err(RegistrationError::from)?;
        log::debug!("Component order: {:?}", order);

        let mut names = IndexSet::new();
        let mut storages = Vec::with_capacity(order.len());
        for name in order {
            let ty = types.remove(&name).expect("every vertex is a registered type");
            log::debug!("Registering component `{}` with {:?} storage", name, ty.storage_kind());
            storages.push(storage::build(ty.schema().clone(), ty.storage_kind(), self.chunk_len));
            names.insert(name);
        }

        let mut world = World::new(names, storages, self.query_grow_rows);
        let scheduler = Scheduler::new(self.systems, |system, criteria| {
            world.register_query(criteria.clone()).map_err(|target| {
                RegistrationError::UnknownReference { owner: system.to_string(), target }
            })
        })?;
        world.scheduler = scheduler;
        Ok(world)
    }
}
