//! The world owns every entity, component storage, query and system.
//!
//! Structural changes (creating entities, attaching and detaching components)
//! take effect immediately and are followed by reindexing every query.
//! Destruction is deferred to the end of [`tick`](World::tick),
//! see [`World::destroy`].
//!
//! Every effective write marks its entity dirty.
//! [`World::diff`] reads the accumulated changes
//! and [`World::mark_clean`] is the only operation that forgets them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::mem;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::comp::{ComponentId, Schema};
use crate::entity::{Ealloc, Entity, EntityId};
use crate::error::Error;
use crate::prop::{Invalidate, Key, ObjectMut, ObjectRef};
use crate::query::{Criteria, Query, QueryId};
use crate::scheduler::Scheduler;
use crate::storage::Storage;
use crate::value::Fields;

mod builder;
pub use builder::Builder;

mod destroy;
use destroy::DestroyDescriptor;
pub use destroy::DestroyDependency;

mod diff;
pub use diff::{ComponentDiff, EntityDiff, WorldDiff};

mod foreign;


static_assertions::assert_impl_all!(World: Send);

/// The hook attached to component writes, marking the owning entity dirty.
pub struct Touch<'a> {
    dirty: &'a mut BTreeSet<EntityId>,
    id:    EntityId,
}

impl Invalidate for Touch<'_> {
    fn invalidate(&mut self, _: Key<'_>) { self.dirty.insert(self.id); }
}

/// Read access to a component of an entity.
pub type CompRef<'a> = ObjectRef<'a>;

/// Write access to a component of an entity.
pub type CompMut<'a> = ObjectMut<'a, Touch<'a>>;

/// The data structure that stores all states of the runtime.
pub struct World {
    /// Component names in registration order, indexed by [`ComponentId`].
    names:           IndexSet<String>,
    storages:        Vec<Box<dyn Storage>>,
    ealloc:          Ealloc,
    entities:        BTreeMap<EntityId, Entity>,
    /// Bookkeeping of destroyed entities, reused by later entities.
    recycled:        Vec<Entity>,
    queries:         Vec<Query>,
    query_index:     HashMap<Criteria, QueryId>,
    query_grow_rows: usize,
    scheduler:       Scheduler,
    destroy:         BTreeMap<EntityId, DestroyDescriptor>,
    next_token:      u64,
    /// Entities written since the last clean.
    dirty:           BTreeSet<EntityId>,
    /// Entities destroyed since the last clean.
    destroyed:       BTreeSet<EntityId>,
    elapsed:         f64,
}

impl World {
    /// Starts configuring a world.
    pub fn builder() -> Builder { Builder::default() }

    fn new(
        names: IndexSet<String>,
        storages: Vec<Box<dyn Storage>>,
        query_grow_rows: usize,
    ) -> Self {
        Self {
            names,
            storages,
            ealloc: Ealloc::default(),
            entities: BTreeMap::new(),
            recycled: Vec::new(),
            queries: Vec::new(),
            query_index: HashMap::new(),
            query_grow_rows,
            scheduler: Scheduler::default(),
            destroy: BTreeMap::new(),
            next_token: 0,
            dirty: BTreeSet::new(),
            destroyed: BTreeSet::new(),
            elapsed: 0.,
        }
    }

    /// The id of the component type `name`.
    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.names.get_index_of(name).map(ComponentId)
    }

    fn resolve(&self, name: &str) -> Result<ComponentId, Error> {
        self.component_id(name).ok_or_else(|| Error::UnknownComponent(name.to_string()))
    }

    /// The component type names in registration order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// The schemas of the component types in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> + '_ {
        self.storages.iter().map(|storage| storage.schema())
    }

    /// The system names in run order.
    pub fn system_order(&self) -> impl Iterator<Item = &str> + '_ { self.scheduler.order() }

    /// The total seconds passed to [`tick`](Self::tick).
    pub fn elapsed(&self) -> f64 { self.elapsed }

    /// The number of live entities.
    pub fn len(&self) -> usize { self.entities.len() }

    /// Whether there are no live entities.
    pub fn is_empty(&self) -> bool { self.entities.is_empty() }

    /// Whether `id` is live.
    ///
    /// Entities pending destruction are still live.
    pub fn contains(&self, id: EntityId) -> bool { self.entities.contains_key(&id) }

    /// The live entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ { self.entities.keys().copied() }

    /// Whether `id` was created since the last [`mark_clean`](Self::mark_clean).
    pub fn is_fresh(&self, id: EntityId) -> bool {
        self.entities.get(&id).map_or(false, |entity| entity.fresh)
    }

    fn entity(&self, id: EntityId) -> Result<&Entity, Error> {
        self.entities.get(&id).ok_or(Error::NoSuchEntity(id.get()))
    }

    /// Whether the component `name` is attached to `id`.
    pub fn has(&self, id: EntityId, name: &str) -> bool {
        match (self.entities.get(&id), self.component_id(name)) {
            (Some(entity), Some(comp)) => entity.has(comp),
            _ => false,
        }
    }

    /// Creates an entity with the next automatic id.
    ///
    /// The listed components are attached in registration order with the given field values;
    /// unlisted fields keep their defaults.
    /// The id is consumed even if the fields are rejected.
    pub fn create(&mut self, init: &[(&str, Fields)]) -> Result<EntityId, Error> {
        let id = self.ealloc.allocate()?;
        let comps = self.validate(id, init.iter().map(|(name, fields)| (*name, fields)))?;
        self.spawn(id, comps)?;
        Ok(id)
    }

    /// Creates an entity with an explicit id.
    ///
    /// Later automatic ids are allocated above `id`.
    pub fn create_specific(
        &mut self,
        id: u32,
        init: &[(&str, Fields)],
    ) -> Result<EntityId, Error> {
        let id = EntityId::new(id).ok_or(Error::ReservedId)?;
        if self.contains(id) {
            return Err(Error::EntityExists(id.get()));
        }

        let comps = self.validate(id, init.iter().map(|(name, fields)| (*name, fields)))?;
        self.ealloc.reserve(id);
        self.spawn(id, comps)?;
        Ok(id)
    }

    /// Resolves and checks initial components, sorting them in registration order.
    fn validate<'f>(
        &self,
        id: EntityId,
        init: impl IntoIterator<Item = (&'f str, &'f Fields)>,
    ) -> Result<Vec<(ComponentId, &'f Fields)>, Error> {
        let mut comps = init
            .into_iter()
            .map(|(name, fields)| {
                let comp = self.resolve(name)?;
                self.storages[comp.index()].schema().check(fields).map_err(|source| {
                    Error::Patch { entity: id.get(), component: name.to_string(), source }
                })?;
                Ok((comp, fields))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        comps.sort_by_key(|&(comp, _)| comp);
        Ok(comps)
    }

    fn spawn(&mut self, id: EntityId, comps: Vec<(ComponentId, &Fields)>) -> Result<(), Error> {
        let slot = self.ealloc.take_slot(id);
        let entity = match self.recycled.pop() {
            Some(mut entity) => {
                entity.reuse(id, slot);
                entity
            }
            None => Entity::new(id, slot, self.storages.len()),
        };
        self.entities.insert(id, entity);
        self.dirty.insert(id);
        log::debug!("Created entity {} at slot {}", id, slot);

        let result =
            comps.into_iter().try_for_each(|(comp, fields)| self.insert(id, comp, fields));
        self.reindex(id);
        result
    }

    /// Attaches a component that is not attached yet.
    fn insert(&mut self, id: EntityId, comp: ComponentId, fields: &Fields) -> Result<(), Error> {
        let entity = self.entities.get_mut(&id).expect("entity is live");
        entity.components.set(comp.index(), true);
        entity.removed.set(comp.index(), false);
        entity.added.set(comp.index(), true);
        self.dirty.insert(id);

        let storage = &mut self.storages[comp.index()];
        storage.create(id);
        let mut record = storage.write(id).expect("record was just created");
        record.mark_dirty();
        record.with_hook(()).patch(fields).map_err(|source| Error::Patch {
            entity: id.get(),
            component: self.names[comp.index()].clone(),
            source,
        })?;
        Ok(())
    }

    fn reindex(&mut self, id: EntityId) {
        let entity = self.entities.get(&id).expect("entity is live");
        for query in &mut self.queries {
            query.reindex(entity, &self.storages);
        }
    }

    /// Attaches a component, or patches it if it is already attached.
    pub fn attach(&mut self, id: EntityId, name: &str, fields: &Fields) -> Result<(), Error> {
        let comp = self.resolve(name)?;
        if self.entity(id)?.has(comp) {
            let mut record = self.write(id, name)?;
            record.patch(fields).map_err(|source| Error::Patch {
                entity: id.get(),
                component: name.to_string(),
                source,
            })?;
            return Ok(());
        }

        self.storages[comp.index()].schema().check(fields).map_err(|source| Error::Patch {
            entity: id.get(),
            component: name.to_string(),
            source,
        })?;
        let result = self.insert(id, comp, fields);
        self.reindex(id);
        result
    }

    /// Detaches a component, returning whether it was attached.
    ///
    /// The next diff reports the component as removed.
    pub fn detach(&mut self, id: EntityId, name: &str) -> Result<bool, Error> {
        let comp = self.resolve(name)?;
        let entity = self.entities.get_mut(&id).ok_or(Error::NoSuchEntity(id.get()))?;
        if !entity.has(comp) {
            return Ok(false);
        }

        entity.components.set(comp.index(), false);
        entity.removed.set(comp.index(), true);
        entity.added.set(comp.index(), false);
        self.storages[comp.index()].destroy(id);
        self.dirty.insert(id);
        self.reindex(id);
        Ok(true)
    }

    fn attached(&self, id: EntityId, name: &str) -> Result<ComponentId, Error> {
        let comp = self.resolve(name)?;
        if self.entity(id)?.has(comp) {
            Ok(comp)
        } else {
            Err(Error::NotAttached { entity: id.get(), component: name.to_string() })
        }
    }

    /// Read access to a component.
    pub fn read(&self, id: EntityId, name: &str) -> Result<CompRef<'_>, Error> {
        let comp = self.attached(id, name)?;
        Ok(self.storages[comp.index()].read(id).expect("attached components have a record"))
    }

    /// Write access to a component.
    ///
    /// Every effective write through the accessor marks the entity dirty.
    pub fn write(&mut self, id: EntityId, name: &str) -> Result<CompMut<'_>, Error> {
        let comp = self.attached(id, name)?;
        let record =
            self.storages[comp.index()].write(id).expect("attached components have a record");
        Ok(record.with_hook(Touch { dirty: &mut self.dirty, id }))
    }

    /// Registers a query, or returns the existing query with the same criteria.
    ///
    /// A new query indexes every live entity immediately.
    pub fn query(&mut self, criteria: Criteria) -> Result<QueryId, Error> {
        self.register_query(criteria).map_err(Error::UnknownComponent)
    }

    /// Registers a query, returning the first unknown component name on failure.
    fn register_query(&mut self, criteria: Criteria) -> Result<QueryId, String> {
        if let Some(&id) = self.query_index.get(&criteria) {
            return Ok(id);
        }

        let resolve = |names: &[String]| -> Result<Vec<ComponentId>, String> {
            names.iter().map(|name| self.component_id(name).ok_or_else(|| name.clone())).collect()
        };
        let with = resolve(criteria.required())?;
        let without = resolve(criteria.excluded())?;

        let mut query = Query::new(criteria.clone(), with, without, self.query_grow_rows);
        for entity in self.entities.values() {
            query.reindex(entity, &self.storages);
        }
        log::debug!("Registered query {} with {} members", criteria, query.len());

        let id = QueryId(self.queries.len());
        self.queries.push(query);
        self.query_index.insert(criteria, id);
        Ok(id)
    }

    /// Accesses a registered query.
    ///
    /// # Panics
    /// Panics if `id` was not returned by this world.
    pub fn query_ref(&self, id: QueryId) -> &Query { &self.queries[id.0] }

    /// Iterates over the members of a query in slot order.
    pub fn select(&self, id: QueryId) -> impl Iterator<Item = EntityId> + '_ {
        self.query_ref(id).select()
    }

    /// Runs every due system, then destroys the entities
    /// marked for destruction without pending dependencies.
    pub fn tick(&mut self, delta: f64) {
        self.elapsed += delta;

        let mut scheduler = mem::take(&mut self.scheduler);
        scheduler.run(self, delta);
        self.scheduler = scheduler;

        self.sweep();
    }
}
