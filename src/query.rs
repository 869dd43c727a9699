//! Incrementally maintained filtered views over entities.
//!
//! A [`Query`] holds the live entities that have every component in `with`
//! and no component in `without`.
//! The world calls [`reindex`](Query::reindex) after every structural change of an entity
//! and [`deindex`](Query::deindex) when it is destroyed,
//! so membership is always up to date at system boundaries.
//!
//! Each member occupies a slot.
//! Row `slot` of the [`LinearBuffer`] holds the entity slot
//! followed by the storage handle of each `with` component,
//! so foreign code can walk the members without calling back.
//! Freed rows are overwritten with [`SENTINEL`] and their slots are reused in LIFO order.

use std::collections::BTreeMap;
use std::fmt;

use xias::Xias;

use crate::comp::ComponentId;
use crate::entity::{Entity, EntityId};
use crate::storage::Storage;

mod buffer;
pub use buffer::{LinearBuffer, SENTINEL};


/// Rows added per query buffer growth unless configured otherwise.
pub const DEFAULT_GROW_ROWS: usize = 64;

/// Identifies a query registered in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub(crate) usize);

/// The membership condition of a query, by component name.
///
/// Names are kept sorted and deduplicated,
/// so criteria listing the same names in another order are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Criteria {
    with:    Vec<String>,
    without: Vec<String>,
}

impl Criteria {
    /// Criteria matching every entity.
    pub fn new() -> Self { Self::default() }

    /// Requires the component `name`.
    pub fn with(mut self, name: impl Into<String>) -> Self {
        insert_sorted(&mut self.with, name.into());
        self
    }

    /// Excludes entities with the component `name`.
    pub fn without(mut self, name: impl Into<String>) -> Self {
        insert_sorted(&mut self.without, name.into());
        self
    }

    /// Parses a list of names where a leading `!` marks an excluded component.
    ///
    /// ```
    /// use diffec::query::Criteria;
    ///
    /// let criteria = Criteria::parse(["A", "!B"]);
    /// assert_eq!(criteria, Criteria::new().with("A").without("B"));
    /// ```
    pub fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names.into_iter().fold(Self::new(), |criteria, name| match name.strip_prefix('!') {
            Some(name) => criteria.without(name),
            None => criteria.with(name),
        })
    }

    /// The required components, sorted by name.
    ///
    /// This is also the order of the handle columns in the query buffer.
    pub fn required(&self) -> &[String] { &self.with }

    /// The excluded components, sorted by name.
    pub fn excluded(&self) -> &[String] { &self.without }

    /// Whether the criteria match every entity.
    pub fn is_unfiltered(&self) -> bool { self.with.is_empty() && self.without.is_empty() }
}

fn insert_sorted(names: &mut Vec<String>, name: String) {
    if let Err(index) = names.binary_search(&name) {
        names.insert(index, name);
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let names = self
            .with
            .iter()
            .map(|name| (name, ""))
            .chain(self.without.iter().map(|name| (name, "!")));
        for (i, (name, prefix)) in names.enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{prefix}{name}")?;
        }
        write!(f, "]")
    }
}

/// The raw view of a query handed to foreign code.
#[derive(Debug, Clone, Copy)]
pub struct ForeignMemory<'a> {
    /// The number of live members.
    pub count:  u32,
    /// `width` words per slot; free slots hold [`SENTINEL`].
    pub memory: &'a [u32],
    /// The number of words per row.
    pub width:  usize,
}

/// A filtered, incrementally maintained set of entities.
#[derive(Debug)]
pub struct Query {
    criteria: Criteria,
    with:     Vec<ComponentId>,
    without:  Vec<ComponentId>,
    /// The slot of each member.
    map:      BTreeMap<EntityId, u32>,
    /// The member occupying each slot.
    proxies:  Vec<Option<EntityId>>,
    free:     Vec<u32>,
    buffer:   LinearBuffer,
    count:    u32,
}

impl Query {
    /// Constructs an empty query.
    ///
    /// `with` and `without` are the resolved ids of the criteria names, in the same order.
    pub(crate) fn new(
        criteria: Criteria,
        with: Vec<ComponentId>,
        without: Vec<ComponentId>,
        grow_rows: usize,
    ) -> Self {
        let buffer = LinearBuffer::new(1 + with.len(), grow_rows);
        Self {
            criteria,
            with,
            without,
            map: BTreeMap::new(),
            proxies: Vec::new(),
            free: Vec::new(),
            buffer,
            count: 0,
        }
    }

    /// The criteria of this query.
    pub fn criteria(&self) -> &Criteria { &self.criteria }

    /// The number of live members.
    pub fn len(&self) -> u32 { self.count }

    /// Whether the query has no members.
    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Whether `id` is a member.
    pub fn contains(&self, id: EntityId) -> bool { self.map.contains_key(&id) }

    /// The slot occupied by `id`.
    pub fn slot_of(&self, id: EntityId) -> Option<u32> { self.map.get(&id).copied() }

    /// The row buffer.
    pub fn buffer(&self) -> &LinearBuffer { &self.buffer }

    /// The number of times the row buffer has grown.
    pub fn generation(&self) -> u64 { self.buffer.generation() }

    /// Iterates over the members in slot order.
    ///
    /// The iterator borrows the query, so membership cannot change while it is alive.
    /// Calling this again starts a new iteration.
    pub fn select(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.proxies.iter().flatten().copied()
    }

    /// The raw view for foreign code.
    pub fn foreign(&self) -> ForeignMemory<'_> {
        ForeignMemory {
            count:  self.count,
            memory: self.buffer.memory(),
            width:  self.buffer.width(),
        }
    }

    /// Whether `entity` satisfies the criteria.
    pub(crate) fn matches(&self, entity: &Entity) -> bool {
        self.with.iter().all(|&comp| entity.has(comp))
            && !self.without.iter().any(|&comp| entity.has(comp))
    }

    /// Adds, refreshes or removes `entity` according to its current components.
    pub(crate) fn reindex(&mut self, entity: &Entity, storages: &[Box<dyn Storage>]) {
        if !self.matches(entity) {
            self.deindex(entity.id);
            return;
        }

        let slot = match self.map.get(&entity.id) {
            Some(&slot) => slot,
            None => self.insert(entity.id),
        };

        let handles = self.with.iter().map(|comp| {
            storages[comp.index()].handle(entity.id).expect("attached components have a record")
        });
        self.buffer.write(slot, std::iter::once(entity.slot).chain(handles));
    }

    fn insert(&mut self, id: EntityId) -> u32 {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.proxies[slot.small_int::<usize>()] = Some(id);
                slot
            }
            None => {
                let slot = self.proxies.len().small_int();
                self.buffer.reserve(slot);
                self.proxies.push(Some(id));
                slot
            }
        };

        log::trace!("Entity {} joined query {} at slot {}", id, self.criteria, slot);
        self.map.insert(id, slot);
        self.count += 1;
        slot
    }

    /// Removes `id` if it is a member.
    pub(crate) fn deindex(&mut self, id: EntityId) {
        let slot = match self.map.remove(&id) {
            Some(slot) => slot,
            None => return,
        };

        log::trace!("Entity {} left query {} at slot {}", id, self.criteria, slot);
        self.buffer.clear(slot);
        self.proxies[slot.small_int::<usize>()] = None;
        self.free.push(slot);
        self.count -= 1;
    }
}
