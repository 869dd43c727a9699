//! Systems are actions performed every tick to manipulate entities and components.
//!
//! A system is registered through a [`Descriptor`],
//! which names it, places it in a [`Phase`],
//! orders it relative to other systems of the same phase
//! and declares the queries it iterates over.
//! Systems run one at a time with exclusive access to the world.

use crate::entity::EntityId;
use crate::error::BoxError;
use crate::query::{Criteria, ForeignMemory, QueryId};
use crate::world::World;

/// A system stores some states of its own and is run with the world every tick.
pub trait System: Send {
    /// Runs the system.
    fn tick(&mut self, ctx: &mut Context<'_>);

    /// Binds a foreign compiled module to this system.
    ///
    /// Systems that do not call foreign code reject every module.
    fn bind(&mut self, module: &[u8]) -> Result<(), BoxError> {
        let _ = module;
        Err("system does not accept foreign modules".into())
    }
}

impl<F: FnMut(&mut Context<'_>) + Send> System for F {
    fn tick(&mut self, ctx: &mut Context<'_>) { self(ctx) }
}

/// The scheduling bucket of a system.
///
/// All `Pre` systems run before all `Normal` systems,
/// which run before all `Post` systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
    /// Runs first.
    Pre,
    /// The default phase.
    #[default]
    Normal,
    /// Runs last.
    Post,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::Pre, Phase::Normal, Phase::Post];
}

/// Describes a system to be scheduled.
pub struct Descriptor {
    pub(crate) name:     String,
    pub(crate) phase:    Phase,
    pub(crate) before:   Vec<String>,
    pub(crate) after:    Vec<String>,
    pub(crate) interval: Option<f64>,
    pub(crate) queries:  Vec<Criteria>,
    pub(crate) system:   Box<dyn System>,
}

impl Descriptor {
    /// Describes a system in the normal phase that runs every tick.
    pub fn new(name: impl Into<String>, system: impl System + 'static) -> Self {
        Self {
            name:     name.into(),
            phase:    Phase::Normal,
            before:   Vec::new(),
            after:    Vec::new(),
            interval: None,
            queries:  Vec::new(),
            system:   Box::new(system),
        }
    }

    /// Places the system in `phase`.
    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Runs the system before the system `name` if both are in the same phase.
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    /// Runs the system after the system `name` if both are in the same phase.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    /// Runs the system once every `seconds` of accumulated tick time.
    pub fn interval(mut self, seconds: f64) -> Self {
        self.interval = Some(seconds);
        self
    }

    /// Declares a query, accessible from [`Context`] by declaration index.
    pub fn query(mut self, criteria: Criteria) -> Self {
        self.queries.push(criteria);
        self
    }

    /// The name of the system.
    pub fn name(&self) -> &str { &self.name }
}

/// The view of the world passed to a running system.
pub struct Context<'a> {
    pub(crate) world:   &'a mut World,
    pub(crate) delta:   f64,
    pub(crate) queries: &'a [QueryId],
}

impl<'a> Context<'a> {
    /// The seconds elapsed since the last run of this system.
    pub fn delta(&self) -> f64 { self.delta }

    /// Shared access to the world.
    pub fn world(&self) -> &World { self.world }

    /// Exclusive access to the world.
    pub fn world_mut(&mut self) -> &mut World { self.world }

    /// The id of the `index`-th query declared by the system.
    ///
    /// # Panics
    /// Panics if the system declared fewer queries.
    pub fn query(&self, index: usize) -> QueryId {
        *self.queries.get(index).expect("query index is out of the declared range")
    }

    /// The live members of the `index`-th query, as of now.
    ///
    /// The returned list does not follow later changes to the world,
    /// so entities can be created and destroyed while walking it.
    pub fn entities(&self, index: usize) -> Vec<EntityId> {
        self.world.select(self.query(index)).collect()
    }

    /// The raw view of the `index`-th query for foreign code.
    pub fn foreign(&self, index: usize) -> ForeignMemory<'_> {
        self.world.query_ref(self.query(index)).foreign()
    }
}
