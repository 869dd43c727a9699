#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;
use parking_lot::{Mutex, Once};

use crate::comp::{ComponentType, Kind, ScalarKind, Schema};
use crate::world::Builder;
use crate::World;

/// Records event and ensures that they are in the correct order.
pub struct EventTracer<T: fmt::Debug + Eq + Hash> {
    dependencies: HashMap<T, Vec<T>>,
    seen:         Mutex<IndexSet<T>>,
}

impl<T: fmt::Debug + Eq + Hash + Clone> EventTracer<T> {
    /// Creates a new event tracer that ensures `b` happens after `a` for each `(a, b)` input.
    pub fn new(orders: impl IntoIterator<Item = (T, T)>) -> Self {
        let mut dependencies: HashMap<T, Vec<T>> = HashMap::new();
        for (before, after) in orders {
            dependencies.entry(after).or_default().push(before);
        }
        let seen = Mutex::new(IndexSet::new());

        Self { dependencies, seen }
    }

    /// Records that `event` has happened.
    ///
    /// # Panics
    /// Panics if the same `event` was sent twice or a dependency is not satisfied.
    pub fn trace(&self, event: T) {
        let mut seen = self.seen.lock();

        if let Some(deps) = self.dependencies.get(&event) {
            for dep in deps {
                assert!(seen.contains(dep), "{:?} should happen after {:?}", event, dep);
            }
        }

        let (index, new) = seen.insert_full(event);
        assert!(
            new,
            "{:?} is inserted twice",
            seen.get_index(index).expect("insert_full should return valid index")
        );
    }

    /// Returns the events observed so far, in order.
    pub fn get_events(&self) -> Vec<T> { self.seen.lock().iter().cloned().collect() }
}

pub(crate) fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(env_logger::init);
}

/// `A { value: i32, speed: f32 = 1.0 }`, packed.
pub fn comp_a() -> ComponentType {
    let schema = Schema::builder("A")
        .scalar("value", ScalarKind::I32)
        .field_with_default("speed", Kind::Scalar(ScalarKind::F32), 1.0)
        .build()
        .expect("valid schema");
    ComponentType::new(schema).packed()
}

/// `B { name: str, tags: map<i32> }`, depends on `A`.
pub fn comp_b() -> ComponentType {
    let schema = Schema::builder("B")
        .scalar("name", ScalarKind::Str)
        .field("tags", Kind::map(Kind::Scalar(ScalarKind::I32)))
        .build()
        .expect("valid schema");
    ComponentType::new(schema).depends_on("A")
}

/// `C { items: [i32], body: { hp: u8 = 10, label: str } }`, depends on `B`.
pub fn comp_c() -> ComponentType {
    let body = Schema::builder("Body")
        .field_with_default("hp", Kind::Scalar(ScalarKind::U8), 10)
        .scalar("label", ScalarKind::Str)
        .build()
        .expect("valid schema");
    let schema = Schema::builder("C")
        .field("items", Kind::array(Kind::Scalar(ScalarKind::I32)))
        .field("body", Kind::object(body))
        .build()
        .expect("valid schema");
    ComponentType::new(schema).depends_on("B")
}

/// A builder with `C`, `B` and `A` registered in reverse dependency order.
pub fn abc_builder() -> Builder {
    World::builder().component(comp_c()).component(comp_b()).component(comp_a())
}

/// `Comp{n} { value: i32 }`, packed.
pub fn comp_n(n: usize) -> ComponentType {
    let schema = Schema::builder(format!("Comp{n}"))
        .scalar("value", ScalarKind::I32)
        .build()
        .expect("valid schema");
    ComponentType::new(schema).packed()
}

/// A world with the component types `Comp1` to `Comp{count}`.
pub fn comp_n_world(count: usize) -> World {
    (1..=count)
        .fold(World::builder(), |builder, n| builder.component(comp_n(n)))
        .build()
        .expect("component types are valid")
}
