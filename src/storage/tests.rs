use std::sync::Arc;

use super::{Pool, Storage};
use crate::comp::schema::{Kind, ScalarKind, Schema};
use crate::entity::EntityId;
use crate::prop::{Invalidate, Key};
use crate::value::Value;
use crate::{fields, test_util};

macro_rules! test_storage {
    (@ $make:expr => $($tests:ident)*) => {
        $(
            #[test]
            fn $tests() {
                crate::test_util::init();
                crate::storage::tests::$tests($make);
            }
        )*
    };
    ($make:expr) => {
        crate::storage::tests::test_storage! { @ $make =>
            test_create_defaults
            test_create_is_idempotent
            test_destroy_recycles
            test_write_notifies_hook
            test_mark_clean
            test_owners_are_sorted
        }
    };
}

pub(crate) use test_storage;

pub(super) fn schema() -> Arc<Schema> {
    let schema = Schema::builder("Unit")
        .field_with_default("hp", Kind::Scalar(ScalarKind::U8), 100)
        .scalar("x", ScalarKind::F32)
        .scalar("name", ScalarKind::Str)
        .field_with_default("alive", Kind::Scalar(ScalarKind::Bool), true)
        .field("tags", Kind::map(Kind::Scalar(ScalarKind::I16)))
        .build()
        .expect("valid schema");
    Arc::new(schema)
}

fn id(id: u32) -> EntityId { EntityId::new(id).expect("nonzero") }

#[derive(Default)]
struct Counter(usize);

impl Invalidate for Counter {
    fn invalidate(&mut self, _: Key<'_>) { self.0 += 1; }
}

pub(super) fn test_create_defaults<S: Storage>(make: impl Fn(Arc<Schema>) -> S) {
    let mut storage = make(schema());
    storage.create(id(1));

    let record = storage.read(id(1)).expect("record was created");
    assert_eq!(record.value(), storage.schema().defaults());
    assert_eq!(record.diff(), None);
    assert!(storage.read(id(2)).is_none());
}

pub(super) fn test_create_is_idempotent<S: Storage>(make: impl Fn(Arc<Schema>) -> S) {
    let mut storage = make(schema());
    let handle = storage.create(id(1));
    assert_eq!(storage.create(id(1)), handle);
    assert_eq!(storage.handle(id(1)), Some(handle));
    assert_eq!(storage.len(), 1);
}

pub(super) fn test_destroy_recycles<S: Storage>(make: impl Fn(Arc<Schema>) -> S) {
    let mut storage = make(schema());
    for i in 1..=3 {
        storage.create(id(i));
    }
    let handle = storage.handle(id(2)).expect("record exists");

    {
        let mut record = storage.write(id(2)).expect("record exists").with_hook(());
        record.set("hp", 7).expect("valid");
        record.set("name", "two").expect("valid");
        record.map("tags").and_then(|mut tags| tags.insert("a", 1)).expect("valid");
    }

    assert!(storage.destroy(id(2)));
    assert!(!storage.destroy(id(2)));
    assert_eq!(storage.handle(id(2)), None);
    assert_eq!(storage.len(), 2);

    assert_eq!(storage.create(id(4)), handle);
    let record = storage.read(id(4)).expect("record was created");
    assert_eq!(record.value(), storage.schema().defaults());
    assert_eq!(record.diff(), None);
    assert_eq!(record.previous("hp"), None);
}

pub(super) fn test_write_notifies_hook<S: Storage>(make: impl Fn(Arc<Schema>) -> S) {
    let mut storage = make(schema());
    storage.create(id(1));

    let mut counter = Counter::default();
    {
        let mut record = storage.write(id(1)).expect("record exists").with_hook(&mut counter);
        assert_eq!(record.set("hp", 100), Ok(false));
        assert_eq!(record.set("hp", 50), Ok(true));
        assert_eq!(record.set("x", 1.25), Ok(true));
        assert_eq!(record.set("alive", true), Ok(false));
    }
    assert_eq!(counter.0, 2);

    let record = storage.read(id(1)).expect("record exists");
    assert_eq!(record.get("hp"), Some(Value::Int(50)));
    assert_eq!(record.get("x"), Some(Value::Float(1.25)));
    assert_eq!(record.previous("hp"), Some(&Value::Int(100)));
    assert_eq!(record.diff(), Some(fields! { "hp" => 50, "x" => 1.25 }));
}

pub(super) fn test_mark_clean<S: Storage>(make: impl Fn(Arc<Schema>) -> S) {
    let mut storage = make(schema());
    storage.create(id(1));
    storage.create(id(2));

    storage.write(id(1)).expect("record exists").with_hook(()).set("hp", 1).expect("valid");
    storage.write(id(2)).expect("record exists").mark_dirty();
    assert!(storage.read(id(1)).and_then(|record| record.diff()).is_some());
    assert_eq!(
        storage.read(id(2)).and_then(|record| record.diff()),
        Some(storage.schema().defaults())
    );

    storage.mark_clean();
    assert_eq!(storage.read(id(1)).and_then(|record| record.diff()), None);
    assert_eq!(storage.read(id(2)).and_then(|record| record.diff()), None);
}

pub(super) fn test_owners_are_sorted<S: Storage>(make: impl Fn(Arc<Schema>) -> S) {
    let mut storage = make(schema());
    for i in [5, 2, 9, 1] {
        storage.create(id(i));
    }
    storage.destroy(id(9));

    let owners: Vec<_> = storage.owners().map(EntityId::get).collect();
    assert_eq!(owners, [1, 2, 5]);
}

#[test]
fn test_pool_layout() {
    test_util::init();

    let pool = Pool::new(schema(), 4);
    let layout = pool.layout();
    assert_eq!(layout.width(), 6);
    assert_eq!(layout.offset(0), Some(0));
    assert_eq!(layout.offset(1), Some(1));
    assert_eq!(layout.offset(2), None);
    assert_eq!(layout.offset(3), Some(5));
    assert_eq!(layout.offset(4), None);
    assert_eq!(layout.defaults(), [100, 0, 0, 0, 0, 1]);
}

#[test]
fn test_pool_rows_are_little_endian() {
    test_util::init();

    let mut pool = Pool::new(schema(), 4);
    pool.create(id(1));
    pool.create(id(2));
    pool.write(id(2)).expect("record exists").with_hook(()).set("x", 1.5).expect("valid");

    assert_eq!(pool.locate(1), (0, 6));
    let chunk = &pool.chunks()[0];
    assert_eq!(chunk[6..12], [100, 0x00, 0x00, 0xc0, 0x3f, 1]);
    assert_eq!(chunk[0..6], [100, 0, 0, 0, 0, 1]);
}

#[test]
fn test_pool_reads_foreign_writes() {
    test_util::init();

    let mut pool = Pool::new(schema(), 4);
    pool.create(id(1));
    let (chunk, offset) = pool.locate(pool.handle(id(1)).expect("record exists"));
    pool.chunk_mut(chunk).expect("chunk exists")[offset] = 42;

    let record = pool.read(id(1)).expect("record exists");
    assert_eq!(record.get("hp"), Some(Value::Int(42)));
}

#[test]
fn test_pool_grows_by_chunks() {
    test_util::init();

    let mut pool = Pool::new(schema(), 2);
    assert_eq!(pool.generation(), 0);

    pool.create(id(1));
    assert_eq!(pool.generation(), 1);
    pool.create(id(2));
    assert_eq!(pool.generation(), 1);
    pool.create(id(3));
    assert_eq!(pool.generation(), 2);
    assert_eq!(pool.chunks().len(), 2);
    assert_eq!(pool.locate(2), (1, 0));

    // freed rows are reused before growing
    pool.destroy(id(1));
    pool.create(id(4));
    assert_eq!(pool.generation(), 2);
    assert_eq!(pool.handle(id(4)), Some(0));
    assert!(pool.chunks().iter().all(|chunk| chunk.len() == 12));
}
