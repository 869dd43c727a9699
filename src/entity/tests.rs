use super::{Ealloc, EntityId};
use crate::error::Error;

fn id(id: u32) -> EntityId { EntityId::new(id).expect("nonzero") }

#[test]
fn test_zero_is_reserved() {
    assert_eq!(EntityId::new(0), None);
    assert_eq!(id(7).get(), 7);
    assert_eq!(id(7).to_string(), "7");
}

#[test]
fn test_allocate_monotonic() {
    let mut ealloc = Ealloc::default();
    assert_eq!(ealloc.allocate().ok(), Some(id(1)));
    assert_eq!(ealloc.allocate().ok(), Some(id(2)));
    assert_eq!(ealloc.allocate().ok(), Some(id(3)));
}

#[test]
fn test_reserve_bumps_gauge() {
    let mut ealloc = Ealloc::default();
    ealloc.reserve(id(10));
    assert_eq!(ealloc.allocate().ok(), Some(id(11)));

    // lower explicit ids never move the gauge back
    ealloc.reserve(id(5));
    assert_eq!(ealloc.allocate().ok(), Some(id(12)));
}

#[test]
fn test_reserve_max_exhausts_gauge() {
    let mut ealloc = Ealloc::default();
    ealloc.reserve(id(u32::MAX - 1));
    assert_eq!(ealloc.allocate().ok(), Some(id(u32::MAX)));
    assert!(matches!(ealloc.allocate(), Err(Error::IdsExhausted)));

    let mut ealloc = Ealloc::default();
    ealloc.reserve(id(u32::MAX));
    assert!(matches!(ealloc.allocate(), Err(Error::IdsExhausted)));
    // the failure is sticky
    assert!(matches!(ealloc.allocate(), Err(Error::IdsExhausted)));
}

#[test]
fn test_slot_recycling() {
    let mut ealloc = Ealloc::default();
    let slots: Vec<u32> = (1..=3).map(|i| ealloc.take_slot(id(i))).collect();
    assert_eq!(slots, [0, 1, 2]);

    ealloc.release_slot(0);
    ealloc.release_slot(2);
    assert_eq!(ealloc.occupant(2), None);
    assert_eq!(ealloc.occupant(1), Some(id(2)));

    assert_eq!(ealloc.take_slot(id(4)), 2);
    assert_eq!(ealloc.take_slot(id(5)), 0);
    assert_eq!(ealloc.take_slot(id(6)), 3);
    assert_eq!(ealloc.occupant(0), Some(id(5)));
}
