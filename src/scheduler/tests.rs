use super::{Entry, Scheduler};
use crate::error::RegistrationError;
use crate::query::{Criteria, QueryId};
use crate::system::{Context, Descriptor, Phase};
use crate::test_util;

fn noop(name: &str) -> Descriptor { Descriptor::new(name, |_: &mut Context<'_>| {}) }

fn no_queries(name: &str, _: &Criteria) -> Result<QueryId, RegistrationError> {
    panic!("system `{name}` declared no queries")
}

fn order(descriptors: Vec<Descriptor>) -> Vec<String> {
    let scheduler = Scheduler::new(descriptors, no_queries).expect("valid schedule");
    scheduler.order().map(String::from).collect()
}

#[test]
fn test_registration_order_is_kept() {
    test_util::init();
    assert_eq!(order(vec![noop("c"), noop("a"), noop("b")]), ["c", "a", "b"]);
}

#[test]
fn test_phase_major_order() {
    test_util::init();
    let descriptors = vec![
        noop("render").phase(Phase::Post),
        noop("physics"),
        noop("input").phase(Phase::Pre),
        noop("ai").before("physics"),
        noop("network").phase(Phase::Pre).before("input"),
        noop("cleanup").phase(Phase::Post).before("render"),
        noop("animation").after("physics"),
    ];
    assert_eq!(
        order(descriptors),
        ["network", "input", "ai", "physics", "animation", "cleanup", "render"]
    );
}

#[test]
fn test_cross_phase_hints_are_ignored() {
    test_util::init();
    let descriptors = vec![noop("late").phase(Phase::Post).before("early"), noop("early")];
    assert_eq!(order(descriptors), ["early", "late"]);
}

#[test]
fn test_unknown_hint_is_rejected() {
    test_util::init();
    let err = Scheduler::new(vec![noop("a").after("ghost")], no_queries)
        .err()
        .expect("unknown hint is an error");
    match err {
        RegistrationError::UnknownReference { owner, target } => {
            assert_eq!((owner.as_str(), target.as_str()), ("a", "ghost"));
        }
        err => panic!("unexpected error {err}"),
    }
}

#[test]
fn test_duplicate_name_is_rejected() {
    test_util::init();
    let err = Scheduler::new(vec![noop("a"), noop("a").phase(Phase::Post)], no_queries)
        .err()
        .expect("duplicate is an error");
    assert!(matches!(err, RegistrationError::Duplicate(ref name) if name == "a"));
}

#[test]
fn test_cyclic_hints_are_rejected() {
    test_util::init();
    let descriptors = vec![noop("a").before("b"), noop("b").before("a")];
    let err = Scheduler::new(descriptors, no_queries).err().expect("cycle is an error");
    assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
}

#[test]
fn test_queries_are_resolved_per_system() {
    test_util::init();
    let descriptors = vec![
        noop("a").query(Criteria::new().with("X")),
        noop("b").query(Criteria::new()).query(Criteria::new().without("X")),
    ];

    let mut seen = Vec::new();
    let scheduler = Scheduler::new(descriptors, |name, criteria| {
        seen.push(format!("{name}{criteria}"));
        Ok(QueryId(seen.len()))
    })
    .expect("valid schedule");

    assert_eq!(seen, ["a[X]", "b[]", "b[!X]"]);
    let queries: Vec<_> = scheduler.entries.iter().map(|entry| entry.queries.clone()).collect();
    assert_eq!(queries, [vec![QueryId(1)], vec![QueryId(2), QueryId(3)]]);
}

#[test]
fn test_interval_accumulates() {
    let mut entry = Entry {
        name:        "periodic".into(),
        interval:    Some(1.0),
        accumulated: 0.,
        queries:     Vec::new(),
        system:      Box::new(|_: &mut Context<'_>| {}),
    };

    assert_eq!(entry.due(0.25), None);
    assert_eq!(entry.due(0.5), None);
    assert_eq!(entry.due(0.5), Some(1.25));
    assert_eq!(entry.due(0.5), None);
    assert_eq!(entry.due(2.0), Some(2.5));

    entry.interval = None;
    assert_eq!(entry.due(0.125), Some(0.125));
}
