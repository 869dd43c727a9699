use super::*;
use crate::error::{PatchError, RegistrationError};
use crate::fields;
use crate::prop::MAX_ARRAY_LEN;

#[test]
fn test_reserved_names() {
    for name in ["entity", "owner", "dirty", "previous", "__x"] {
        let result = Schema::builder("Thing").scalar(name, ScalarKind::U8).build();
        assert!(
            matches!(
                &result,
                Err(RegistrationError::ReservedName { owner, field })
                    if owner == "Thing" && field == name
            ),
            "{name} should be rejected"
        );
    }

    assert!(Schema::builder("Thing").scalar("entity_count", ScalarKind::U8).build().is_ok());
}

#[test]
fn test_reserved_names_in_nested_objects() {
    let result = Schema::builder("Inner").scalar("__hidden", ScalarKind::Bool).build();
    assert!(matches!(result, Err(RegistrationError::ReservedName { .. })));
}

#[test]
fn test_duplicate_field() {
    let result =
        Schema::builder("Thing").scalar("a", ScalarKind::U8).scalar("a", ScalarKind::I8).build();
    assert!(matches!(result, Err(RegistrationError::DuplicateField { field, .. }) if field == "a"));
}

#[test]
fn test_invalid_defaults() {
    let result = Schema::builder("Thing")
        .field_with_default("a", Kind::Scalar(ScalarKind::U8), 300)
        .build();
    assert!(matches!(
        result,
        Err(RegistrationError::InvalidDefault {
            source: PatchError::OutOfRange { value: 300, kind: "u8" },
            ..
        })
    ));

    let result = Schema::builder("Thing")
        .field_with_default("a", Kind::array(Kind::Scalar(ScalarKind::Str)), "x")
        .build();
    assert!(matches!(
        result,
        Err(RegistrationError::InvalidDefault { source: PatchError::Mismatch { .. }, .. })
    ));
}

#[test]
fn test_defaults() {
    let point = Schema::builder("Point")
        .scalar("x", ScalarKind::F32)
        .field_with_default("y", Kind::Scalar(ScalarKind::F32), 1)
        .build()
        .expect("valid schema");
    let schema = Schema::builder("Thing")
        .scalar("flag", ScalarKind::Bool)
        .field_with_default("speed", Kind::Scalar(ScalarKind::F64), 2)
        .field_with_default("pos", Kind::object(point), fields! { "x" => 3.0 })
        .field("list", Kind::array(Kind::Scalar(ScalarKind::U16)))
        .build()
        .expect("valid schema");

    assert_eq!(
        schema.defaults(),
        fields! {
            "flag" => false,
            "speed" => 2.0,
            "pos" => fields! { "x" => 3.0, "y" => 1.0 },
            "list" => Value::Array(Vec::new()),
        }
    );
}

#[test]
fn test_check_sparse_indices() {
    use crate::value::Sparse;

    let kind = Kind::array(Kind::Scalar(ScalarKind::U8));
    let sparse = |set: &[u32], deleted: &[u32]| {
        Value::Sparse(Sparse {
            set:     set.iter().map(|&index| (index, Value::Int(1))).collect(),
            deleted: deleted.to_vec(),
        })
    };

    assert!(kind.check(&sparse(&[0, MAX_ARRAY_LEN - 1], &[3])).is_ok());
    assert!(matches!(
        kind.check(&sparse(&[MAX_ARRAY_LEN], &[])),
        Err(PatchError::IndexTooLarge(index)) if index == u64::from(MAX_ARRAY_LEN)
    ));
    assert!(matches!(
        kind.check(&sparse(&[], &[u32::MAX])),
        Err(PatchError::IndexTooLarge(index)) if index == u64::from(u32::MAX)
    ));
}

#[test]
fn test_bit_positions() {
    let bits = usize::BITS as usize;
    assert_eq!(BitPos::of(0), BitPos { word: 0, mask: 1 });
    assert_eq!(BitPos::of(3), BitPos { word: 0, mask: 8 });
    assert_eq!(BitPos::of(bits + 2), BitPos { word: 1, mask: 4 });

    let mut builder = Schema::builder("Wide");
    for index in 0..bits + 1 {
        builder = builder.scalar(format!("f{index}"), ScalarKind::Bool);
    }
    let schema = builder.build().expect("valid schema");
    let last = schema.field_at(bits).expect("field exists");
    assert_eq!(last.bit(), BitPos { word: 1, mask: 1 });
}

#[test]
fn test_scalar_widths() {
    let widths: Vec<_> = [
        ScalarKind::Bool,
        ScalarKind::U8,
        ScalarKind::I8,
        ScalarKind::U16,
        ScalarKind::I16,
        ScalarKind::U32,
        ScalarKind::I32,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::Str,
    ]
    .into_iter()
    .map(ScalarKind::width)
    .collect();
    assert_eq!(
        widths,
        [Some(1), Some(1), Some(1), Some(2), Some(2), Some(4), Some(4), Some(4), Some(8), None]
    );
}

#[test]
fn test_little_endian_roundtrip() {
    let mut bytes = [0u8; 4];
    ScalarKind::I32.write_le(&Value::Int(-2), &mut bytes);
    assert_eq!(bytes, [0xfe, 0xff, 0xff, 0xff]);
    assert_eq!(ScalarKind::I32.read_le(&bytes), Value::Int(-2));

    let mut bytes = [0u8; 2];
    ScalarKind::U16.write_le(&Value::Int(0x1234), &mut bytes);
    assert_eq!(bytes, [0x34, 0x12]);
}
