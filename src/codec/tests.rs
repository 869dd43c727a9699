use std::collections::BTreeMap;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    decode, encode, ArrayCodec, Codec, ComponentCodec, MapCodec, ObjectCodec, Reader, ScalarCodec,
    WorldCodec, Writer,
};
use crate::comp::{Kind, ScalarKind, Schema};
use crate::entity::EntityId;
use crate::error::{CodecError, Error};
use crate::test_util::{self, abc_builder};
use crate::value::{Fields, Sparse, Value};
use crate::world::{ComponentDiff, EntityDiff, World, WorldDiff};
use crate::fields;

const I32: Kind = Kind::Scalar(ScalarKind::I32);

fn varint(value: u64) -> Vec<u8> {
    let mut writer = Writer::default();
    writer.varint(value);
    writer.finish()
}

#[test]
fn test_varint_encoding() {
    assert_eq!(varint(0), [0]);
    assert_eq!(varint(127), [0x7f]);
    assert_eq!(varint(300), [0xac, 0x02]);
    assert_eq!(varint(u64::MAX).len(), super::MAX_VARINT_LEN);

    let bytes = varint(u64::MAX);
    assert_eq!(Reader::new(&bytes).varint(), Ok(u64::MAX));
}

#[test]
fn test_varint_overflow() {
    let too_long = [0x80; 11];
    assert_eq!(Reader::new(&too_long).varint(), Err(CodecError::VarintOverflow(0)));

    let mut too_wide = [0xff; 10];
    too_wide[9] = 0x02;
    assert_eq!(Reader::new(&too_wide).varint(), Err(CodecError::VarintOverflow(0)));
}

#[test]
fn test_truncated_input() {
    assert_eq!(Reader::new(&[0x80]).varint(), Err(CodecError::UnexpectedEof(1)));
    assert_eq!(decode(&ScalarCodec(ScalarKind::U32), &[1, 2]), Err(CodecError::UnexpectedEof(2)));
    let truncated = decode(&ScalarCodec(ScalarKind::Str), &[3, b'a']);
    assert_eq!(truncated, Err(CodecError::UnexpectedEof(2)));
}

#[test]
fn test_invalid_bytes() {
    assert_eq!(
        decode(&ScalarCodec(ScalarKind::Bool), &[2]),
        Err(CodecError::InvalidBool { byte: 2, offset: 0 })
    );
    assert_eq!(
        decode(&ScalarCodec(ScalarKind::Str), &[2, 0xff, 0xfe]),
        Err(CodecError::InvalidUtf8(1))
    );
    assert_eq!(decode(&ScalarCodec(ScalarKind::U8), &[1, 2]), Err(CodecError::TrailingBytes(1)));
}

#[test]
fn test_scalar_layout() {
    let bytes = |kind, value: Value| encode(&ScalarCodec(kind), &value).expect("valid value");

    assert_eq!(bytes(ScalarKind::Bool, true.into()), [1]);
    assert_eq!(bytes(ScalarKind::I16, (-2).into()), [0xfe, 0xff]);
    assert_eq!(bytes(ScalarKind::F32, Value::Float(1.5)), [0, 0, 0xc0, 0x3f]);
    assert_eq!(bytes(ScalarKind::Str, "hi".into()), [2, b'h', b'i']);

    let decoded = decode(&ScalarCodec(ScalarKind::I16), &[0xfe, 0xff]).expect("valid bytes");
    assert_eq!(decoded, Value::Int(-2));
}

#[test]
fn test_scalar_rejects_foreign_values() {
    assert_eq!(
        encode(&ScalarCodec(ScalarKind::U8), &Value::Int(300)),
        Err(CodecError::Mismatch { expected: "u8", found: "out-of-range integer" })
    );
    assert_eq!(
        encode(&ScalarCodec(ScalarKind::Str), &Value::Bool(true)),
        Err(CodecError::Mismatch { expected: "string", found: "bool" })
    );
}

#[test]
fn test_object_presence_bitmap() {
    let schema = (0..9)
        .fold(Schema::builder("Wide"), |builder, i| {
            builder.scalar(format!("f{i}"), ScalarKind::U8)
        })
        .build()
        .expect("valid schema");

    let fields = fields! { "f8" => 7, "f0" => 3 };
    let bytes = encode(&ObjectCodec(&schema), &fields).expect("valid fields");
    assert_eq!(bytes, [0b0000_0001, 0b0000_0001, 3, 7]);

    let decoded = decode(&ObjectCodec(&schema), &bytes).expect("valid bytes");
    assert_eq!(decoded.keys().collect::<Vec<_>>(), ["f0", "f8"]);

    assert_eq!(
        encode(&ObjectCodec(&schema), &fields! { "ghost" => 1 }),
        Err(CodecError::UnknownField("ghost".to_string()))
    );
}

#[test]
fn test_dense_array() {
    let dense = Value::Array(vec![Value::Int(1), Value::Int(2)]);
    let bytes = encode(&ArrayCodec(&I32), &dense).expect("valid array");
    assert_eq!(bytes, [0, 2, 1, 0, 0, 0, 2, 0, 0, 0]);
    assert_eq!(decode(&ArrayCodec(&I32), &bytes), Ok(dense));
}

#[test]
fn test_sparse_array_with_deletions() {
    let sparse = Value::Sparse(Sparse {
        set:     [(1, Value::Int(9)), (300, Value::Int(-1))].into_iter().collect(),
        deleted: vec![5, 2],
    });
    let bytes = encode(&ArrayCodec(&I32), &sparse).expect("valid array");
    assert_eq!(
        bytes,
        [
            1, // sparse
            2, 0, 0, 0, // count
            1, 0xac, 0x02, // keys
            9, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, // elements
            2, 5, 2, // deletions, high to low
        ]
    );
    assert_eq!(decode(&ArrayCodec(&I32), &bytes), Ok(sparse));
}

#[test]
fn test_sparse_index_limit() {
    let mut writer = Writer::default();
    writer.bool(true);
    writer.u32(1);
    writer.varint(1 << 24);
    assert_eq!(decode(&ArrayCodec(&I32), writer.as_bytes()), Err(CodecError::OutOfRange(1 << 24)));
}

#[test]
fn test_map_deletions() {
    let mut entries = IndexMap::new();
    entries.insert("a".to_string(), Some(Value::Int(1)));
    entries.insert("b".to_string(), None);
    let map = Value::Map(entries);

    let codec = MapCodec(&Kind::Scalar(ScalarKind::U8));
    let bytes = encode(&codec, &map).expect("valid map");
    assert_eq!(bytes, [2, 1, b'a', 1, 1, 1, b'b', 0]);
    assert_eq!(decode(&codec, &bytes), Ok(map));
}

#[test]
fn test_component_removed_flag() {
    let schema = Schema::builder("Empty").build().expect("empty schema");
    let codec = ComponentCodec(&schema);
    assert_eq!(encode(&codec, &ComponentDiff::Removed), Ok(vec![1]));
    assert_eq!(encode(&codec, &ComponentDiff::Changed(Fields::new())), Ok(vec![0]));
    assert_eq!(decode(&codec, &[1]), Ok(ComponentDiff::Removed));
}

#[test]
fn test_world_entries() {
    test_util::init();
    let world = abc_builder().build().expect("valid world");
    let codec = WorldCodec::new(&world);

    let mut comps = IndexMap::new();
    comps.insert("B".to_string(), ComponentDiff::Removed);
    let mut diff = WorldDiff::new();
    diff.insert(EntityId::new(3).expect("nonzero"), EntityDiff::Destroyed);
    diff.insert(EntityId::new(200).expect("nonzero"), EntityDiff::Live(comps));

    let bytes = encode(&codec, &diff).expect("valid diff");
    assert_eq!(bytes, [2, 3, 0, 0xc8, 0x01, 1, 0b010, 1]);
    assert_eq!(decode(&codec, &bytes), Ok(diff));

    assert_eq!(decode(&codec, &[1, 0, 0]), Err(CodecError::OutOfRange(0)));

    let mut comps = IndexMap::new();
    comps.insert("D".to_string(), ComponentDiff::Removed);
    let mut diff = WorldDiff::new();
    diff.insert(EntityId::new(1).expect("nonzero"), EntityDiff::Live(comps));
    assert_eq!(encode(&codec, &diff), Err(CodecError::UnknownComponent("D".to_string())));
}

#[test]
fn test_undecodable_diff_is_not_applied() {
    test_util::init();
    let mut source = abc_builder().build().expect("valid world");
    source.create(&[("A", fields! { "value" => 1 })]).expect("valid fields");
    let mut bytes = source.encode_diff().expect("valid diff");
    bytes.push(0);

    let mut replica = abc_builder().build().expect("valid world");
    assert!(matches!(replica.set_encoded(&bytes), Err(Error::Codec(CodecError::TrailingBytes(1)))));
    assert!(replica.is_empty());
}

fn snapshot(world: &World) -> BTreeMap<EntityId, Vec<(String, Fields)>> {
    world
        .entities()
        .map(|entity| {
            let comps = world
                .component_names()
                .filter_map(|name| {
                    let comp = world.read(entity, name).ok()?;
                    Some((name.to_string(), comp.value()))
                })
                .collect();
            (entity, comps)
        })
        .collect()
}

fn random_write(world: &mut World, rng: &mut StdRng) {
    let entities: Vec<EntityId> = world.entities().collect();
    let entity = entities[rng.gen_range(0..entities.len())];
    let key = format!("k{}", rng.gen_range(0..4));

    match rng.gen_range(0..7) {
        0 => {
            let mut a = world.write(entity, "A").expect("every entity has A");
            a.set("value", rng.gen_range(-100..100i32)).expect("valid value");
        }
        1 => {
            let mut b = world.write(entity, "B").expect("every entity has B");
            b.map("tags").expect("map").insert(&key, rng.gen_range(0..9i32)).expect("valid value");
        }
        2 => {
            let mut b = world.write(entity, "B").expect("every entity has B");
            b.map("tags").expect("map").remove(&key);
        }
        3 => {
            let mut c = world.write(entity, "C").expect("every entity has C");
            let mut items = c.array("items").expect("array");
            if items.len() < 6 {
                items.push(rng.gen_range(0..9i32)).expect("valid value");
            }
        }
        4 => {
            let mut c = world.write(entity, "C").expect("every entity has C");
            let mut items = c.array("items").expect("array");
            if !items.is_empty() {
                let index = rng.gen_range(0..items.len());
                items.remove(index);
            }
        }
        5 => {
            let mut c = world.write(entity, "C").expect("every entity has C");
            let mut body = c.object("body").expect("object");
            body.set("hp", rng.gen_range(0..=255i32)).expect("valid value");
            body.set("label", key.as_str()).expect("valid value");
        }
        _ => {
            if entities.len() > 1 {
                world.destroy(entity).expect("entity is live");
            }
            let comps = [("A", Fields::new()), ("B", Fields::new()), ("C", Fields::new())];
            world.create(&comps).expect("valid fields");
        }
    }
}

#[test]
fn test_random_writes_replicate() {
    test_util::init();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut source = abc_builder().build().expect("valid world");
    let mut replica = abc_builder().build().expect("valid world");

    for _ in 0..3 {
        let comps = [("A", Fields::new()), ("B", Fields::new()), ("C", Fields::new())];
        source.create(&comps).expect("valid fields");
    }

    for _ in 0..30 {
        for _ in 0..rng.gen_range(1..12) {
            random_write(&mut source, &mut rng);
        }
        source.tick(0.);

        let bytes = source.encode_diff().expect("diff matches the schemas");
        replica.set_encoded(&bytes).expect("diff is valid");
        replica.tick(0.);
        source.mark_clean();
        replica.mark_clean();

        assert_eq!(snapshot(&replica), snapshot(&source));
    }
}

#[test]
fn test_codec_trait_is_composable() {
    let mut writer = Writer::default();
    ScalarCodec(ScalarKind::U8).encode(&Value::Int(1), &mut writer).expect("valid value");
    ScalarCodec(ScalarKind::Str).encode(&Value::from("x"), &mut writer).expect("valid value");

    let mut reader = Reader::new(writer.as_bytes());
    assert_eq!(ScalarCodec(ScalarKind::U8).decode(&mut reader), Ok(Value::Int(1)));
    assert_eq!(ScalarCodec(ScalarKind::Str).decode(&mut reader), Ok(Value::from("x")));
    assert_eq!(reader.remaining(), 0);
}
