use criterion::*;
use diffec::{test_util, Fields, World};
use rand::Rng;

fn populated(entities: u64) -> World {
    let mut world = test_util::abc_builder().build().expect("fixture is valid");
    for _ in 0..entities {
        let comps = [("A", Fields::new()), ("B", Fields::new()), ("C", Fields::new())];
        world.create(&comps).expect("fields match the schemas");
    }
    world.mark_clean();
    world
}

/// Writes to `writes` random entities of a clean world.
fn touch(world: &mut World, writes: u64) {
    let ids: Vec<_> = world.entities().collect();
    let mut rng = rand::thread_rng();
    for _ in 0..writes {
        let id = ids[rng.gen_range(0..ids.len())];
        let mut a = world.write(id, "A").expect("every entity has A");
        a.set("value", rng.gen_range(0..1000i32)).expect("valid value");

        let mut c = world.write(id, "C").expect("every entity has C");
        c.array("items").expect("items is an array").push(1).expect("valid value");
    }
}

fn encode_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode diff");

    for log_entities in (8..=12).step_by(2) {
        let entities = 1 << log_entities;
        for writes in [1, entities / 16, entities] {
            group.throughput(Throughput::Elements(writes));
            group.bench_with_input(
                BenchmarkId::new(format!("{entities} entities"), format!("{writes} writes")),
                &writes,
                |b, &writes| {
                    let mut world = populated(entities);
                    touch(&mut world, writes);
                    b.iter(|| world.encode_diff().expect("diff matches the schemas"));
                },
            );
        }
    }
}

fn apply_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply encoded diff");

    for log_entities in (8..=12).step_by(2) {
        let entities = 1 << log_entities;
        group.throughput(Throughput::Elements(entities));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{entities} entities")),
            &entities,
            |b, &entities| {
                let mut source = populated(0);
                for _ in 0..entities {
                    let comps = [("A", Fields::new()), ("C", Fields::new())];
                    source.create(&comps).expect("fields match the schemas");
                }
                let bytes = source.encode_diff().expect("diff matches the schemas");

                b.iter_batched(
                    || populated(0),
                    |mut replica| replica.set_encoded(&bytes).expect("diff is valid"),
                    BatchSize::SmallInput,
                );
            },
        );
    }
}

criterion_group!(benches, encode_diff, apply_diff);
criterion_main!(benches);
