use criterion::*;
use diffec::{test_util, Fields};

fn create_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("create entity");

    for num_comps in [0, 1, 2, 4, 8, 16] {
        let names: Vec<String> = (1..=num_comps).map(|n| format!("Comp{n}")).collect();
        let init: Vec<(&str, Fields)> =
            names.iter().map(|name| (name.as_str(), diffec::fields! { "value" => 1 })).collect();

        for log_entities in (0..=8).step_by(4) {
            let entities = 1 << log_entities;
            group.throughput(Throughput::Elements(entities));
            let id =
                BenchmarkId::new(format!("{num_comps} components"), format!("{entities} entities"));
            group.bench_with_input(id, &entities, |b, &entities| {
                b.iter_batched(
                    || test_util::comp_n_world(num_comps),
                    |mut world| {
                        for _ in 0..entities {
                            world.create(&init).expect("fields match the schemas");
                        }
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
}

criterion_group!(benches, create_entity);
criterion_main!(benches);
