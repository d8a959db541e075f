//! Benchmarks for the join iterator over sparse stores.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use starward_ecs::prelude::*;

#[derive(Clone)]
struct Pos {
    x: f32,
    y: f32,
}

#[derive(Clone)]
struct Vel {
    dx: f32,
    dy: f32,
}

fn build_registry(entities: usize, vel_every: usize) -> Registry {
    let mut reg = Registry::new();
    reg.register::<Pos>();
    reg.register::<Vel>();
    for i in 0..entities {
        let e = reg.spawn();
        reg.add(
            e,
            Pos {
                x: i as f32,
                y: 0.0,
            },
        )
        .unwrap();
        if i % vel_every == 0 {
            reg.add(e, Vel { dx: 1.0, dy: 1.0 }).unwrap();
        }
    }
    reg
}

fn bench_zip(c: &mut Criterion) {
    let dense = build_registry(10_000, 1);
    c.bench_function("zip_10k_dense", |b| {
        b.iter(|| {
            let positions = dense.components::<Pos>().unwrap();
            let velocities = dense.components::<Vel>().unwrap();
            let mut acc = 0.0f32;
            for (pos, vel) in Zipper::new((positions.view(), velocities.view())) {
                acc += pos.x + vel.dx;
            }
            black_box(acc)
        })
    });

    let sparse = build_registry(10_000, 16);
    c.bench_function("zip_10k_sparse_1_in_16", |b| {
        b.iter(|| {
            let positions = sparse.components::<Pos>().unwrap();
            let velocities = sparse.components::<Vel>().unwrap();
            black_box(Zipper::new((positions.view(), velocities.view())).count())
        })
    });

    let mutate = build_registry(10_000, 2);
    c.bench_function("zip_10k_mutating", |b| {
        b.iter(|| {
            let mut positions = mutate.components_mut::<Pos>().unwrap();
            let velocities = mutate.components::<Vel>().unwrap();
            for (pos, vel) in Zipper::new((positions.view_mut(), velocities.view())) {
                pos.x += vel.dx;
                pos.y += vel.dy;
            }
        })
    });
}

criterion_group!(benches, bench_zip);
criterion_main!(benches);
