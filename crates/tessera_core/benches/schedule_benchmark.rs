//! # Schedule Benchmark
//!
//! Stage formation and per-frame execution overhead.
//!
//! Run with: `cargo bench --package tessera_core --bench schedule_benchmark`

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion};
use tessera_core::ecs::{MainThreadResources, Mut, Query, Ref, World};
use tessera_core::schedule::{Executor, IntoSystemConfigs, Schedule};
use tessera_core::system::{Res, ResMut};

struct Position(f32);
struct Velocity(f32);
struct Health(u32);
struct Tick(u64);

fn integrate(mut q: Query<(Mut<Position>, Ref<Velocity>)>) {
    for (p, v) in q.iter_mut() {
        p.0 += v.0;
    }
}

fn regenerate(mut q: Query<Mut<Health>>) {
    for h in q.iter_mut() {
        h.0 = h.0.saturating_add(1);
    }
}

fn observe(q: Query<Ref<Position>>, _tick: Res<Tick>) {
    criterion::black_box(q.count());
}

fn advance(mut tick: ResMut<Tick>) {
    tick.0 += 1;
}

fn world() -> World {
    let mut world = World::new();
    world.insert_resource(Tick(0));
    for _ in 0..10_000 {
        world.spawn((Position(0.0), Velocity(1.0), Health(0)));
    }
    world
}

fn bench_build(c: &mut Criterion) {
    let mut world = world();
    c.bench_function("schedule_build", |b| {
        b.iter(|| {
            let mut schedule = Schedule::new("bench");
            schedule.add_systems((integrate, regenerate, observe.after(integrate), advance));
            schedule.build(&mut world).map(|()| schedule.stages().len())
        });
    });
}

fn bench_run(c: &mut Criterion) {
    let mut world = world();
    let main = MainThreadResources::new();
    let Ok(executor) = Executor::new(4) else {
        return;
    };
    let mut schedule = Schedule::new("bench");
    schedule.add_systems((integrate, regenerate, observe.after(integrate), advance));

    c.bench_function("schedule_run_10k", |b| {
        b.iter(|| schedule.run(&mut world, &main, &executor));
    });
}

criterion_group!(benches, bench_build, bench_run);
criterion_main!(benches);
