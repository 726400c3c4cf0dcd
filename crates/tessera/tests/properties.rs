//! Seeded randomized checks of world, command, query and scheduling
//! invariants. Every case derives its RNG from a fixed seed, so failures
//! reproduce.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tessera::prelude::*;
use tessera_core::ecs::PlaceholderMap;
use tessera_core::schedule::{Label, StageKind, SystemConfigs};
use tessera_core::system::SystemKey;

const CASES: u64 = 32;

fn rng(case: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0x7e55_e7a0 ^ case)
}

// =============================================================================
// World
// =============================================================================

#[test]
fn live_entities_never_share_an_id() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let mut world = World::new();
        let mut live: Vec<Entity> = Vec::new();
        let mut ever: HashSet<Entity> = HashSet::new();

        for _ in 0..200 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let entity = world.create_entity();
                assert!(ever.insert(entity), "case {case}: id {entity} reused");
                live.push(entity);
            } else {
                let victim = live.swap_remove(rng.gen_range(0..live.len()));
                assert!(world.destroy_entity(victim));
                assert!(!world.destroy_entity(victim));
            }
            assert_eq!(world.entity_count(), live.len());
        }

        let alive: BTreeSet<Entity> = world.entities().collect();
        assert_eq!(alive, live.iter().copied().collect::<BTreeSet<_>>());
    }
}

#[derive(Debug, PartialEq)]
struct Health(u32);

#[derive(Debug, PartialEq)]
struct Seed(u64);

#[test]
fn insert_replaces_components_and_resources() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let mut world = World::new();
        let entity = world.create_entity();
        let mut last = None;

        for _ in 0..20 {
            let value = rng.gen_range(0..1_000);
            assert!(world.insert_component(entity, Health(value)));
            world.insert_resource(Seed(u64::from(value)));
            last = Some(value);
        }

        let last = last.unwrap();
        assert_eq!(world.component_count(entity), 1);
        assert_eq!(world.component_entities::<Health>(), &[entity]);
        assert_eq!(*world.get_component::<Health>(entity).unwrap(), Health(last));
        assert_eq!(*world.get_resource::<Seed>().unwrap(), Seed(u64::from(last)));
        assert_eq!(world.remove_resource::<Seed>(), Some(Seed(u64::from(last))));
        assert!(world.remove_resource::<Seed>().is_none());
    }
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tag(u32);

#[test]
fn placeholders_resolve_to_spawned_entities() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let mut world = World::new();
        let mut buffer = CommandBuffer::new();
        let mut expected: Vec<(EntityHandle, Option<u32>)> = Vec::new();

        for _ in 0..rng.gen_range(1..40) {
            let handle = buffer.spawn_empty();
            let tag = rng.gen_bool(0.7).then(|| rng.gen_range(0..100));
            if let Some(tag) = tag {
                buffer.insert(handle, Tag(tag));
            }
            expected.push((handle, tag));
        }
        assert_eq!(world.entity_count(), 0);

        let stats = buffer.apply(&mut world);
        assert_eq!(stats.dropped, 0);
        assert!(buffer.is_empty());

        let map = world.get_resource::<PlaceholderMap>().unwrap();
        for (handle, tag) in expected {
            let entity = map.resolve(handle).unwrap();
            assert!(world.is_alive(entity));
            let actual = world.get_component::<Tag>(entity).map(|tag| *tag);
            assert_eq!(actual, tag.map(Tag), "case {case}");
        }
    }
}

#[test]
fn commands_apply_in_submission_order() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let mut world = World::new();
        let entity = world.create_entity();
        let mut buffer = CommandBuffer::new();
        let mut model: Option<u32> = None;

        for _ in 0..30 {
            if rng.gen_bool(0.6) {
                let value = rng.gen_range(0..50);
                buffer.insert(entity, Tag(value));
                model = Some(value);
            } else {
                buffer.remove::<Tag>(entity);
                model = None;
            }
        }
        let stats = buffer.apply(&mut world);
        assert_eq!(stats.applied, 30);
        assert_eq!(stats.dropped, 0);

        let actual = world.get_component::<Tag>(entity).map(|tag| tag.0);
        assert_eq!(actual, model, "case {case}");
    }
}

#[test]
fn commands_dropped_for_dead_targets() {
    let mut world = World::new();
    let entity = world.create_entity();
    assert!(world.destroy_entity(entity));

    let mut buffer = CommandBuffer::new();
    buffer.insert(entity, Tag(1));
    buffer.despawn(entity);
    let stats = buffer.apply(&mut world);
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.dropped, 2);
    assert_eq!(world.entity_count(), 0);
}

// =============================================================================
// Queries
// =============================================================================

struct A(u32);
struct B;
struct C;
struct D(u32);

#[test]
fn query_matches_with_without_optional() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let mut world = World::new();
        let mut expected: HashMap<Entity, (u32, Option<u32>)> = HashMap::new();

        for i in 0..64 {
            let entity = world.create_entity();
            let (a, b, c, d) = (
                rng.gen_bool(0.6),
                rng.gen_bool(0.5),
                rng.gen_bool(0.3),
                rng.gen_bool(0.5),
            );
            if a {
                world.insert_component(entity, A(i));
            }
            if b {
                world.insert_component(entity, B);
            }
            if c {
                world.insert_component(entity, C);
            }
            if d {
                world.insert_component(entity, D(i * 10));
            }
            if a && b && !c {
                expected.insert(entity, (i, d.then_some(i * 10)));
            }
        }

        let query = world
            .query::<(Entity, Ref<A>, With<B>, Without<C>, Optional<Ref<D>>)>()
            .unwrap();
        let actual: HashMap<Entity, (u32, Option<u32>)> = query
            .iter()
            .map(|(entity, a, (), (), d)| (entity, (a.0, d.map(|d| d.0))))
            .collect();
        assert_eq!(actual, expected, "case {case}");
        assert_eq!(query.count(), expected.len());
    }
}

// =============================================================================
// Scheduling
// =============================================================================

struct R0(u32);
struct R1(u32);
struct C0(u32);
struct C1(u32);

fn s0(mut r: ResMut<R0>) {
    r.0 += 1;
}
fn s1(r: Res<R0>) {
    let _ = r.0;
}
fn s2(mut r: ResMut<R1>) {
    r.0 += 1;
}
fn s3(a: Res<R0>, b: Res<R1>) {
    let _ = a.0 + b.0;
}
fn s4(mut q: Query<Mut<C0>>) {
    q.for_each_mut(|c| c.0 += 1);
}
fn s5(q: Query<Ref<C0>>) {
    let _ = q.iter().map(|c| c.0).sum::<u32>();
}
fn s6(mut q: Query<Mut<C1>>) {
    q.for_each_mut(|c| c.0 += 1);
}
fn s7(q: Query<(Ref<C1>, Ref<C0>)>) {
    let _ = q.count();
}

const SYSTEMS: usize = 8;

/// `(reads, writes)` per system, by name of the type touched.
fn declared_access(index: usize) -> (&'static [&'static str], &'static [&'static str]) {
    match index {
        0 => (&[], &["R0"]),
        1 => (&["R0"], &[]),
        2 => (&[], &["R1"]),
        3 => (&["R0", "R1"], &[]),
        4 => (&[], &["C0"]),
        5 => (&["C0"], &[]),
        6 => (&[], &["C1"]),
        _ => (&["C0", "C1"], &[]),
    }
}

fn conflicting(left: usize, right: usize) -> bool {
    let (left_reads, left_writes) = declared_access(left);
    let (right_reads, right_writes) = declared_access(right);
    left_writes
        .iter()
        .any(|w| right_writes.contains(w) || right_reads.contains(w))
        || right_writes.iter().any(|w| left_reads.contains(w))
}

fn key(index: usize) -> SystemKey {
    match index {
        0 => SystemKey::of_val(&s0),
        1 => SystemKey::of_val(&s1),
        2 => SystemKey::of_val(&s2),
        3 => SystemKey::of_val(&s3),
        4 => SystemKey::of_val(&s4),
        5 => SystemKey::of_val(&s5),
        6 => SystemKey::of_val(&s6),
        _ => SystemKey::of_val(&s7),
    }
}

fn configs(index: usize) -> SystemConfigs {
    match index {
        0 => s0.into_configs(),
        1 => s1.into_configs(),
        2 => s2.into_configs(),
        3 => s3.into_configs(),
        4 => s4.into_configs(),
        5 => s5.into_configs(),
        6 => s6.into_configs(),
        _ => s7.into_configs(),
    }
}

fn world_with_data() -> World {
    let mut world = World::new();
    world.insert_resource(R0(0));
    world.insert_resource(R1(0));
    for i in 0..16 {
        world.spawn((C0(i), C1(i)));
    }
    world
}

fn shuffled(rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..SYSTEMS).collect();
    for i in (1..order.len()).rev() {
        order.swap(i, rng.gen_range(0..=i));
    }
    order
}

fn assert_stages_are_safe(schedule: &Schedule, case: u64) {
    let stage_of: Vec<usize> = (0..SYSTEMS)
        .map(|i| schedule.stage_of(key(i)).unwrap())
        .collect();
    for left in 0..SYSTEMS {
        for right in (left + 1)..SYSTEMS {
            if stage_of[left] == stage_of[right] {
                assert!(
                    !conflicting(left, right),
                    "case {case}: s{left} and s{right} share a stage"
                );
            }
        }
    }
    for stage in schedule.stages() {
        assert!(!stage.is_empty());
        if stage.kind() == StageKind::MainThread {
            assert_eq!(stage.len(), 1);
        }
    }
}

#[test]
fn stages_respect_dependencies_and_access() {
    let executor = Executor::new(2).unwrap();
    let main_thread = MainThreadResources::new();

    for case in 0..CASES {
        let mut rng = rng(case);
        // Edges only go from earlier to later in a random rank order, so the
        // graph is acyclic whatever the registration order.
        let rank = shuffled(&mut rng);
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut schedule = Schedule::new("random");

        for system in shuffled(&mut rng) {
            let mut config = configs(system);
            for other in 0..SYSTEMS {
                if rank[other] < rank[system] && rng.gen_bool(0.3) {
                    config = config.after(Label::System(key(other)));
                    edges.push((system, other));
                }
            }
            schedule.add_systems(config);
        }

        let mut world = world_with_data();
        schedule.build(&mut world).unwrap();
        for (later, earlier) in &edges {
            let later_stage = schedule.stage_of(key(*later)).unwrap();
            let earlier_stage = schedule.stage_of(key(*earlier)).unwrap();
            assert!(
                later_stage > earlier_stage,
                "case {case}: s{later} after s{earlier}"
            );
        }
        assert_stages_are_safe(&schedule, case);

        schedule.run(&mut world, &main_thread, &executor).unwrap();
        assert_eq!(world.get_resource::<R0>().unwrap().0, 1);
        assert_eq!(world.get_resource::<R1>().unwrap().0, 1);
    }
}

struct Early;
impl SystemSet for Early {}

struct Late;
impl SystemSet for Late {}

#[test]
fn set_ordering_holds_for_every_member() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let mut schedule = Schedule::new("sets");
        schedule.configure_sets((Early, Late).chain());

        let mut early = Vec::new();
        let mut late = Vec::new();
        for system in shuffled(&mut rng) {
            match rng.gen_range(0..3) {
                0 => {
                    schedule.add_systems(configs(system).in_set(Early));
                    early.push(system);
                }
                1 => {
                    schedule.add_systems(configs(system).in_set(Late));
                    late.push(system);
                }
                _ => {
                    schedule.add_systems(configs(system));
                }
            }
        }

        schedule.build(&mut world_with_data()).unwrap();
        for &e in &early {
            for &l in &late {
                assert!(
                    schedule.stage_of(key(e)).unwrap() < schedule.stage_of(key(l)).unwrap(),
                    "case {case}: s{e} in Early vs s{l} in Late"
                );
            }
        }
        assert_stages_are_safe(&schedule, case);
    }
}

#[test]
fn any_ring_of_dependencies_is_a_cycle() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let order = shuffled(&mut rng);
        let ring = rng.gen_range(2..=SYSTEMS);
        let mut schedule = Schedule::new("ring");

        for (position, &system) in order.iter().enumerate() {
            let mut config = configs(system);
            if position < ring {
                let next = order[(position + 1) % ring];
                config = config.after(Label::System(key(next)));
            }
            schedule.add_systems(config);
        }

        match schedule.build(&mut world_with_data()) {
            Err(ScheduleError::Cycle { systems, .. }) => {
                assert_eq!(systems.len(), ring, "case {case}");
            }
            other => panic!("case {case}: expected a cycle, got {other:?}"),
        }
    }
}

// =============================================================================
// States and time
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Mode {
    Idle,
    Busy,
}

impl States for Mode {}

/// Planned `NextState` per frame, consumed by `drive_mode`.
struct Plan(Vec<Option<Mode>>);

/// `(frame, ran, state seen at UPDATE)` per frame.
#[derive(Default)]
struct Observed(Vec<(u64, bool, Mode)>);

fn drive_mode(time: Res<Time>, plan: Res<Plan>, mut next: ResMut<NextState<Mode>>) {
    let index = usize::try_from(time.frame() - 1).unwrap();
    if let Some(Some(mode)) = plan.0.get(index) {
        next.set(mode.clone());
    }
}

fn observe(time: Res<Time>, state: Res<State<Mode>>, mut observed: ResMut<Observed>) {
    observed.0.push((time.frame(), false, state.get().clone()));
}

fn mark_busy_ran(mut observed: ResMut<Observed>) {
    if let Some(last) = observed.0.last_mut() {
        last.1 = true;
    }
}

#[test]
fn in_state_tracks_current_state() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let plan: Vec<Option<Mode>> = (0..20)
            .map(|_| match rng.gen_range(0..4) {
                0 => Some(Mode::Idle),
                1 => Some(Mode::Busy),
                _ => None,
            })
            .collect();

        let mut app = App::with_config(AppConfig {
            worker_threads: 2,
            frame_delta_secs: Some(0.01),
            max_frames: Some(20),
            handle_interrupt: false,
            ..AppConfig::default()
        });
        app.init_state(Mode::Idle)
            .insert_resource(Plan(plan))
            .init_resource::<Observed>()
            .add_systems(
                UPDATE,
                (
                    drive_mode,
                    observe,
                    mark_busy_ran.after(observe).run_if(in_state(Mode::Busy)),
                ),
            );
        app.run().unwrap();

        let observed = app.world().get_resource::<Observed>().unwrap();
        assert_eq!(observed.0.len(), 20);
        for (frame, ran, mode) in &observed.0 {
            assert_eq!(*ran, *mode == Mode::Busy, "case {case} frame {frame}");
        }
    }
}

#[test]
fn fixed_steps_account_for_elapsed_time() {
    for case in 0..CASES {
        let mut rng = rng(case);
        let step = Duration::from_micros(rng.gen_range(1_000..40_000));
        let max_delta = Duration::from_millis(250);
        let mut time = Time::new(step, max_delta);
        let mut consumed = Duration::ZERO;

        for _ in 0..100 {
            let raw = Duration::from_micros(rng.gen_range(0..300_000));
            let steps = time.advance(raw);
            assert_eq!(steps, time.substep_count());
            assert!(time.delta() <= max_delta);
            assert!(time.remainder() < step);
            consumed += step * steps;
        }

        assert_eq!(consumed + time.remainder(), time.elapsed(), "case {case}");
    }
}
