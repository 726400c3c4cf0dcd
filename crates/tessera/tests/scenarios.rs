//! End-to-end scenarios driven through the full frame loop.

use tessera::prelude::*;
use tessera_core::system::SystemKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum AppState {
    Menu,
    Play,
}

impl States for AppState {}

#[derive(Debug)]
struct Position {
    x: i64,
}

#[derive(Debug)]
struct Velocity {
    dx: i64,
}

#[derive(Debug)]
struct Counter {
    n: i64,
}

fn headless() -> App {
    App::with_config(AppConfig {
        worker_threads: 2,
        frame_delta_secs: Some(1.0 / 60.0),
        handle_interrupt: false,
        ..AppConfig::default()
    })
}

// =============================================================================
// Spawn and iterate
// =============================================================================

#[derive(Default)]
struct Sum(Option<i64>);

fn spawn_ten(mut commands: Commands) {
    for x in 0..10 {
        commands.spawn((Position { x },));
    }
}

fn sum_positions(positions: Query<Ref<Position>>, mut sum: ResMut<Sum>) {
    sum.0 = Some(positions.iter().map(|position| position.x).sum());
}

#[test]
fn spawn_and_iterate() {
    let mut app = headless();
    app.init_resource::<Sum>()
        .add_systems(STARTUP, spawn_ten)
        .add_systems(UPDATE, sum_positions);

    app.update().unwrap();

    assert_eq!(app.world().entity_count(), 10);
    assert_eq!(app.world().get_resource::<Sum>().unwrap().0, Some(45));
}

// =============================================================================
// Command ordering
// =============================================================================

fn spawn_counter(mut commands: Commands) {
    commands.spawn((Counter { n: 1 },));
}

fn double_counters(mut counters: Query<Mut<Counter>>) {
    for counter in counters.iter_mut() {
        counter.n *= 2;
    }
}

#[test]
fn command_ordering() {
    let mut app = headless();
    app.add_systems(UPDATE, (spawn_counter, double_counters.after(spawn_counter)));

    app.update().unwrap();

    let counters: Vec<i64> = app
        .world_mut()
        .query::<Ref<Counter>>()
        .unwrap()
        .iter()
        .map(|counter| counter.n)
        .collect();
    assert_eq!(counters, vec![2]);
}

// =============================================================================
// Parallel safety
// =============================================================================

fn move_positions(mut positions: Query<Mut<Position>>) {
    for position in positions.iter_mut() {
        position.x += 1;
    }
}

fn damp_velocities(mut velocities: Query<Mut<Velocity>>) {
    for velocity in velocities.iter_mut() {
        velocity.dx /= 2;
    }
}

fn snap_positions(mut positions: Query<Mut<Position>>) {
    for position in positions.iter_mut() {
        position.x -= position.x % 2;
    }
}

#[test]
fn parallel_safety() {
    let mut app = headless();
    app.add_systems(UPDATE, (move_positions, damp_velocities, snap_positions));
    app.world_mut().spawn((Position { x: 3 }, Velocity { dx: 8 }));
    app.validate().unwrap();

    let schedule = app.schedule(UPDATE);
    let s1 = schedule.stage_of(SystemKey::of_val(&move_positions)).unwrap();
    let s2 = schedule.stage_of(SystemKey::of_val(&damp_velocities)).unwrap();
    let s3 = schedule.stage_of(SystemKey::of_val(&snap_positions)).unwrap();
    assert_eq!(s1, s2);
    assert!(s3 > s1);

    app.update().unwrap();
    let world = app.world_mut();
    let (x, dx) = {
        let query = world.query::<(Ref<Position>, Ref<Velocity>)>().unwrap();
        let values: Vec<(i64, i64)> = query.iter().map(|(p, v)| (p.x, v.dx)).collect();
        values[0]
    };
    assert_eq!((x, dx), (4, 4));
}

// =============================================================================
// State transition
// =============================================================================

#[derive(Default)]
struct Transitions {
    x: u32,
    y: u32,
    z: u32,
}

fn start_play_on_first_frame(time: Res<Time>, mut next: ResMut<NextState<AppState>>) {
    if time.frame() == 1 {
        next.set(AppState::Play);
    }
}

#[test]
fn state_transition() {
    let mut app = headless();
    app.init_state(AppState::Menu)
        .init_resource::<Transitions>()
        .add_systems(UPDATE, start_play_on_first_frame)
        .add_systems(OnExit(AppState::Menu), |mut t: ResMut<Transitions>| t.x += 1)
        .add_systems(
            OnTransition {
                from: AppState::Menu,
                to: AppState::Play,
            },
            |mut t: ResMut<Transitions>| t.y += 1,
        )
        .add_systems(OnEnter(AppState::Play), |mut t: ResMut<Transitions>| t.z += 1);

    let counts = |app: &App| {
        let counts = app.world().get_resource::<Transitions>().unwrap();
        (counts.x, counts.y, counts.z)
    };

    app.update().unwrap();
    assert_eq!(counts(&app), (1, 1, 1));
    {
        let world = app.world();
        let state = world.get_resource::<State<AppState>>().unwrap();
        assert_eq!(*state.get(), AppState::Play);
        assert_eq!(state.previous(), Some(&AppState::Menu));
        assert!(world
            .get_resource::<NextState<AppState>>()
            .unwrap()
            .pending()
            .is_none());
    }

    app.update().unwrap();
    assert_eq!(counts(&app), (1, 1, 1));
}

// =============================================================================
// Run-condition gating
// =============================================================================

#[derive(Default)]
struct PlayRuns(u32);

#[derive(Default)]
struct MenuRuns(u32);

fn count_play(mut runs: ResMut<PlayRuns>) {
    runs.0 += 1;
}

fn count_menu(mut runs: ResMut<MenuRuns>) {
    runs.0 += 1;
}

fn start_play_on_third_frame(time: Res<Time>, mut next: ResMut<NextState<AppState>>) {
    if time.frame() == 3 {
        next.set(AppState::Play);
    }
}

#[test]
fn run_condition_gating() {
    let mut app = headless();
    app.init_state(AppState::Menu)
        .init_resource::<PlayRuns>()
        .init_resource::<MenuRuns>()
        .add_systems(
            UPDATE,
            (
                count_play.run_if(in_state(AppState::Play)),
                count_menu.run_unless(in_state(AppState::Play)),
                start_play_on_third_frame,
            ),
        );

    let counts = |app: &App| {
        let world = app.world();
        (
            world.get_resource::<PlayRuns>().unwrap().0,
            world.get_resource::<MenuRuns>().unwrap().0,
        )
    };

    let mut previous = (0, 0);
    for frame in 1..=6 {
        app.update().unwrap();
        let current = counts(&app);
        let play_ran = current.0 - previous.0;
        let menu_ran = current.1 - previous.1;
        assert_eq!(play_ran + menu_ran, 1, "frame {frame}");
        if frame <= 3 {
            assert_eq!(menu_ran, 1, "frame {frame} should still be in Menu");
        } else {
            assert_eq!(play_ran, 1, "frame {frame} should be in Play");
        }
        previous = current;
    }
    assert_eq!(counts(&app), (3, 3));
}

// =============================================================================
// Event lifetime
// =============================================================================

struct Ping(u64);

#[derive(Default)]
struct Heard(Vec<(u64, u64)>);

fn ping_on_first_frame(time: Res<Time>, mut pings: EventWriter<Ping>) {
    if time.frame() == 1 {
        pings.send(Ping(time.frame()));
    }
}

fn listen(time: Res<Time>, mut pings: EventReader<Ping>, mut heard: ResMut<Heard>) {
    for ping in pings.read() {
        heard.0.push((time.frame(), ping.0));
    }
}

#[test]
fn events_survive_exactly_one_frame_boundary() {
    let mut app = headless();
    app.add_event::<Ping>()
        .init_resource::<Heard>()
        .add_systems(UPDATE, (listen.before(ping_on_first_frame), ping_on_first_frame));

    let heard = |app: &App| app.world().get_resource::<Heard>().unwrap().0.clone();
    let buffered = |app: &App| app.world().get_resource::<Events<Ping>>().unwrap().len();

    app.update().unwrap();
    assert!(heard(&app).is_empty());
    assert_eq!(buffered(&app), 1);

    app.update().unwrap();
    assert_eq!(heard(&app), vec![(2, 1)]);
    assert_eq!(buffered(&app), 0);

    app.update().unwrap();
    assert_eq!(heard(&app), vec![(2, 1)]);
    assert_eq!(buffered(&app), 0);
}

// =============================================================================
// State change window
// =============================================================================

#[derive(Default)]
struct ChangeSeen(Vec<u64>);

fn record_change(time: Res<Time>, mut seen: ResMut<ChangeSeen>) {
    seen.0.push(time.frame());
}

#[test]
fn state_changed_holds_for_one_frame() {
    let mut app = headless();
    app.init_state(AppState::Menu)
        .init_resource::<ChangeSeen>()
        .add_systems(
            UPDATE,
            (
                start_play_on_third_frame,
                record_change.run_if(state_changed::<AppState>()),
            ),
        );

    let seen = |app: &App| app.world().get_resource::<ChangeSeen>().unwrap().0.clone();

    for frame in 1..=3 {
        app.update().unwrap();
        assert!(seen(&app).is_empty(), "frame {frame}");
    }
    app.update().unwrap();
    assert_eq!(seen(&app), vec![4]);
    app.update().unwrap();
    assert_eq!(seen(&app), vec![4]);
    app.update().unwrap();
    assert_eq!(seen(&app), vec![4]);
}

// =============================================================================
// Cycle detection
// =============================================================================

#[derive(Default)]
struct Ran(bool);

fn sys_a(mut ran: ResMut<Ran>) {
    ran.0 = true;
}

fn sys_b() {}

fn sys_c() {}

#[test]
fn cycle_detection() {
    let mut app = headless();
    app.init_resource::<Ran>()
        .add_systems(STARTUP, |mut ran: ResMut<Ran>| ran.0 = true)
        .add_systems(
            UPDATE,
            (sys_a.after(sys_b), sys_b.after(sys_c), sys_c.after(sys_a)),
        );

    let err = app.run().unwrap_err();
    match err {
        AppError::Schedule(ScheduleError::Cycle { schedule, systems }) => {
            assert_eq!(schedule, "UPDATE");
            let mut names: Vec<&str> = systems
                .iter()
                .filter_map(|name| name.rsplit("::").next())
                .collect();
            names.sort_unstable();
            assert_eq!(names, vec!["sys_a", "sys_b", "sys_c"]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert_eq!(app.frame_count(), 0);
    assert!(!app.is_started());
    assert!(!app.world().get_resource::<Ran>().unwrap().0);
}

#[test]
fn cycle_message_names_systems() {
    let mut app = headless();
    app.add_systems(UPDATE, (sys_b.after(sys_c), sys_c.after(sys_b)));
    let message = app.validate().unwrap_err().to_string();
    assert!(message.contains("sys_b"), "{message}");
    assert!(message.contains("sys_c"), "{message}");
}
