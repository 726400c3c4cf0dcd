//! # TESSERA Headless Demo
//!
//! A small simulation driven by the full frame loop, without a window.
//!
//! ```bash
//! # Defaults: manual 60 Hz clock, 300 frames
//! RUST_LOG=debug cargo run --bin tessera_headless
//!
//! # From a config file
//! cargo run --bin tessera_headless -- tessera.toml
//! ```

use std::process::ExitCode;

use tessera::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Phase {
    Warmup,
    Running,
}

impl States for Phase {}

struct Simulation;
impl SystemSet for Simulation {}

#[derive(Clone, Copy, Debug)]
struct Position(f32, f32);

#[derive(Clone, Copy, Debug)]
struct Velocity(f32, f32);

/// Emitted when a drone crosses the arena boundary.
struct Bounced(Entity);

#[derive(Default)]
struct Stats {
    bounces: u64,
}

const DRONES: usize = 256;
const ARENA: f32 = 100.0;
const WARMUP_FRAMES: u64 = 30;

fn spawn_drones(mut commands: Commands) {
    for i in 0..DRONES {
        #[allow(clippy::cast_precision_loss)]
        let f = i as f32;
        commands.spawn((
            Position(f % ARENA, (f * 7.0) % ARENA),
            Velocity(1.0 + f % 5.0, 2.0 - f % 3.0),
        ));
    }
}

fn finish_warmup(time: Res<Time>, mut next: ResMut<NextState<Phase>>) {
    if time.frame() >= WARMUP_FRAMES {
        next.set(Phase::Running);
    }
}

fn integrate(
    time: Res<Time>,
    mut drones: Query<(Entity, Mut<Position>, Mut<Velocity>)>,
    mut bounced: EventWriter<Bounced>,
) {
    let step = time.fixed_step_secs() * 10.0;
    for (entity, position, velocity) in drones.iter_mut() {
        position.0 += velocity.0 * step;
        position.1 += velocity.1 * step;
        if !(0.0..=ARENA).contains(&position.0) {
            velocity.0 = -velocity.0;
            position.0 = position.0.clamp(0.0, ARENA);
            bounced.send(Bounced(entity));
        }
        if !(0.0..=ARENA).contains(&position.1) {
            velocity.1 = -velocity.1;
            position.1 = position.1.clamp(0.0, ARENA);
            bounced.send(Bounced(entity));
        }
    }
}

fn count_bounces(mut events: EventReader<Bounced>, mut stats: ResMut<Stats>) {
    for Bounced(drone) in events.read() {
        tracing::trace!(%drone, "bounce");
        stats.bounces += 1;
    }
}

fn announce_running(drones: Query<Ref<Position>>) {
    tracing::info!(drones = drones.count(), "simulation running");
}

fn report(stats: Res<Stats>, time: Res<Time>) {
    tracing::info!(
        bounces = stats.bounces,
        frames = time.frame(),
        fixed_steps = time.total_substeps(),
        "simulation finished"
    );
}

/// Drone arena: spawning, warmup, fixed-step motion and the final report.
struct DronePlugin;

impl Plugin for DronePlugin {
    fn build(&self, app: &mut App) {
        app.init_state(Phase::Warmup)
            .init_resource::<Stats>()
            .add_event::<Bounced>()
            .add_systems(STARTUP, spawn_drones)
            .add_systems(UPDATE, finish_warmup.run_if(in_state(Phase::Warmup)))
            .add_systems(
                FIXED_UPDATE,
                (integrate, count_bounces.run_if(on_event::<Bounced>()))
                    .chain()
                    .in_set(Simulation)
                    .run_and(in_state(Phase::Running)),
            )
            .add_systems(OnEnter(Phase::Running), announce_running)
            .add_systems(SHUTDOWN, report);
    }
}

fn config() -> Result<AppConfig, tessera::ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig {
            frame_delta_secs: Some(1.0 / 60.0),
            max_frames: Some(300),
            ..AppConfig::default()
        }),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = App::with_config(config).add_plugins(DronePlugin).run();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "application failed");
            ExitCode::FAILURE
        }
    }
}
