//! # Application
//!
//! Owns the world, main-thread resources, the worker pool and every
//! schedule, and drives them frame by frame.
//!
//! ```text
//! run():
//!   validate every schedule ─── error? ──> return, no frame runs
//!   PRE_STARTUP -> STARTUP -> OnEnter(initial)
//!   loop until quit:
//!     tick clock -> Time (delta, substeps)
//!     UPDATE
//!     FIXED_UPDATE x substeps
//!     state transitions (OnExit -> OnTransition -> OnEnter)
//!     BEFORE_RENDER_3D -> RENDER_3D -> AFTER_RENDER_3D
//!     BEFORE_RENDER_2D -> RENDER_2D -> AFTER_RENDER_2D
//!     end of frame: event swap, placeholder pruning, frame counter
//!   SHUTDOWN
//! ```

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tessera_core::ecs::{update_events, Event, Events, MainThreadResources, Resource, World};
use tessera_core::schedule::{IntoSetConfigs, IntoSystemConfigs};
use tessera_core::{Executor, Schedule, ScheduleError};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::plugin::Plugins;
use crate::schedules::{
    FrameSchedule, ScheduleLabel, FIXED_UPDATE, PRE_STARTUP, RENDER_ORDER, SHUTDOWN, STARTUP,
    UPDATE,
};
use crate::state::{NextState, State, StateDriver, StateSchedules, States};
use crate::time::{Clock, Time};

/// Quit request shared between systems and the loop.
///
/// Read-only access is enough to request an exit, so systems holding
/// `Res<AppExit>` never serialize each other.
#[derive(Clone, Debug)]
pub struct AppExit(Arc<AtomicBool>);

impl AppExit {
    /// Asks the loop to stop after the current frame.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once an exit has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The application.
pub struct App {
    world: World,
    main_thread: MainThreadResources,
    frame_schedules: Vec<Schedule>,
    states: Vec<Box<dyn StateDriver>>,
    event_types: HashSet<TypeId>,
    event_updaters: Vec<fn(&mut World)>,
    config: AppConfig,
    executor: Option<Executor>,
    quit: Arc<AtomicBool>,
    clock: Clock,
    started: bool,
    frames: u64,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates an app with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Creates an app with `config`. The configuration is validated by
    /// [`App::validate`].
    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let quit = Arc::new(AtomicBool::new(false));
        let mut world = World::new();
        world.insert_resource(Time::new(config.fixed_timestep(), config.max_frame_delta()));
        world.insert_resource(AppExit(Arc::clone(&quit)));

        let clock = match config.frame_delta() {
            Some(delta) => Clock::Manual(delta),
            None => Clock::Real(None),
        };

        Self {
            world,
            main_thread: MainThreadResources::new(),
            frame_schedules: FrameSchedule::ALL
                .iter()
                .map(|schedule| Schedule::new(schedule.name()))
                .collect(),
            states: Vec::new(),
            event_types: HashSet::new(),
            event_updaters: Vec::new(),
            config,
            executor: None,
            quit,
            clock,
            started: false,
            frames: 0,
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Inserts or replaces a resource.
    pub fn insert_resource<R: Resource>(&mut self, value: R) -> &mut Self {
        self.world.insert_resource(value);
        self
    }

    /// Inserts `R::default()` unless the resource exists.
    pub fn init_resource<R: Resource + Default>(&mut self) -> &mut Self {
        self.world.init_resource::<R>();
        self
    }

    /// Inserts a main-thread resource, reachable through `NonSend`/`NonSendMut`.
    pub fn insert_non_send_resource<R: 'static>(&mut self, value: R) -> &mut Self {
        self.main_thread.insert(value);
        self
    }

    /// Builds one plugin or a tuple of plugins.
    pub fn add_plugins<M>(&mut self, plugins: impl Plugins<M>) -> &mut Self {
        plugins.add_to_app(self);
        self
    }

    /// Registers state `S` starting at `initial`.
    ///
    /// `OnEnter(initial)` runs once after STARTUP.
    pub fn init_state<S: States>(&mut self, initial: S) -> &mut Self {
        self.world.insert_resource(State::new(initial));
        self.world.insert_resource(NextState::<S>::default());
        self.state_schedules_mut::<S>().registered = true;
        self
    }

    /// Registers event type `E`: inserts `Events<E>` and swaps its buffers
    /// at the end of every frame.
    pub fn add_event<E: Event>(&mut self) -> &mut Self {
        if self.event_types.insert(TypeId::of::<Events<E>>()) {
            self.world.init_resource::<Events<E>>();
            self.event_updaters.push(update_events::<E>);
        }
        self
    }

    /// Adds systems to a frame or state schedule.
    pub fn add_systems<M>(
        &mut self,
        schedule: impl ScheduleLabel,
        systems: impl IntoSystemConfigs<M>,
    ) -> &mut Self {
        schedule.schedule_mut(self).add_systems(systems);
        self
    }

    /// Declares set ordering in a frame or state schedule.
    pub fn configure_sets<M>(
        &mut self,
        schedule: impl ScheduleLabel,
        sets: impl IntoSetConfigs<M>,
    ) -> &mut Self {
        schedule.schedule_mut(self).configure_sets(sets);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Main-thread resources.
    #[must_use]
    pub fn main_thread_resources(&self) -> &MainThreadResources {
        &self.main_thread
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A frame schedule.
    #[must_use]
    pub fn schedule(&self, label: FrameSchedule) -> &Schedule {
        &self.frame_schedules[label.index()]
    }

    /// Any schedule, created on first use.
    pub fn schedule_mut(&mut self, label: impl ScheduleLabel) -> &mut Schedule {
        label.schedule_mut(self)
    }

    /// Frames completed so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Returns `true` after [`App::startup`] has run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The flag behind [`AppExit`]. Setting it stops the loop after the
    /// current frame.
    #[must_use]
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    /// Returns `true` once an exit was requested or Ctrl-C received.
    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire) || self.interrupted()
    }

    #[cfg(feature = "interrupt")]
    fn interrupted(&self) -> bool {
        self.config.handle_interrupt && crate::interrupt::interrupted()
    }

    #[cfg(not(feature = "interrupt"))]
    fn interrupted(&self) -> bool {
        false
    }

    pub(crate) fn frame_schedule_mut(&mut self, label: FrameSchedule) -> &mut Schedule {
        &mut self.frame_schedules[label.index()]
    }

    pub(crate) fn state_schedules_mut<S: States>(&mut self) -> &mut StateSchedules<S> {
        let index = match self
            .states
            .iter()
            .position(|driver| driver.as_any().is::<StateSchedules<S>>())
        {
            Some(index) => index,
            None => {
                self.states.push(Box::new(StateSchedules::<S>::new()));
                self.states.len() - 1
            }
        };
        match self.states[index].as_any_mut().downcast_mut::<StateSchedules<S>>() {
            Some(schedules) => schedules,
            None => unreachable!("state driver located by type"),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validates the configuration and builds every frame and state schedule.
    ///
    /// # Errors
    ///
    /// The first configuration error found; nothing has run yet.
    pub fn validate(&mut self) -> AppResult<()> {
        self.config.validate()?;
        if self.executor.is_none() {
            self.executor = Some(Executor::new(self.config.worker_threads)?);
        }
        for schedule in &mut self.frame_schedules {
            schedule.build(&mut self.world)?;
        }
        for driver in &mut self.states {
            driver.build(&mut self.world)?;
        }
        Ok(())
    }

    /// Validates, then runs PRE_STARTUP, STARTUP and the initial `OnEnter`
    /// schedules. Does nothing on a started app.
    ///
    /// # Errors
    ///
    /// Configuration errors, or the first system failure.
    pub fn startup(&mut self) -> AppResult<()> {
        if self.started {
            return Ok(());
        }
        self.validate()?;
        tracing::info!(
            workers = self.executor.as_ref().map_or(0, Executor::worker_count),
            "application starting"
        );

        self.run_frame_schedule(PRE_STARTUP)?;
        self.run_frame_schedule(STARTUP)?;
        let Self {
            world,
            main_thread,
            states,
            executor,
            ..
        } = self;
        let executor = executor.as_ref().ok_or_else(missing_executor)?;
        for driver in states.iter_mut() {
            driver.enter_initial(world, main_thread, executor)?;
        }

        self.started = true;
        Ok(())
    }

    /// Runs one frame, starting the app first if needed.
    ///
    /// # Errors
    ///
    /// The first system failure; the frame is abandoned at that stage.
    pub fn update(&mut self) -> AppResult<()> {
        if !self.started {
            self.startup()?;
        }

        let raw_delta = self.clock.tick();
        let substeps = match self.world.get_resource_mut::<Time>() {
            Some(time) => time.advance(raw_delta),
            None => {
                let mut time =
                    Time::new(self.config.fixed_timestep(), self.config.max_frame_delta());
                let substeps = time.advance(raw_delta);
                self.world.insert_resource(time);
                substeps
            }
        };
        let _span = tracing::trace_span!("frame", frame = self.frames + 1).entered();

        self.run_frame_schedule(UPDATE)?;
        for _ in 0..substeps {
            self.run_frame_schedule(FIXED_UPDATE)?;
        }
        self.apply_state_transitions()?;
        for label in RENDER_ORDER {
            self.run_frame_schedule(label)?;
        }
        self.end_frame();
        Ok(())
    }

    /// Runs SHUTDOWN once on a started app.
    ///
    /// # Errors
    ///
    /// The first system failure.
    pub fn shutdown(&mut self) -> AppResult<()> {
        if !self.started {
            return Ok(());
        }
        self.run_frame_schedule(SHUTDOWN)?;
        self.started = false;
        tracing::info!(frames = self.frames, "application shut down");
        Ok(())
    }

    /// Starts the app, loops until quit, then shuts down.
    ///
    /// # Errors
    ///
    /// Configuration errors before the first frame, otherwise the first
    /// system failure. SHUTDOWN does not run after an error.
    pub fn run(&mut self) -> AppResult<()> {
        self.startup()?;
        #[cfg(feature = "interrupt")]
        if self.config.handle_interrupt {
            crate::interrupt::install();
        }

        while !self.should_quit() {
            self.update()?;
        }
        tracing::info!(frames = self.frames, "quit requested");
        self.shutdown()
    }

    fn run_frame_schedule(&mut self, label: FrameSchedule) -> AppResult<()> {
        let Self {
            world,
            main_thread,
            frame_schedules,
            executor,
            ..
        } = self;
        let executor = executor.as_ref().ok_or_else(missing_executor)?;
        frame_schedules[label.index()].run(world, main_thread, executor)?;
        Ok(())
    }

    fn apply_state_transitions(&mut self) -> AppResult<()> {
        let Self {
            world,
            main_thread,
            states,
            executor,
            ..
        } = self;
        let executor = executor.as_ref().ok_or_else(missing_executor)?;
        for driver in states.iter_mut() {
            driver.transition(world, main_thread, executor)?;
        }
        Ok(())
    }

    fn end_frame(&mut self) {
        for update in &self.event_updaters {
            update(&mut self.world);
        }
        self.world.prune_placeholders();
        self.frames += 1;

        if let Some(limit) = self.config.max_frames {
            if self.frames >= limit && !self.quit.swap(true, Ordering::AcqRel) {
                tracing::info!(frames = self.frames, "frame limit reached");
            }
        }
    }
}

fn missing_executor() -> ScheduleError {
    ScheduleError::WorkerPool("executor not started".to_owned())
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("started", &self.started)
            .field("frames", &self.frames)
            .field("entities", &self.world.entity_count())
            .field("states", &self.states.len())
            .finish_non_exhaustive()
    }
}
