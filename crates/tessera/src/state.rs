//! # States
//!
//! Typed finite state machines driven by the frame loop.
//!
//! For each state type `S` the world holds a [`State<S>`] and a
//! [`NextState<S>`]. Systems request a transition by setting `NextState`;
//! the loop applies it after UPDATE and FIXED_UPDATE:
//!
//! ```text
//! OnExit(current) -> OnTransition { current, next } -> State updated -> OnEnter(next)
//! ```
//!
//! Requesting the current value again clears `NextState` and runs nothing.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tessera_core::ecs::{MainThreadResources, World};
use tessera_core::{Executor, Schedule, ScheduleResult};

use crate::app::App;
use crate::schedules::ScheduleLabel;

/// A type usable as application state.
///
/// ```rust,ignore
/// #[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// enum AppState { Menu, Play }
/// impl States for AppState {}
/// ```
pub trait States: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// The current value of state `S`.
#[derive(Clone, Debug)]
pub struct State<S: States> {
    current: S,
    previous: Option<S>,
    changed: bool,
}

impl<S: States> State<S> {
    /// Creates a state holding `initial`.
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            previous: None,
            changed: false,
        }
    }

    /// Current value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> &S {
        &self.current
    }

    /// Value before the last transition.
    #[must_use]
    pub fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    /// Returns `true` from a transition until the next frame's transition step.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

/// Pending transition for state `S`.
#[derive(Clone, Debug)]
pub struct NextState<S: States>(Option<S>);

impl<S: States> Default for NextState<S> {
    fn default() -> Self {
        Self(None)
    }
}

impl<S: States> NextState<S> {
    /// Requests a transition to `value` at the next transition step.
    pub fn set(&mut self, value: S) {
        self.0 = Some(value);
    }

    /// Drops the pending request.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// The pending request, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&S> {
        self.0.as_ref()
    }
}

// =============================================================================
// Schedule labels
// =============================================================================

/// Runs when state `S` becomes this value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OnEnter<S: States>(pub S);

/// Runs when state `S` leaves this value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OnExit<S: States>(pub S);

/// Runs between [`OnExit`] and [`OnEnter`] for one specific transition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OnTransition<S: States> {
    /// State being left.
    pub from: S,
    /// State being entered.
    pub to: S,
}

impl<S: States> ScheduleLabel for OnEnter<S> {
    fn schedule_mut(self, app: &mut App) -> &mut Schedule {
        let name = format!("OnEnter({:?})", self.0);
        app.state_schedules_mut::<S>()
            .on_enter
            .entry(self.0)
            .or_insert_with(|| Schedule::new(name))
    }
}

impl<S: States> ScheduleLabel for OnExit<S> {
    fn schedule_mut(self, app: &mut App) -> &mut Schedule {
        let name = format!("OnExit({:?})", self.0);
        app.state_schedules_mut::<S>()
            .on_exit
            .entry(self.0)
            .or_insert_with(|| Schedule::new(name))
    }
}

impl<S: States> ScheduleLabel for OnTransition<S> {
    fn schedule_mut(self, app: &mut App) -> &mut Schedule {
        let name = format!("OnTransition({:?} -> {:?})", self.from, self.to);
        app.state_schedules_mut::<S>()
            .on_transition
            .entry((self.from, self.to))
            .or_insert_with(|| Schedule::new(name))
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Type-erased access to the schedules of one state type.
pub(crate) trait StateDriver {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Builds every state schedule.
    fn build(&mut self, world: &mut World) -> ScheduleResult<()>;

    /// Runs `OnEnter(initial)` if the state was registered with `init_state`.
    fn enter_initial(
        &mut self,
        world: &mut World,
        main_thread: &MainThreadResources,
        executor: &Executor,
    ) -> ScheduleResult<()>;

    /// Applies a pending transition.
    fn transition(
        &mut self,
        world: &mut World,
        main_thread: &MainThreadResources,
        executor: &Executor,
    ) -> ScheduleResult<()>;
}

/// Schedules of state type `S`.
pub(crate) struct StateSchedules<S: States> {
    pub(crate) on_enter: HashMap<S, Schedule>,
    pub(crate) on_exit: HashMap<S, Schedule>,
    pub(crate) on_transition: HashMap<(S, S), Schedule>,
    pub(crate) registered: bool,
}

impl<S: States> StateSchedules<S> {
    pub(crate) fn new() -> Self {
        Self {
            on_enter: HashMap::new(),
            on_exit: HashMap::new(),
            on_transition: HashMap::new(),
            registered: false,
        }
    }
}

fn run_if_present(
    schedule: Option<&mut Schedule>,
    world: &mut World,
    main_thread: &MainThreadResources,
    executor: &Executor,
) -> ScheduleResult<()> {
    match schedule {
        Some(schedule) => schedule.run(world, main_thread, executor),
        None => Ok(()),
    }
}

impl<S: States> StateDriver for StateSchedules<S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn build(&mut self, world: &mut World) -> ScheduleResult<()> {
        for schedule in self
            .on_exit
            .values_mut()
            .chain(self.on_transition.values_mut())
            .chain(self.on_enter.values_mut())
        {
            schedule.build(world)?;
        }
        Ok(())
    }

    fn enter_initial(
        &mut self,
        world: &mut World,
        main_thread: &MainThreadResources,
        executor: &Executor,
    ) -> ScheduleResult<()> {
        if !self.registered {
            return Ok(());
        }
        let Some(initial) = world.get_resource::<State<S>>().map(|state| state.current.clone())
        else {
            return Ok(());
        };
        tracing::debug!(state = type_name::<S>(), value = ?initial, "entering initial state");
        run_if_present(self.on_enter.get_mut(&initial), world, main_thread, executor)
    }

    fn transition(
        &mut self,
        world: &mut World,
        main_thread: &MainThreadResources,
        executor: &Executor,
    ) -> ScheduleResult<()> {
        if let Some(state) = world.get_resource_mut::<State<S>>() {
            state.changed = false;
        }

        let Some(next) = world
            .get_resource::<NextState<S>>()
            .and_then(|next| next.0.clone())
        else {
            return Ok(());
        };
        let Some(current) = world.get_resource::<State<S>>().map(|state| state.current.clone())
        else {
            tracing::warn!(state = type_name::<S>(), "transition requested for unregistered state");
            return Ok(());
        };

        if next == current {
            if let Some(pending) = world.get_resource_mut::<NextState<S>>() {
                pending.clear();
            }
            return Ok(());
        }

        tracing::debug!(state = type_name::<S>(), from = ?current, to = ?next, "state transition");
        run_if_present(self.on_exit.get_mut(&current), world, main_thread, executor)?;
        run_if_present(
            self.on_transition.get_mut(&(current.clone(), next.clone())),
            world,
            main_thread,
            executor,
        )?;

        if let Some(state) = world.get_resource_mut::<State<S>>() {
            state.previous = Some(std::mem::replace(&mut state.current, next.clone()));
            state.changed = true;
        }
        if let Some(pending) = world.get_resource_mut::<NextState<S>>() {
            pending.clear();
        }

        run_if_present(self.on_enter.get_mut(&next), world, main_thread, executor)
    }
}
