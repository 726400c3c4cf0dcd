//! # Common Run Conditions
//!
//! Ready-made conditions for `run_if` and friends. Each returns a cloneable
//! read-only system, so one call can gate a whole tuple of systems.
//!
//! ```rust,ignore
//! app.add_systems(UPDATE, (steer, shoot).run_if(in_state(AppState::Play)));
//! app.add_systems(UPDATE, rebuild_ui.run_if(state_changed::<AppState>()));
//! ```

use tessera_core::ecs::Event;
use tessera_core::ecs::Resource;
use tessera_core::system::{EventReader, Res};

use crate::state::{State, States};

/// True while state `S` equals `value`. False if `S` is not registered.
pub fn in_state<S: States>(value: S) -> impl FnMut(Option<Res<State<S>>>) -> bool + Clone {
    move |state: Option<Res<State<S>>>| state.is_some_and(|state| *state.get() == value)
}

/// True from a transition of `S` until the next frame's transition step.
pub fn state_changed<S: States>() -> impl FnMut(Option<Res<State<S>>>) -> bool + Clone {
    |state: Option<Res<State<S>>>| state.is_some_and(|state| state.is_changed())
}

/// True if events of type `E` arrived since this condition last ran.
///
/// Requires `add_event::<E>()`; without it the condition fails to resolve.
pub fn on_event<E: Event>() -> impl FnMut(EventReader<E>) -> bool + Clone {
    |mut reader: EventReader<E>| {
        let pending = !reader.is_empty();
        reader.clear();
        pending
    }
}

/// True while a resource of type `R` exists.
pub fn resource_exists<R: Resource>() -> impl FnMut(Option<Res<R>>) -> bool + Clone {
    |resource: Option<Res<R>>| resource.is_some()
}

/// True while resource `R` exists and equals `value`.
pub fn resource_equals<R>(value: R) -> impl FnMut(Option<Res<R>>) -> bool + Clone
where
    R: Resource + PartialEq + Clone,
{
    move |resource: Option<Res<R>>| resource.is_some_and(|resource| *resource == value)
}
