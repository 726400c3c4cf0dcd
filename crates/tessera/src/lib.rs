//! # TESSERA
//!
//! Application layer on top of [`tessera_core`]: the frame loop, typed
//! states, run conditions, fixed-step time and configuration.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq, Eq, Hash)]
//! enum AppState { Menu, Play }
//! impl States for AppState {}
//!
//! App::new()
//!     .init_state(AppState::Menu)
//!     .add_systems(STARTUP, spawn_world)
//!     .add_systems(UPDATE, (steer, integrate.after(steer)).run_if(in_state(AppState::Play)))
//!     .add_systems(OnEnter(AppState::Play), reset_score)
//!     .run()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

mod app;
pub mod condition;
mod config;
mod error;
#[cfg(feature = "interrupt")]
mod interrupt;
mod plugin;
pub mod schedules;
mod state;
mod time;

pub use app::{App, AppExit};
pub use condition::{in_state, on_event, resource_equals, resource_exists, state_changed};
pub use config::{AppConfig, DEFAULT_FIXED_TIMESTEP_SECS, DEFAULT_MAX_FRAME_DELTA_SECS};
pub use error::{AppError, AppResult, ConfigError};
pub use plugin::{Plugin, Plugins};
pub use schedules::{
    FrameSchedule, ScheduleLabel, AFTER_RENDER_2D, AFTER_RENDER_3D, BEFORE_RENDER_2D,
    BEFORE_RENDER_3D, FIXED_UPDATE, PRE_STARTUP, RENDER_2D, RENDER_3D, SHUTDOWN, STARTUP, UPDATE,
};
pub use state::{NextState, OnEnter, OnExit, OnTransition, State, States};
pub use time::Time;

pub use tessera_core;

/// Everything needed to build an app.
pub mod prelude {
    pub use crate::{
        in_state, on_event, resource_equals, resource_exists, state_changed, App, AppConfig,
        AppError, AppExit, FrameSchedule, NextState, OnEnter, OnExit, OnTransition, Plugin, State,
        States, Time, AFTER_RENDER_2D, AFTER_RENDER_3D, BEFORE_RENDER_2D, BEFORE_RENDER_3D,
        FIXED_UPDATE, PRE_STARTUP, RENDER_2D, RENDER_3D, SHUTDOWN, STARTUP, UPDATE,
    };
    pub use tessera_core::prelude::*;
}
