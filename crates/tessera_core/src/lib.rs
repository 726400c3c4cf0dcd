//! # TESSERA Core Runtime
//!
//! Entity Component System plus a dependency-aware parallel scheduler.
//!
//! - Entities are plain ids; components live in sparse per-type columns
//! - Systems are ordinary functions whose arguments declare what they touch
//! - Schedules sort systems by `after`/`before` constraints and pack
//!   non-conflicting systems into stages that run on a worker pool
//! - Structural changes go through command buffers applied between stages
//!
//! ## Architecture Rules
//!
//! 1. **No structural change while systems run** - only commands
//! 2. **Access is declared, not discovered** - a system's parameters fix
//!    its reads and writes before the first frame
//! 3. **Deterministic stage layout** - ties break by registration order
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::prelude::*;
//!
//! fn integrate(mut bodies: Query<(Mut<Position>, Ref<Velocity>)>) {
//!     for (position, velocity) in bodies.iter_mut() {
//!         position.0 += velocity.0;
//!     }
//! }
//!
//! let mut schedule = Schedule::new("update");
//! schedule.add_systems(integrate);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod ecs;
pub mod error;
pub mod schedule;
pub mod system;

pub use ecs::{Entity, World};
pub use error::{ScheduleError, ScheduleResult, SystemError, SystemResult};
pub use schedule::{Executor, Schedule};

/// Everything needed to write systems and build schedules.
pub mod prelude {
    pub use crate::ecs::{
        Bundle, CommandBuffer, Component, Entity, EntityHandle, Event, Events, MainThreadResources,
        Mut, Optional, Query, Ref, Resource, With, Without, World,
    };
    pub use crate::error::{ScheduleError, SystemError};
    pub use crate::schedule::{
        Condition, Executor, IntoSetConfigs, IntoSystemConfigs, Schedule, SystemSet,
    };
    pub use crate::system::{
        Commands, EventReader, EventWriter, IntoSystem, Local, NonSend, NonSendMut, Res, ResMut,
    };
}
