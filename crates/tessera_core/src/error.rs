//! # Runtime Error Types
//!
//! Errors raised while building schedules and while running systems.
//! Absent components, absent resources on direct world access and commands
//! aimed at dead entities are not errors; they surface as `None`/`false` or
//! as warnings in the log.

use thiserror::Error;

/// Errors raised by a single system invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// A `Res`/`ResMut`/`EventReader`/`EventWriter` parameter named a
    /// resource that is not in the world.
    #[error("system `{system}` requested missing resource `{resource}`")]
    MissingResource {
        /// The system being resolved.
        system: String,
        /// Type name of the missing resource.
        resource: &'static str,
    },

    /// A `NonSend` parameter was resolved without main-thread resources,
    /// or the value is not present.
    #[error("system `{system}` requested main-thread resource `{resource}` which is unavailable")]
    MainThreadResourceUnavailable {
        /// The system being resolved.
        system: String,
        /// Type name of the resource.
        resource: &'static str,
    },

    /// A direct world query borrows one component both mutably and otherwise.
    #[error("query `{query}` has conflicting access to `{target}`")]
    ConflictingQuery {
        /// Type name of the query signature.
        query: &'static str,
        /// Type accessed twice.
        target: String,
    },

    /// The system ran before its parameter state was initialized.
    #[error("system `{system}` was run before initialization")]
    Uninitialized {
        /// The offending system.
        system: String,
    },
}

/// Errors raised while validating or running a schedule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The same system function was added twice to one schedule.
    #[error("system `{system}` is registered twice in schedule `{schedule}`")]
    DuplicateSystem {
        /// Schedule name.
        schedule: String,
        /// Duplicate system.
        system: String,
    },

    /// An ordering constraint named a system that is not in the schedule.
    #[error("system `{system}` in schedule `{schedule}` is ordered against unknown system `{target}`")]
    UnknownSystem {
        /// Schedule name.
        schedule: String,
        /// System holding the constraint.
        system: String,
        /// The missing system.
        target: String,
    },

    /// An ordering constraint named a set with no members and no configuration.
    #[error("`{owner}` in schedule `{schedule}` is ordered against unknown set `{set}`")]
    UnknownSet {
        /// Schedule name.
        schedule: String,
        /// System or set holding the constraint.
        owner: String,
        /// The missing set.
        set: String,
    },

    /// The ordering graph contains a cycle.
    #[error("dependency cycle in schedule `{schedule}`: {}", systems.join(" -> "))]
    Cycle {
        /// Schedule name.
        schedule: String,
        /// Systems on the cycle, in edge order.
        systems: Vec<String>,
    },

    /// A system's own parameters alias the same data mutably.
    #[error("system `{system}` in schedule `{schedule}` has conflicting access to `{target}`")]
    ConflictingAccess {
        /// Schedule name.
        schedule: String,
        /// Offending system.
        system: String,
        /// Type accessed twice.
        target: String,
    },

    /// A run condition declared write access.
    #[error("run condition `{condition}` on system `{system}` in schedule `{schedule}` must be read-only")]
    ConditionWrites {
        /// Schedule name.
        schedule: String,
        /// System the condition guards.
        system: String,
        /// The condition.
        condition: String,
    },

    /// A system failed while running.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Result type for schedule operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Result type for a single system invocation.
pub type SystemResult<T> = Result<T, SystemError>;
