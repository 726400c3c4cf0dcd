//! # Frame Schedules
//!
//! The fixed list of schedules an [`App`](crate::App) runs, and the
//! [`ScheduleLabel`] trait that lets frame and state schedules share
//! `add_systems`.
//!
//! ```text
//! startup:  PRE_STARTUP -> STARTUP -> OnEnter(initial states)
//! frame:    UPDATE -> FIXED_UPDATE x substeps -> state transitions
//!           -> BEFORE_RENDER_3D -> RENDER_3D -> AFTER_RENDER_3D
//!           -> BEFORE_RENDER_2D -> RENDER_2D -> AFTER_RENDER_2D
//!           -> end of frame (event swap, placeholder pruning)
//! exit:     SHUTDOWN
//! ```

use std::fmt;

use tessera_core::Schedule;

use crate::app::App;

/// One of the eleven frame schedules, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameSchedule {
    /// Runs once before [`FrameSchedule::Startup`].
    PreStartup,
    /// Runs once before the first frame.
    Startup,
    /// Runs once per frame.
    Update,
    /// Runs zero or more times per frame, once per fixed step.
    FixedUpdate,
    /// Before 2D rendering.
    BeforeRender2d,
    /// 2D rendering.
    Render2d,
    /// After 2D rendering.
    AfterRender2d,
    /// Before 3D rendering.
    BeforeRender3d,
    /// 3D rendering.
    Render3d,
    /// After 3D rendering.
    AfterRender3d,
    /// Runs once when the loop exits.
    Shutdown,
}

impl FrameSchedule {
    /// Every frame schedule in declaration order.
    pub const ALL: [Self; 11] = [
        Self::PreStartup,
        Self::Startup,
        Self::Update,
        Self::FixedUpdate,
        Self::BeforeRender2d,
        Self::Render2d,
        Self::AfterRender2d,
        Self::BeforeRender3d,
        Self::Render3d,
        Self::AfterRender3d,
        Self::Shutdown,
    ];

    /// Position in [`FrameSchedule::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Upper-case name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreStartup => "PRE_STARTUP",
            Self::Startup => "STARTUP",
            Self::Update => "UPDATE",
            Self::FixedUpdate => "FIXED_UPDATE",
            Self::BeforeRender2d => "BEFORE_RENDER_2D",
            Self::Render2d => "RENDER_2D",
            Self::AfterRender2d => "AFTER_RENDER_2D",
            Self::BeforeRender3d => "BEFORE_RENDER_3D",
            Self::Render3d => "RENDER_3D",
            Self::AfterRender3d => "AFTER_RENDER_3D",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for FrameSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs once before [`STARTUP`].
pub const PRE_STARTUP: FrameSchedule = FrameSchedule::PreStartup;
/// Runs once before the first frame.
pub const STARTUP: FrameSchedule = FrameSchedule::Startup;
/// Runs once per frame.
pub const UPDATE: FrameSchedule = FrameSchedule::Update;
/// Runs once per elapsed fixed step.
pub const FIXED_UPDATE: FrameSchedule = FrameSchedule::FixedUpdate;
/// Before 2D rendering.
pub const BEFORE_RENDER_2D: FrameSchedule = FrameSchedule::BeforeRender2d;
/// 2D rendering.
pub const RENDER_2D: FrameSchedule = FrameSchedule::Render2d;
/// After 2D rendering.
pub const AFTER_RENDER_2D: FrameSchedule = FrameSchedule::AfterRender2d;
/// Before 3D rendering.
pub const BEFORE_RENDER_3D: FrameSchedule = FrameSchedule::BeforeRender3d;
/// 3D rendering.
pub const RENDER_3D: FrameSchedule = FrameSchedule::Render3d;
/// After 3D rendering.
pub const AFTER_RENDER_3D: FrameSchedule = FrameSchedule::AfterRender3d;
/// Runs once when the loop exits.
pub const SHUTDOWN: FrameSchedule = FrameSchedule::Shutdown;

/// Render schedules in the order a frame runs them.
pub(crate) const RENDER_ORDER: [FrameSchedule; 6] = [
    BEFORE_RENDER_3D,
    RENDER_3D,
    AFTER_RENDER_3D,
    BEFORE_RENDER_2D,
    RENDER_2D,
    AFTER_RENDER_2D,
];

/// Anything naming a schedule owned by an [`App`]: a [`FrameSchedule`],
/// [`OnEnter`](crate::OnEnter), [`OnExit`](crate::OnExit) or
/// [`OnTransition`](crate::OnTransition).
pub trait ScheduleLabel {
    /// Returns the schedule, creating it if needed.
    fn schedule_mut(self, app: &mut App) -> &mut Schedule;
}

impl ScheduleLabel for FrameSchedule {
    fn schedule_mut(self, app: &mut App) -> &mut Schedule {
        app.frame_schedule_mut(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_declaration_order() {
        for (index, schedule) in FrameSchedule::ALL.iter().enumerate() {
            assert_eq!(schedule.index(), index);
        }
        assert!(PRE_STARTUP < STARTUP);
        assert!(AFTER_RENDER_3D < SHUTDOWN);
    }

    #[test]
    fn test_render_order_runs_3d_first() {
        assert_eq!(RENDER_ORDER[0], BEFORE_RENDER_3D);
        assert_eq!(RENDER_ORDER[5], AFTER_RENDER_2D);
        assert_eq!(UPDATE.to_string(), "UPDATE");
    }
}
