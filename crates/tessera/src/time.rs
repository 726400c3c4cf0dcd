//! # Frame Time
//!
//! Frame delta, elapsed time and fixed-step accounting.
//!
//! Every frame the clamped delta is added to an accumulator. The number of
//! whole fixed steps it holds becomes this frame's FIXED_UPDATE substep
//! count and is subtracted, leaving a remainder smaller than one step:
//!
//! ```text
//! sum(substeps * fixed_step) == elapsed - remainder
//! ```

use std::time::{Duration, Instant};

/// Time resource, updated by the app at the start of every frame.
#[derive(Clone, Debug)]
pub struct Time {
    delta: Duration,
    elapsed: Duration,
    fixed_step: Duration,
    max_delta: Duration,
    remainder: Duration,
    substeps: u32,
    total_substeps: u64,
    frame: u64,
}

impl Time {
    /// Creates a clock with the given fixed step and delta clamp.
    #[must_use]
    pub fn new(fixed_step: Duration, max_delta: Duration) -> Self {
        Self {
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            fixed_step,
            max_delta,
            remainder: Duration::ZERO,
            substeps: 0,
            total_substeps: 0,
            frame: 0,
        }
    }

    /// Advances by one frame of `raw_delta` and returns the substep count.
    pub fn advance(&mut self, raw_delta: Duration) -> u32 {
        let delta = if raw_delta > self.max_delta {
            tracing::warn!(
                delta_ms = raw_delta.as_millis(),
                clamp_ms = self.max_delta.as_millis(),
                "frame delta clamped"
            );
            self.max_delta
        } else {
            raw_delta
        };

        self.delta = delta;
        self.elapsed += delta;
        self.remainder += delta;

        let steps = self
            .remainder
            .as_nanos()
            .checked_div(self.fixed_step.as_nanos())
            .unwrap_or(0);
        let steps = u32::try_from(steps).unwrap_or(u32::MAX);
        self.remainder -= self.fixed_step * steps;

        self.substeps = steps;
        self.total_substeps += u64::from(steps);
        self.frame += 1;
        steps
    }

    /// Clamped duration of the current frame.
    #[inline]
    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// [`Time::delta`] in seconds.
    #[inline]
    #[must_use]
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Sum of every clamped delta.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Length of one FIXED_UPDATE step.
    #[must_use]
    pub fn fixed_step(&self) -> Duration {
        self.fixed_step
    }

    /// [`Time::fixed_step`] in seconds.
    #[must_use]
    pub fn fixed_step_secs(&self) -> f32 {
        self.fixed_step.as_secs_f32()
    }

    /// Accumulated time not yet consumed by a fixed step.
    #[must_use]
    pub fn remainder(&self) -> Duration {
        self.remainder
    }

    /// FIXED_UPDATE runs this frame.
    #[must_use]
    pub fn substep_count(&self) -> u32 {
        self.substeps
    }

    /// FIXED_UPDATE runs since startup.
    #[must_use]
    pub fn total_substeps(&self) -> u64 {
        self.total_substeps
    }

    /// Index of the current frame, starting at 1.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Source of raw frame deltas.
#[derive(Debug)]
pub(crate) enum Clock {
    /// Wall clock. The first tick reports zero.
    Real(Option<Instant>),
    /// Fixed delta per frame, for headless and deterministic runs.
    Manual(Duration),
}

impl Clock {
    pub(crate) fn tick(&mut self) -> Duration {
        match self {
            Self::Real(last) => {
                let now = Instant::now();
                let delta = last.map_or(Duration::ZERO, |last| now.duration_since(last));
                *last = Some(now);
                delta
            }
            Self::Manual(delta) => *delta,
        }
    }
}
