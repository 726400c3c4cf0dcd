//! # Scheduling
//!
//! Ordering constraints, run conditions, stage formation and parallel
//! execution.

mod condition;
mod config;
mod executor;
mod graph;
mod label;

pub use condition::{BoxedCondition, Condition};
pub use config::{IntoSetConfigs, IntoSystemConfigs, SetConfig, SetConfigs, SystemConfig, SystemConfigs};
pub use executor::Executor;
pub use graph::{Schedule, Stage, StageKind};
pub use label::{IntoLabel, Label, SetKey, SystemSet};
