//! # Run Conditions
//!
//! Boolean systems gating another system. Conditions compose with `not`,
//! `and` and `or`; composition short-circuits from the left.

use std::fmt;

use crate::ecs::World;
use crate::error::SystemResult;
use crate::system::{Access, IntoSystem, System, SystemContext};

/// A boxed condition system.
pub type BoxedCondition = Box<dyn System<Out = bool>>;

/// A composed run condition.
pub enum Condition {
    /// Always true.
    True,
    /// A read-only system returning `bool`.
    System(BoxedCondition),
    /// Negation.
    Not(Box<Condition>),
    /// Both hold; the right side is skipped when the left is false.
    And(Box<Condition>, Box<Condition>),
    /// Either holds; the right side is skipped when the left is true.
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Wraps a condition system.
    pub fn from_system<M>(condition: impl IntoSystem<bool, M>) -> Self {
        Self::System(Box::new(IntoSystem::into_system(condition)))
    }

    /// Negates this condition.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// `self && other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// `self || other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Initializes every condition system.
    pub fn initialize(&mut self, world: &mut World) {
        match self {
            Self::True => {}
            Self::System(system) => system.initialize(world),
            Self::Not(inner) => inner.initialize(world),
            Self::And(left, right) | Self::Or(left, right) => {
                left.initialize(world);
                right.initialize(world);
            }
        }
    }

    /// Folds the reads of every condition system into `access`.
    pub fn merge_access(&self, access: &mut Access) {
        self.for_each_system(&mut |system| access.merge(system.access()));
    }

    /// Visits every condition system, left to right.
    pub fn for_each_system(&self, visit: &mut dyn FnMut(&dyn System<Out = bool>)) {
        match self {
            Self::True => {}
            Self::System(system) => visit(system.as_ref()),
            Self::Not(inner) => inner.for_each_system(visit),
            Self::And(left, right) | Self::Or(left, right) => {
                left.for_each_system(visit);
                right.for_each_system(visit);
            }
        }
    }

    /// Evaluates the condition.
    ///
    /// # Errors
    ///
    /// Propagates parameter resolution failures of the condition systems.
    pub fn evaluate(&mut self, ctx: &SystemContext<'_>) -> SystemResult<bool> {
        match self {
            Self::True => Ok(true),
            Self::System(system) => system.run(&ctx.renamed(system.name())),
            Self::Not(inner) => Ok(!inner.evaluate(ctx)?),
            Self::And(left, right) => Ok(left.evaluate(ctx)? && right.evaluate(ctx)?),
            Self::Or(left, right) => Ok(left.evaluate(ctx)? || right.evaluate(ctx)?),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("true"),
            Self::System(system) => f.write_str(system.name()),
            Self::Not(inner) => write!(f, "!{inner:?}"),
            Self::And(left, right) => write!(f, "({left:?} && {right:?})"),
            Self::Or(left, right) => write!(f, "({left:?} || {right:?})"),
        }
    }
}
