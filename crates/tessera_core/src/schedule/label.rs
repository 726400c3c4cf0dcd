//! # Labels
//!
//! Ordering targets: individual systems (by function identity) and system
//! sets (by marker type).

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::system::{IntoSystem, SystemKey};

/// A named group of systems that can be ordered as a whole.
///
/// ```rust,ignore
/// struct Physics;
/// impl SystemSet for Physics {}
/// ```
pub trait SystemSet: Send + Sync + 'static {}

/// Identity of a system set: the `TypeId` of its marker.
#[derive(Clone, Copy)]
pub struct SetKey {
    id: TypeId,
    name: &'static str,
}

impl SetKey {
    /// Key of set `S`.
    #[must_use]
    pub fn of<S: SystemSet>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: type_name::<S>(),
        }
    }

    /// Type name of the set.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for SetKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SetKey {}

impl Hash for SetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetKey({})", self.name)
    }
}

/// Target of an `after`/`before` constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// A single system.
    System(SystemKey),
    /// Every system in a set.
    Set(SetKey),
}

impl Label {
    /// Type name of the target.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::System(key) => key.name(),
            Self::Set(key) => key.name(),
        }
    }
}

#[doc(hidden)]
pub struct IsSet;

#[doc(hidden)]
pub struct IsSystem;

/// Anything usable as an ordering target: a system function or a set marker.
pub trait IntoLabel<Marker> {
    /// Converts into a label.
    fn into_label(self) -> Label;
}

impl<S: SystemSet> IntoLabel<IsSet> for S {
    fn into_label(self) -> Label {
        Label::Set(SetKey::of::<S>())
    }
}

impl<F, Marker> IntoLabel<(IsSystem, Marker)> for F
where
    F: IntoSystem<(), Marker>,
{
    fn into_label(self) -> Label {
        Label::System(SystemKey::of::<F>())
    }
}

impl IntoLabel<()> for Label {
    fn into_label(self) -> Label {
        self
    }
}
