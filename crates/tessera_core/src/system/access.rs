//! # Access Sets
//!
//! What a system reads and writes. Two systems may share a parallel stage
//! only when neither writes something the other touches.

use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of data an access key refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// A component column.
    Component,
    /// A shared resource.
    Resource,
    /// A main-thread resource.
    NonSend,
}

/// One piece of data a system touches.
#[derive(Clone, Copy, Debug)]
pub struct AccessKey {
    kind: AccessKind,
    id: TypeId,
    name: &'static str,
}

impl AccessKey {
    /// Key for component `T`.
    #[must_use]
    pub fn component<T: 'static>() -> Self {
        Self::new::<T>(AccessKind::Component)
    }

    /// Key for resource `T`.
    #[must_use]
    pub fn resource<T: 'static>() -> Self {
        Self::new::<T>(AccessKind::Resource)
    }

    /// Key for main-thread resource `T`.
    #[must_use]
    pub fn non_send<T: 'static>() -> Self {
        Self::new::<T>(AccessKind::NonSend)
    }

    fn new<T: 'static>(kind: AccessKind) -> Self {
        Self {
            kind,
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Kind of the key.
    #[must_use]
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    /// Type name of the accessed data.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for AccessKey {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

impl Eq for AccessKey {}

impl Hash for AccessKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.name)
    }
}

/// Read and write sets of a system, condition or stage.
#[derive(Clone, Debug, Default)]
pub struct Access {
    reads: HashSet<AccessKey>,
    writes: HashSet<AccessKey>,
    main_thread: bool,
    /// Keys this access set aliases with itself.
    self_conflicts: Vec<AccessKey>,
}

impl Access {
    /// Creates an empty access set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read. Reading something already written is a self-conflict.
    pub fn add_read(&mut self, key: AccessKey) {
        if self.writes.contains(&key) {
            self.self_conflicts.push(key);
        }
        self.reads.insert(key);
    }

    /// Records a write. Writing something already read or written is a self-conflict.
    pub fn add_write(&mut self, key: AccessKey) {
        if self.reads.contains(&key) || self.writes.contains(&key) {
            self.self_conflicts.push(key);
        }
        self.writes.insert(key);
    }

    /// Marks the owner as main-thread-only.
    pub fn set_main_thread(&mut self) {
        self.main_thread = true;
    }

    /// Returns `true` if the owner must run on the main thread.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        self.main_thread
    }

    /// Returns `true` if nothing is written.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Keys the owner both writes and reads, or writes twice.
    #[must_use]
    pub fn self_conflicts(&self) -> &[AccessKey] {
        &self.self_conflicts
    }

    /// Returns `true` if the two sets cannot run at the same time.
    #[must_use]
    pub fn conflicts_with(&self, other: &Access) -> bool {
        !self.writes.is_disjoint(&other.writes)
            || !self.writes.is_disjoint(&other.reads)
            || !self.reads.is_disjoint(&other.writes)
    }

    /// Folds `other` into this set without recording self-conflicts.
    ///
    /// Used to grow a stage and to attach a condition's reads to its system.
    pub fn merge(&mut self, other: &Access) {
        self.reads.extend(other.reads.iter().copied());
        self.writes.extend(other.writes.iter().copied());
        self.main_thread |= other.main_thread;
    }

    /// Read keys.
    pub fn reads(&self) -> impl Iterator<Item = &AccessKey> {
        self.reads.iter()
    }

    /// Write keys.
    pub fn writes(&self) -> impl Iterator<Item = &AccessKey> {
        self.writes.iter()
    }

    /// Returns `true` if `key` is written.
    #[must_use]
    pub fn writes_key(&self, key: &AccessKey) -> bool {
        self.writes.contains(key)
    }
}
