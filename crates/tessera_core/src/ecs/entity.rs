//! # Entity Management
//!
//! Entities are plain 32-bit identifiers:
//! - Allocated densely starting at 1
//! - Never reused once destroyed
//! - `u32::MAX` is reserved as the "no entity" sentinel
//!
//! Liveness is tracked in a bitset, 64 entities per word.

use std::fmt;

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Sentinel meaning "no entity".
    pub const NONE: Self = Self(u32::MAX);

    /// Builds an entity from its raw identifier.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the identifier as an index into sparse arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this is the [`Entity::NONE`] sentinel.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Entity(none)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

/// Hands out entity ids and remembers which ones are alive.
#[derive(Debug)]
pub struct EntityAllocator {
    /// Next id to hand out.
    next: u32,
    /// Bitset: 1 = alive. 64 entities per u64.
    alive: Vec<u64>,
    /// Cached count of alive entities.
    alive_count: usize,
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityAllocator {
    /// Creates an empty allocator. The first id handed out is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: 1,
            alive: Vec::new(),
            alive_count: 0,
        }
    }

    /// Allocates a fresh entity.
    ///
    /// # Panics
    ///
    /// Panics when the 32-bit id space is exhausted.
    pub fn allocate(&mut self) -> Entity {
        assert!(self.next < u32::MAX, "entity id space exhausted");
        let entity = Entity(self.next);
        self.next += 1;

        let word = entity.index() / 64;
        if word >= self.alive.len() {
            self.alive.resize(word + 1, 0);
        }
        self.alive[word] |= 1u64 << (entity.index() % 64);
        self.alive_count += 1;
        entity
    }

    /// Marks an entity dead. Returns `false` if it was not alive.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.alive[entity.index() / 64] &= !(1u64 << (entity.index() % 64));
        self.alive_count -= 1;
        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_none() {
            return false;
        }
        let index = entity.index();
        (self.alive.get(index / 64).copied().unwrap_or(0) >> (index % 64)) & 1 == 1
    }

    /// Number of alive entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive_count
    }

    /// Returns `true` when no entity is alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alive_count == 0
    }

    /// Total number of ids ever allocated.
    #[inline]
    #[must_use]
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }

    /// Iterates alive entities in ascending id order.
    ///
    /// Uses `trailing_zeros` to skip dead regions a word at a time.
    pub fn iter(&self) -> AliveIter<'_> {
        AliveIter {
            bits: &self.alive,
            word_idx: 0,
            current_word: self.alive.first().copied().unwrap_or(0),
        }
    }
}

/// Iterator over alive entities.
pub struct AliveIter<'a> {
    bits: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for AliveIter<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                // Clear lowest set bit
                self.current_word &= self.current_word - 1;
                let index = self.word_idx * 64 + bit;
                return u32::try_from(index).ok().map(Entity);
            }
            self.word_idx += 1;
            self.current_word = *self.bits.get(self.word_idx)?;
        }
    }
}
