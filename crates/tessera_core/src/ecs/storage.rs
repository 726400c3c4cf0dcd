//! # Component Storage
//!
//! One sparse-set column per component type:
//! - `sparse[entity]` holds the dense slot (or `EMPTY`)
//! - `entities[slot]` holds the owning entity
//! - `data[slot]` holds the value
//!
//! The sparse index is only mutated through `&mut World`, so presence
//! checks never take a lock. The dense values sit behind an `RwLock` so
//! systems running in the same stage can borrow different columns.

use std::any::Any;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Component, Entity};

const EMPTY: u32 = u32::MAX;

/// Entity -> dense slot mapping shared by every column.
#[derive(Debug, Default)]
pub(crate) struct SparseIndex {
    sparse: Vec<u32>,
    entities: Vec<Entity>,
}

impl SparseIndex {
    #[inline]
    fn slot(&self, entity: Entity) -> Option<usize> {
        self.sparse
            .get(entity.index())
            .copied()
            .filter(|&slot| slot != EMPTY)
            .map(|slot| slot as usize)
    }

    fn push(&mut self, entity: Entity) -> usize {
        let index = entity.index();
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, EMPTY);
        }
        let slot = self.entities.len();
        // Dense length never exceeds the number of live entities, which fits in u32.
        self.sparse[index] = u32::try_from(slot).unwrap_or(EMPTY);
        self.entities.push(entity);
        slot
    }

    /// Swap-removes `entity`, returning its former slot.
    fn swap_remove(&mut self, entity: Entity) -> Option<usize> {
        let slot = self.slot(entity)?;
        self.entities.swap_remove(slot);
        self.sparse[entity.index()] = EMPTY;
        if let Some(&moved) = self.entities.get(slot) {
            self.sparse[moved.index()] = u32::try_from(slot).unwrap_or(EMPTY);
        }
        Some(slot)
    }
}

/// Sparse-set storage for one component type.
pub struct Column<T: Component> {
    index: SparseIndex,
    data: RwLock<Vec<T>>,
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Column<T> {
    /// Creates an empty column.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: SparseIndex::default(),
            data: RwLock::new(Vec::new()),
        }
    }

    /// Inserts or replaces the value for `entity`, returning the old value.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let data = self.data.get_mut();
        if let Some(slot) = self.index.slot(entity) {
            return Some(std::mem::replace(&mut data[slot], value));
        }
        self.index.push(entity);
        data.push(value);
        None
    }

    /// Removes the value for `entity`.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.index.swap_remove(entity)?;
        Some(self.data.get_mut().swap_remove(slot))
    }

    /// Checks presence without locking.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.index.slot(entity).is_some()
    }

    /// Borrows the value for `entity` through a shared lock.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<MappedRwLockReadGuard<'_, T>> {
        let slot = self.index.slot(entity)?;
        RwLockReadGuard::try_map(self.data.read_recursive(), |data| data.get(slot)).ok()
    }

    /// Mutably borrows the value for `entity`. Exclusive access, no locking.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = self.index.slot(entity)?;
        self.data.get_mut().get_mut(slot)
    }

    /// Entities holding this component, in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.index.entities
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.entities.len()
    }

    /// Returns `true` when the column is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.entities.is_empty()
    }

    #[inline]
    pub(crate) fn slot(&self, entity: Entity) -> Option<usize> {
        self.index.slot(entity)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read_recursive()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write()
    }
}

/// Type-erased view of a column, used for despawn and introspection.
pub(crate) trait ErasedColumn: Send + Sync {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for Column<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        Column::contains(self, entity)
    }


    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_insert_replaces() {
        let mut column = Column::new();
        let e = Entity::from_raw(3);
        assert_eq!(column.insert(e, Health(1)), None);
        assert_eq!(column.insert(e, Health(2)), Some(Health(1)));
        assert_eq!(column.len(), 1);
        assert_eq!(column.get(e).map(|h| h.0), Some(2));
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut column = Column::new();
        let ids: Vec<Entity> = (1..=4).map(Entity::from_raw).collect();
        for (i, e) in ids.iter().enumerate() {
            column.insert(*e, Health(i as u32));
        }

        assert_eq!(column.remove(ids[0]), Some(Health(0)));
        assert!(!column.contains(ids[0]));
        // Last entity moved into slot 0
        assert_eq!(column.entities()[0], ids[3]);
        for (i, e) in ids.iter().enumerate().skip(1) {
            assert_eq!(column.get_mut(*e).map(|h| h.0), Some(i as u32));
        }
        assert_eq!(column.remove(ids[0]), None);
    }

    #[test]
    fn test_erased_remove() {
        let mut column: Box<dyn ErasedColumn> = Box::new(Column::<Health>::new());
        let e = Entity::from_raw(7);
        column
            .as_any_mut()
            .downcast_mut::<Column<Health>>()
            .unwrap()
            .insert(e, Health(9));
        assert!(column.contains(e));
        assert!(column.remove_entity(e));
        assert!(!column.remove_entity(e));
        let column = column.as_any().downcast_ref::<Column<Health>>().unwrap();
        assert!(column.is_empty());
    }
}
