//! # World
//!
//! Owns entities, component columns and resources.
//!
//! Structural changes (spawn, despawn, insert, remove) take `&mut self`.
//! Systems only ever see `&World`; their structural changes travel through
//! command buffers and land between stages.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use parking_lot::MappedRwLockReadGuard;

use super::commands::PlaceholderMap;
use super::query::{Query, QueryData};
use super::storage::{Column, ErasedColumn};
use super::entity::AliveIter;
use super::{Bundle, Component, Entity, EntityAllocator, Resource, Resources};
use crate::error::{SystemError, SystemResult};
use crate::system::Access;

/// The ECS world.
pub struct World {
    entities: EntityAllocator,
    columns: HashMap<TypeId, Box<dyn ErasedColumn>>,
    resources: Resources,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world holding only a [`PlaceholderMap`].
    #[must_use]
    pub fn new() -> Self {
        let mut resources = Resources::new();
        resources.insert(PlaceholderMap::default());
        Self {
            entities: EntityAllocator::new(),
            columns: HashMap::new(),
            resources,
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with no components.
    pub fn create_entity(&mut self) -> Entity {
        self.entities.allocate()
    }

    /// Creates an entity and inserts every component of `bundle`.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        let entity = self.create_entity();
        bundle.insert_into(self, entity);
        entity
    }

    /// Destroys an entity and all of its components.
    ///
    /// Returns `false` if the entity was not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.entities.free(entity) {
            return false;
        }
        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of alive entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterates alive entities in ascending id order.
    pub fn entities(&self) -> AliveIter<'_> {
        self.entities.iter()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Inserts or replaces a component.
    ///
    /// Returns `false` (and drops `value`) if the entity is not alive.
    pub fn insert_component<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.init_column::<T>().insert(entity, value);
        true
    }

    /// Removes a component, returning it.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.column_mut::<T>()?.remove(entity)
    }

    /// Borrows a component through its column lock.
    #[must_use]
    pub fn get_component<T: Component>(
        &self,
        entity: Entity,
    ) -> Option<MappedRwLockReadGuard<'_, T>> {
        self.column::<T>()?.get(entity)
    }

    /// Mutably borrows a component.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(entity)
    }

    /// Checks if `entity` has a `T`. Never locks.
    #[inline]
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.column::<T>().is_some_and(|column| column.contains(entity))
    }

    /// Entities holding a `T`, in column order.
    #[must_use]
    pub fn component_entities<T: Component>(&self) -> &[Entity] {
        match self.column::<T>() {
            Some(column) => column.entities(),
            None => &[],
        }
    }

    /// Number of component columns created so far.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of components attached to `entity`.
    #[must_use]
    pub fn component_count(&self, entity: Entity) -> usize {
        self.columns
            .values()
            .filter(|column| column.contains(entity))
            .count()
    }

    pub(crate) fn column<T: Component>(&self) -> Option<&Column<T>> {
        self.columns
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<Column<T>>()
    }

    fn column_mut<T: Component>(&mut self) -> Option<&mut Column<T>> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Column<T>>()
    }

    /// Ensures a column exists for `T`.
    pub(crate) fn init_column<T: Component>(&mut self) -> &mut Column<T> {
        let column = self
            .columns
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                tracing::trace!(component = type_name::<T>(), "column created");
                Box::new(Column::<T>::new())
            });
        match column.as_any_mut().downcast_mut::<Column<T>>() {
            Some(column) => column,
            None => unreachable!("column keyed by TypeId of {}", type_name::<T>()),
        }
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Inserts a resource, returning the one it replaced.
    pub fn insert_resource<R: Resource>(&mut self, value: R) -> Option<R> {
        self.resources.insert(value)
    }

    /// Inserts `R::default()` unless the resource already exists.
    pub fn init_resource<R: Resource + Default>(&mut self) {
        if !self.resources.contains::<R>() {
            self.resources.insert(R::default());
        }
    }

    /// Borrows a resource through its lock.
    #[must_use]
    pub fn get_resource<R: Resource>(&self) -> Option<MappedRwLockReadGuard<'_, R>> {
        self.resources.get::<R>()
    }

    /// Mutably borrows a resource.
    pub fn get_resource_mut<R: Resource>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }

    /// Removes a resource.
    pub fn remove_resource<R: Resource>(&mut self) -> Option<R> {
        self.resources.remove::<R>()
    }

    /// Checks if a resource exists.
    #[inline]
    #[must_use]
    pub fn contains_resource<R: Resource>(&self) -> bool {
        self.resources.contains::<R>()
    }

    /// The resource store.
    #[inline]
    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    // =========================================================================
    // Queries and bookkeeping
    // =========================================================================

    /// Runs a query directly against the world.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::ConflictingQuery`] if `Q` borrows a component
    /// both mutably and otherwise, which would deadlock on the column lock.
    pub fn query<Q: QueryData>(&mut self) -> SystemResult<Query<'_, Q>> {
        let mut access = Access::new();
        Q::access(&mut access);
        if let Some(key) = access.self_conflicts().first() {
            return Err(SystemError::ConflictingQuery {
                query: type_name::<Q>(),
                target: key.to_string(),
            });
        }
        Q::init(self);
        Ok(Query::new(self))
    }

    /// Drops placeholder mappings whose entity has been destroyed.
    pub fn prune_placeholders(&mut self) {
        let entities = &self.entities;
        if let Some(map) = self.resources.get_mut::<PlaceholderMap>() {
            map.retain(|entity| entities.is_alive(entity));
        }
    }
}
