//! # Queries
//!
//! Typed views over entities matching a component signature.
//!
//! | Wrapper | Item | Matches when |
//! |---|---|---|
//! | `Ref<T>` | `&T` | entity has `T` |
//! | `Mut<T>` | `&mut T` | entity has `T` |
//! | `With<T>` | `()` | entity has `T` |
//! | `Without<T>` | `()` | entity lacks `T` |
//! | `Optional<Q>` | `Option<Q::Item>` | always |
//! | `Entity` | `Entity` | always |
//!
//! Tuples of up to eight wrappers combine with logical AND.
//!
//! ## Locking
//!
//! A query takes the column locks of every `Ref`/`Mut` it names when it is
//! created and releases them when dropped. Presence checks read the
//! unlocked sparse index, so `With`/`Without` never block.

use std::marker::PhantomData;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::entity::AliveIter;
use super::storage::Column;
use super::{Component, Entity, World};
use crate::system::{Access, AccessKey};

/// Shared access to component `T`.
pub struct Ref<T>(PhantomData<fn() -> T>);

/// Exclusive access to component `T`.
pub struct Mut<T>(PhantomData<fn() -> T>);

/// Filter: entity has `T`.
pub struct With<T>(PhantomData<fn() -> T>);

/// Filter: entity lacks `T`.
pub struct Without<T>(PhantomData<fn() -> T>);

/// Fetches `Q` when present, never filters.
pub struct Optional<Q>(PhantomData<fn() -> Q>);

/// A component signature a query can iterate.
pub trait QueryData: 'static {
    /// Locks held for the lifetime of the query.
    type State<'w>;
    /// Per-iteration view prepared from the locks.
    type Fetch<'a>;
    /// Value produced per matching entity.
    type Item<'a>;

    /// Creates the columns this signature borrows.
    fn init(world: &mut World);

    /// Records reads and writes.
    fn access(access: &mut Access);

    /// Takes the column locks.
    fn lock(world: &World) -> Self::State<'_>;

    /// Presence test against the sparse indices.
    fn matches(world: &World, entity: Entity) -> bool;

    /// Smallest required entity list, or `None` when unconstrained.
    fn candidates(world: &World) -> Option<&[Entity]>;

    /// Prepares a fetch that yields each entity at most once.
    fn prepare<'a>(state: &'a mut Self::State<'_>) -> Self::Fetch<'a>;

    /// Fetches the item for an entity that [`QueryData::matches`].
    fn fetch<'a>(fetch: &mut Self::Fetch<'a>, entity: Entity) -> Option<Self::Item<'a>>;

    /// Fetches a single item straight from the locks.
    fn fetch_one<'a>(state: &'a mut Self::State<'_>, entity: Entity) -> Option<Self::Item<'a>>;
}

/// Signatures that never hand out `&mut`.
pub trait ReadOnlyQueryData: QueryData {
    /// Fetches through a shared borrow of the locks.
    fn fetch_shared<'a>(state: &'a Self::State<'_>, entity: Entity) -> Option<Self::Item<'a>>;
}

// =============================================================================
// Ref<T>
// =============================================================================

#[doc(hidden)]
pub struct RefState<'w, T: Component> {
    column: Option<(&'w Column<T>, RwLockReadGuard<'w, Vec<T>>)>,
}

#[doc(hidden)]
pub struct RefFetch<'a, T: Component> {
    column: Option<(&'a Column<T>, &'a [T])>,
}

impl<T: Component> QueryData for Ref<T> {
    type State<'w> = RefState<'w, T>;
    type Fetch<'a> = RefFetch<'a, T>;
    type Item<'a> = &'a T;

    fn init(world: &mut World) {
        world.init_column::<T>();
    }

    fn access(access: &mut Access) {
        access.add_read(AccessKey::component::<T>());
    }

    fn lock(world: &World) -> RefState<'_, T> {
        RefState {
            column: world.column::<T>().map(|column| (column, column.read())),
        }
    }

    fn matches(world: &World, entity: Entity) -> bool {
        world.has_component::<T>(entity)
    }

    fn candidates(world: &World) -> Option<&[Entity]> {
        Some(world.component_entities::<T>())
    }

    fn prepare<'a>(state: &'a mut RefState<'_, T>) -> RefFetch<'a, T> {
        RefFetch {
            column: state
                .column
                .as_ref()
                .map(|(column, data)| (*column, data.as_slice())),
        }
    }

    fn fetch<'a>(fetch: &mut Self::Fetch<'a>, entity: Entity) -> Option<Self::Item<'a>> {
        let (column, data) = fetch.column?;
        data.get(column.slot(entity)?)
    }

    fn fetch_one<'a>(state: &'a mut RefState<'_, T>, entity: Entity) -> Option<&'a T> {
        Self::fetch_shared(state, entity)
    }
}

impl<T: Component> ReadOnlyQueryData for Ref<T> {
    fn fetch_shared<'a>(state: &'a RefState<'_, T>, entity: Entity) -> Option<&'a T> {
        let (column, data) = state.column.as_ref()?;
        data.get(column.slot(entity)?)
    }
}

// =============================================================================
// Mut<T>
// =============================================================================

#[doc(hidden)]
pub struct MutState<'w, T: Component> {
    column: Option<(&'w Column<T>, RwLockWriteGuard<'w, Vec<T>>)>,
}

/// One `Option<&mut T>` per dense slot; taking a slot hands it out exactly once.
#[doc(hidden)]
pub struct MutFetch<'a, T: Component> {
    column: Option<&'a Column<T>>,
    slots: Vec<Option<&'a mut T>>,
}

impl<T: Component> QueryData for Mut<T> {
    type State<'w> = MutState<'w, T>;
    type Fetch<'a> = MutFetch<'a, T>;
    type Item<'a> = &'a mut T;

    fn init(world: &mut World) {
        world.init_column::<T>();
    }

    fn access(access: &mut Access) {
        access.add_write(AccessKey::component::<T>());
    }

    fn lock(world: &World) -> MutState<'_, T> {
        MutState {
            column: world.column::<T>().map(|column| (column, column.write())),
        }
    }

    fn matches(world: &World, entity: Entity) -> bool {
        world.has_component::<T>(entity)
    }

    fn candidates(world: &World) -> Option<&[Entity]> {
        Some(world.component_entities::<T>())
    }

    fn prepare<'a>(state: &'a mut MutState<'_, T>) -> MutFetch<'a, T> {
        match state.column.as_mut() {
            Some((column, data)) => MutFetch {
                column: Some(*column),
                slots: data.iter_mut().map(Some).collect(),
            },
            None => MutFetch {
                column: None,
                slots: Vec::new(),
            },
        }
    }

    fn fetch<'a>(fetch: &mut Self::Fetch<'a>, entity: Entity) -> Option<Self::Item<'a>> {
        let slot = fetch.column?.slot(entity)?;
        fetch.slots.get_mut(slot)?.take()
    }

    fn fetch_one<'a>(state: &'a mut MutState<'_, T>, entity: Entity) -> Option<&'a mut T> {
        let (column, data) = state.column.as_mut()?;
        let slot = column.slot(entity)?;
        data.get_mut(slot)
    }
}

// =============================================================================
// Filters and Entity
// =============================================================================

impl<T: Component> QueryData for With<T> {
    type State<'w> = ();
    type Fetch<'a> = ();
    type Item<'a> = ();

    fn init(_world: &mut World) {}

    fn access(_access: &mut Access) {}

    fn lock(_world: &World) {}

    fn matches(world: &World, entity: Entity) -> bool {
        world.has_component::<T>(entity)
    }

    fn candidates(world: &World) -> Option<&[Entity]> {
        Some(world.component_entities::<T>())
    }

    fn prepare<'a>(_state: &'a mut ()) {}

    fn fetch<'a>(_fetch: &mut Self::Fetch<'a>, _entity: Entity) -> Option<Self::Item<'a>> {
        Some(())
    }

    fn fetch_one<'a>(_state: &'a mut (), _entity: Entity) -> Option<()> {
        Some(())
    }
}

impl<T: Component> ReadOnlyQueryData for With<T> {
    fn fetch_shared<'a>(_state: &'a (), _entity: Entity) -> Option<()> {
        Some(())
    }
}

impl<T: Component> QueryData for Without<T> {
    type State<'w> = ();
    type Fetch<'a> = ();
    type Item<'a> = ();

    fn init(_world: &mut World) {}

    fn access(_access: &mut Access) {}

    fn lock(_world: &World) {}

    fn matches(world: &World, entity: Entity) -> bool {
        !world.has_component::<T>(entity)
    }

    fn candidates(_world: &World) -> Option<&[Entity]> {
        None
    }

    fn prepare<'a>(_state: &'a mut ()) {}

    fn fetch<'a>(_fetch: &mut Self::Fetch<'a>, _entity: Entity) -> Option<Self::Item<'a>> {
        Some(())
    }

    fn fetch_one<'a>(_state: &'a mut (), _entity: Entity) -> Option<()> {
        Some(())
    }
}

impl<T: Component> ReadOnlyQueryData for Without<T> {
    fn fetch_shared<'a>(_state: &'a (), _entity: Entity) -> Option<()> {
        Some(())
    }
}

impl QueryData for Entity {
    type State<'w> = ();
    type Fetch<'a> = ();
    type Item<'a> = Entity;

    fn init(_world: &mut World) {}

    fn access(_access: &mut Access) {}

    fn lock(_world: &World) {}

    fn matches(_world: &World, _entity: Entity) -> bool {
        true
    }

    fn candidates(_world: &World) -> Option<&[Entity]> {
        None
    }

    fn prepare<'a>(_state: &'a mut ()) {}

    fn fetch<'a>(_fetch: &mut Self::Fetch<'a>, entity: Entity) -> Option<Self::Item<'a>> {
        Some(entity)
    }

    fn fetch_one<'a>(_state: &'a mut (), entity: Entity) -> Option<Entity> {
        Some(entity)
    }
}

impl ReadOnlyQueryData for Entity {
    fn fetch_shared<'a>(_state: &'a (), entity: Entity) -> Option<Entity> {
        Some(entity)
    }
}

impl<Q: QueryData> QueryData for Optional<Q> {
    type State<'w> = Q::State<'w>;
    type Fetch<'a> = Q::Fetch<'a>;
    type Item<'a> = Option<Q::Item<'a>>;

    fn init(world: &mut World) {
        Q::init(world);
    }

    fn access(access: &mut Access) {
        Q::access(access);
    }

    fn lock(world: &World) -> Q::State<'_> {
        Q::lock(world)
    }

    fn matches(_world: &World, _entity: Entity) -> bool {
        true
    }

    fn candidates(_world: &World) -> Option<&[Entity]> {
        None
    }

    fn prepare<'a>(state: &'a mut Q::State<'_>) -> Q::Fetch<'a> {
        Q::prepare(state)
    }

    fn fetch<'a>(fetch: &mut Self::Fetch<'a>, entity: Entity) -> Option<Self::Item<'a>> {
        Some(Q::fetch(fetch, entity))
    }

    fn fetch_one<'a>(state: &'a mut Q::State<'_>, entity: Entity) -> Option<Option<Q::Item<'a>>> {
        Some(Q::fetch_one(state, entity))
    }
}

impl<Q: ReadOnlyQueryData> ReadOnlyQueryData for Optional<Q> {
    fn fetch_shared<'a>(state: &'a Q::State<'_>, entity: Entity) -> Option<Option<Q::Item<'a>>> {
        Some(Q::fetch_shared(state, entity))
    }
}

macro_rules! impl_query_data_tuple {
    ($($Q:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($Q: QueryData),+> QueryData for ($($Q,)+) {
            type State<'w> = ($($Q::State<'w>,)+);
            type Fetch<'a> = ($($Q::Fetch<'a>,)+);
            type Item<'a> = ($($Q::Item<'a>,)+);

            fn init(world: &mut World) {
                $($Q::init(world);)+
            }

            fn access(access: &mut Access) {
                $($Q::access(access);)+
            }

            fn lock(world: &World) -> Self::State<'_> {
                ($($Q::lock(world),)+)
            }

            fn matches(world: &World, entity: Entity) -> bool {
                $($Q::matches(world, entity))&&+
            }

            fn candidates(world: &World) -> Option<&[Entity]> {
                let mut best: Option<&[Entity]> = None;
                $(
                    if let Some(found) = $Q::candidates(world) {
                        if best.map_or(true, |current| found.len() < current.len()) {
                            best = Some(found);
                        }
                    }
                )+
                best
            }

            fn prepare<'a>(state: &'a mut Self::State<'_>) -> Self::Fetch<'a> {
                let ($($Q,)+) = state;
                ($($Q::prepare($Q),)+)
            }

            fn fetch<'a>(fetch: &mut Self::Fetch<'a>, entity: Entity) -> Option<Self::Item<'a>> {
                let ($($Q,)+) = fetch;
                Some(($($Q::fetch($Q, entity)?,)+))
            }

            fn fetch_one<'a>(state: &'a mut Self::State<'_>, entity: Entity) -> Option<Self::Item<'a>> {
                let ($($Q,)+) = state;
                Some(($($Q::fetch_one($Q, entity)?,)+))
            }
        }

        #[allow(non_snake_case)]
        impl<$($Q: ReadOnlyQueryData),+> ReadOnlyQueryData for ($($Q,)+) {
            fn fetch_shared<'a>(state: &'a Self::State<'_>, entity: Entity) -> Option<Self::Item<'a>> {
                let ($($Q,)+) = state;
                Some(($($Q::fetch_shared($Q, entity)?,)+))
            }
        }
    };
}

impl_query_data_tuple!(A);
impl_query_data_tuple!(A, B);
impl_query_data_tuple!(A, B, C);
impl_query_data_tuple!(A, B, C, D);
impl_query_data_tuple!(A, B, C, D, E);
impl_query_data_tuple!(A, B, C, D, E, F);
impl_query_data_tuple!(A, B, C, D, E, F, G);
impl_query_data_tuple!(A, B, C, D, E, F, G, H);

// =============================================================================
// Query
// =============================================================================

/// A locked view over every entity matching `Q`.
pub struct Query<'w, Q: QueryData> {
    world: &'w World,
    state: Q::State<'w>,
}

impl<'w, Q: QueryData> Query<'w, Q> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            state: Q::lock(world),
        }
    }

    /// Iterates matching entities, handing out mutable items.
    pub fn iter_mut(&mut self) -> QueryIterMut<'_, Q> {
        QueryIterMut {
            world: self.world,
            candidates: Candidates::new::<Q>(self.world),
            fetch: Q::prepare(&mut self.state),
        }
    }

    /// Calls `f` for every matching entity.
    pub fn for_each_mut<'s>(&'s mut self, mut f: impl FnMut(Q::Item<'s>)) {
        for item in self.iter_mut() {
            f(item);
        }
    }

    /// Item for a single entity, if it matches.
    pub fn get_mut(&mut self, entity: Entity) -> Option<Q::Item<'_>> {
        if !self.contains(entity) {
            return None;
        }
        Q::fetch_one(&mut self.state, entity)
    }

    /// Checks if `entity` matches.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.world.is_alive(entity) && Q::matches(self.world, entity)
    }

    /// Number of matching entities.
    #[must_use]
    pub fn count(&self) -> usize {
        Candidates::new::<Q>(self.world)
            .filter(|entity| Q::matches(self.world, *entity))
            .count()
    }

    /// Returns `true` when nothing matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !Candidates::new::<Q>(self.world).any(|entity| Q::matches(self.world, entity))
    }
}

impl<'w, Q: ReadOnlyQueryData> Query<'w, Q> {
    /// Iterates matching entities.
    pub fn iter(&self) -> QueryIter<'_, 'w, Q> {
        QueryIter {
            world: self.world,
            candidates: Candidates::new::<Q>(self.world),
            state: &self.state,
        }
    }

    /// Item for a single entity, if it matches.
    pub fn get(&self, entity: Entity) -> Option<Q::Item<'_>> {
        if !self.contains(entity) {
            return None;
        }
        Q::fetch_shared(&self.state, entity)
    }
}

enum Candidates<'a> {
    Column(std::slice::Iter<'a, Entity>),
    All(AliveIter<'a>),
}

impl<'a> Candidates<'a> {
    fn new<Q: QueryData>(world: &'a World) -> Self {
        match Q::candidates(world) {
            Some(entities) => Self::Column(entities.iter()),
            None => Self::All(world.entities()),
        }
    }
}

impl Iterator for Candidates<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        match self {
            Self::Column(iter) => iter.next().copied(),
            Self::All(iter) => iter.next(),
        }
    }
}

/// Iterator over a query handing out mutable items.
pub struct QueryIterMut<'a, Q: QueryData> {
    world: &'a World,
    candidates: Candidates<'a>,
    fetch: Q::Fetch<'a>,
}

impl<'a, Q: QueryData> Iterator for QueryIterMut<'a, Q> {
    type Item = Q::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for entity in self.candidates.by_ref() {
            if !Q::matches(self.world, entity) {
                continue;
            }
            if let Some(item) = Q::fetch(&mut self.fetch, entity) {
                return Some(item);
            }
        }
        None
    }
}

/// Iterator over a read-only query.
pub struct QueryIter<'a, 'w, Q: QueryData> {
    world: &'a World,
    candidates: Candidates<'a>,
    state: &'a Q::State<'w>,
}

impl<'a, 'w, Q: ReadOnlyQueryData> Iterator for QueryIter<'a, 'w, Q> {
    type Item = Q::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for entity in self.candidates.by_ref() {
            if !Q::matches(self.world, entity) {
                continue;
            }
            if let Some(item) = Q::fetch_shared(self.state, entity) {
                return Some(item);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(f32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Frozen;

    fn populate() -> (World, Vec<Entity>) {
        let mut world = World::new();
        let moving = world.spawn((Position(0.0), Velocity(1.0)));
        let frozen = world.spawn((Position(5.0), Velocity(2.0), Frozen));
        let still = world.spawn((Position(9.0),));
        let bare = world.create_entity();
        (world, vec![moving, frozen, still, bare])
    }

    #[test]
    fn test_ref_mut_iteration_updates() {
        let (mut world, ids) = populate();
        {
            let mut query = world.query::<(Mut<Position>, Ref<Velocity>)>().unwrap();
            for (pos, vel) in query.iter_mut() {
                pos.0 += vel.0;
            }
        }
        assert_eq!(world.get_component::<Position>(ids[0]).map(|p| p.0), Some(1.0));
        assert_eq!(world.get_component::<Position>(ids[1]).map(|p| p.0), Some(7.0));
        assert_eq!(world.get_component::<Position>(ids[2]).map(|p| p.0), Some(9.0));
    }

    #[test]
    fn test_with_without_filters() {
        let (mut world, ids) = populate();
        let query = world
            .query::<(Entity, Ref<Position>, Without<Frozen>, With<Velocity>)>()
            .unwrap();
        let matched: Vec<Entity> = query.iter().map(|(e, _, (), ())| e).collect();
        assert_eq!(matched, vec![ids[0]]);
    }

    #[test]
    fn test_optional_never_filters() {
        let (mut world, ids) = populate();
        let query = world.query::<(Entity, Ref<Position>, Optional<Ref<Velocity>>)>().unwrap();
        let mut seen: Vec<(Entity, Option<f32>)> =
            query.iter().map(|(e, _, v)| (e, v.map(|v| v.0))).collect();
        seen.sort_by_key(|(e, _)| *e);
        assert_eq!(
            seen,
            vec![(ids[0], Some(1.0)), (ids[1], Some(2.0)), (ids[2], None)]
        );
    }

    #[test]
    fn test_query_matching_matches_definition() {
        let (mut world, ids) = populate();
        let query = world.query::<(Entity, With<Position>, Without<Velocity>)>().unwrap();
        assert_eq!(query.count(), 1);
        assert!(query.contains(ids[2]));
        assert!(!query.contains(ids[0]));
        assert!(!query.contains(ids[3]));
    }

    #[test]
    fn test_get_and_get_mut() {
        let (mut world, ids) = populate();
        {
            let mut query = world.query::<Mut<Velocity>>().unwrap();
            if let Some(v) = query.get_mut(ids[1]) {
                v.0 = 10.0;
            }
            assert!(query.get_mut(ids[2]).is_none());
        }
        let query = world.query::<Ref<Velocity>>().unwrap();
        assert_eq!(query.get(ids[1]).map(|v| v.0), Some(10.0));
    }

    #[test]
    fn test_get_skips_dead_entities() {
        let (mut world, ids) = populate();
        assert!(world.destroy_entity(ids[3]));
        {
            let mut query = world.query::<(Entity, Without<Frozen>)>().unwrap();
            assert!(query.get(ids[3]).is_none());
            assert!(query.get_mut(ids[3]).is_none());
            assert!(query.get(Entity::NONE).is_none());
            assert_eq!(query.get(ids[0]).map(|(e, ())| e), Some(ids[0]));
        }
        let query = world.query::<Optional<Ref<Velocity>>>().unwrap();
        assert!(query.get(ids[3]).is_none());
        assert!(query.get(Entity::NONE).is_none());
        assert_eq!(query.get(ids[2]), Some(None));
    }

    #[test]
    fn test_each_entity_yielded_once() {
        let mut world = World::new();
        for i in 0..100 {
            world.spawn((Position(i as f32),));
        }
        let mut query = world.query::<(Entity, Mut<Position>)>().unwrap();
        let mut seen = Vec::new();
        query.for_each_mut(|(e, pos)| {
            pos.0 = -1.0;
            seen.push(e);
        });
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_empty_world_query() {
        let mut world = World::new();
        let query = world.query::<Ref<Position>>().unwrap();
        assert!(query.is_empty());
        assert_eq!(query.iter().count(), 0);
    }
}
