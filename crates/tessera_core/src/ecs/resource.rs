//! # Resources
//!
//! Type-keyed singletons. Every resource sits behind its own lock so that
//! systems reading and writing different resources can share a stage.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Marker trait for resource types.
pub trait Resource: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Resource for T {}

struct ResourceCell {
    value: RwLock<Box<dyn Any + Send + Sync>>,
    name: &'static str,
}

/// Storage for all resources of one world.
#[derive(Default)]
pub struct Resources {
    map: HashMap<TypeId, ResourceCell>,
}

impl Resources {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a resource, returning the one it replaced.
    pub fn insert<R: Resource>(&mut self, value: R) -> Option<R> {
        if let Some(cell) = self.map.get_mut(&TypeId::of::<R>()) {
            let old = std::mem::replace(cell.value.get_mut(), Box::new(value));
            return old.downcast::<R>().ok().map(|boxed| *boxed);
        }
        self.map.insert(
            TypeId::of::<R>(),
            ResourceCell {
                value: RwLock::new(Box::new(value)),
                name: type_name::<R>(),
            },
        );
        None
    }

    /// Removes a resource.
    pub fn remove<R: Resource>(&mut self) -> Option<R> {
        let cell = self.map.remove(&TypeId::of::<R>())?;
        cell.value.into_inner().downcast::<R>().ok().map(|boxed| *boxed)
    }

    /// Checks if a resource of type `R` exists.
    #[inline]
    #[must_use]
    pub fn contains<R: Resource>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<R>())
    }

    /// Shared borrow through the resource's lock.
    #[must_use]
    pub fn get<R: Resource>(&self) -> Option<MappedRwLockReadGuard<'_, R>> {
        let cell = self.map.get(&TypeId::of::<R>())?;
        RwLockReadGuard::try_map(cell.value.read_recursive(), |value| {
            (**value).downcast_ref::<R>()
        })
        .ok()
    }

    /// Exclusive borrow through the resource's lock.
    #[must_use]
    pub fn write<R: Resource>(&self) -> Option<MappedRwLockWriteGuard<'_, R>> {
        let cell = self.map.get(&TypeId::of::<R>())?;
        RwLockWriteGuard::try_map(cell.value.write(), |value| (**value).downcast_mut::<R>()).ok()
    }

    /// Exclusive borrow without locking.
    pub fn get_mut<R: Resource>(&mut self) -> Option<&mut R> {
        self.map
            .get_mut(&TypeId::of::<R>())?
            .value
            .get_mut()
            .downcast_mut::<R>()
    }

    /// Number of stored resources.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` when no resource is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Type names of every stored resource.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.map.values().map(|cell| cell.name)
    }
}

/// Resources that must stay on the thread that created them.
///
/// Owned by the application next to the world, never shared with workers.
/// Systems reach these through `NonSend`/`NonSendMut`, which pins them to
/// the main thread.
#[derive(Default)]
pub struct MainThreadResources {
    map: HashMap<TypeId, std::cell::RefCell<Box<dyn Any>>>,
}

impl MainThreadResources {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert<R: 'static>(&mut self, value: R) -> Option<R> {
        let old = self
            .map
            .insert(TypeId::of::<R>(), std::cell::RefCell::new(Box::new(value)))?;
        old.into_inner().downcast::<R>().ok().map(|boxed| *boxed)
    }

    /// Removes a value.
    pub fn remove<R: 'static>(&mut self) -> Option<R> {
        let cell = self.map.remove(&TypeId::of::<R>())?;
        cell.into_inner().downcast::<R>().ok().map(|boxed| *boxed)
    }

    /// Checks if a value of type `R` exists.
    #[must_use]
    pub fn contains<R: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<R>())
    }

    /// Shared borrow. `None` if absent or already mutably borrowed.
    #[must_use]
    pub fn get<R: 'static>(&self) -> Option<std::cell::Ref<'_, R>> {
        let cell = self.map.get(&TypeId::of::<R>())?;
        let borrowed = cell.try_borrow().ok()?;
        std::cell::Ref::filter_map(borrowed, |value| value.downcast_ref::<R>()).ok()
    }

    /// Exclusive borrow. `None` if absent or already borrowed.
    #[must_use]
    pub fn get_mut<R: 'static>(&self) -> Option<std::cell::RefMut<'_, R>> {
        let cell = self.map.get(&TypeId::of::<R>())?;
        let borrowed = cell.try_borrow_mut().ok()?;
        std::cell::RefMut::filter_map(borrowed, |value| value.downcast_mut::<R>()).ok()
    }
}
