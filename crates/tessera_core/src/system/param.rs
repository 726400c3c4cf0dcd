//! # System Parameters
//!
//! Every argument of a system function is a [`SystemParam`]. A parameter
//! declares its reads and writes once, when the system is initialized, and
//! is then fetched from the world on every invocation.
//!
//! | Parameter | Access |
//! |---|---|
//! | `Res<R>` / `Option<Res<R>>` | read resource |
//! | `ResMut<R>` / `Option<ResMut<R>>` | write resource |
//! | `Query<Q>` | per `Ref`/`Mut` in `Q` |
//! | `Commands` | none (deferred) |
//! | `EventReader<E>` | read `Events<E>` |
//! | `EventWriter<E>` | write `Events<E>` |
//! | `Local<T>` | none (system-owned) |
//! | `NonSend<T>` / `NonSendMut<T>` | main-thread resource, pins to main thread |

use std::any::type_name;
use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex};

use super::access::{Access, AccessKey};
use crate::ecs::{
    CommandBuffer, Event, Events, MainThreadResources, Query, QueryData, Resource, World,
};
use crate::error::{SystemError, SystemResult};

/// Name and access set of a system, filled in by its parameters.
#[derive(Clone, Debug)]
pub struct SystemMeta {
    name: &'static str,
    access: Access,
}

impl SystemMeta {
    /// Creates metadata with an empty access set.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            access: Access::new(),
        }
    }

    /// System name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared access.
    #[must_use]
    pub fn access(&self) -> &Access {
        &self.access
    }

    /// Declared access, for parameters registering themselves.
    pub fn access_mut(&mut self) -> &mut Access {
        &mut self.access
    }
}

/// Everything a system may borrow while it runs.
pub struct SystemContext<'w> {
    world: &'w World,
    commands: &'w Mutex<CommandBuffer>,
    main_thread: Option<&'w MainThreadResources>,
    system: &'w str,
}

impl<'w> SystemContext<'w> {
    /// Builds a context. `main_thread` is only provided on the main thread.
    #[must_use]
    pub fn new(
        world: &'w World,
        commands: &'w Mutex<CommandBuffer>,
        main_thread: Option<&'w MainThreadResources>,
        system: &'w str,
    ) -> Self {
        Self {
            world,
            commands,
            main_thread,
            system,
        }
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &'w World {
        self.world
    }

    /// Name of the system being resolved.
    #[must_use]
    pub fn system(&self) -> &'w str {
        self.system
    }

    /// Same context, reporting under another system name.
    #[must_use]
    pub fn renamed(&self, system: &'w str) -> Self {
        Self { system, ..*self }
    }

    fn missing<R>(&self) -> SystemError {
        SystemError::MissingResource {
            system: self.system.to_owned(),
            resource: type_name::<R>(),
        }
    }

    fn main_thread_unavailable<R>(&self) -> SystemError {
        SystemError::MainThreadResourceUnavailable {
            system: self.system.to_owned(),
            resource: type_name::<R>(),
        }
    }
}

/// A value a system can take as an argument.
pub trait SystemParam: Sized {
    /// Per-system state kept between invocations.
    type State: Send + Sync + 'static;
    /// The parameter as seen by the system for one invocation.
    type Item<'w>;

    /// Registers access and prepares the world. Runs once per system.
    fn init_state(world: &mut World, meta: &mut SystemMeta) -> Self::State;

    /// Borrows the parameter for one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError`] when a required resource is missing.
    fn fetch<'w>(state: &'w mut Self::State, ctx: &SystemContext<'w>)
        -> SystemResult<Self::Item<'w>>;
}

/// Shorthand for the item type of a parameter.
pub type SystemParamItem<'w, P> = <P as SystemParam>::Item<'w>;

// =============================================================================
// Resources
// =============================================================================

/// Shared borrow of resource `R`.
pub struct Res<'w, R: Resource> {
    value: MappedRwLockReadGuard<'w, R>,
}

impl<R: Resource> Deref for Res<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.value
    }
}

impl<R: Resource + fmt::Debug> fmt::Debug for Res<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Res").field(&*self.value).finish()
    }
}

impl<'a, R: Resource> SystemParam for Res<'a, R> {
    type State = ();
    type Item<'w> = Res<'w, R>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_read(AccessKey::resource::<R>());
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<Res<'w, R>> {
        ctx.world
            .resources()
            .get::<R>()
            .map(|value| Res { value })
            .ok_or_else(|| ctx.missing::<R>())
    }
}

impl<'a, R: Resource> SystemParam for Option<Res<'a, R>> {
    type State = ();
    type Item<'w> = Option<Res<'w, R>>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_read(AccessKey::resource::<R>());
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<Option<Res<'w, R>>> {
        Ok(ctx.world.resources().get::<R>().map(|value| Res { value }))
    }
}

/// Exclusive borrow of resource `R`.
pub struct ResMut<'w, R: Resource> {
    value: MappedRwLockWriteGuard<'w, R>,
}

impl<R: Resource> Deref for ResMut<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.value
    }
}

impl<R: Resource> DerefMut for ResMut<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.value
    }
}

impl<'a, R: Resource> SystemParam for ResMut<'a, R> {
    type State = ();
    type Item<'w> = ResMut<'w, R>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_write(AccessKey::resource::<R>());
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<ResMut<'w, R>> {
        ctx.world
            .resources()
            .write::<R>()
            .map(|value| ResMut { value })
            .ok_or_else(|| ctx.missing::<R>())
    }
}

impl<'a, R: Resource> SystemParam for Option<ResMut<'a, R>> {
    type State = ();
    type Item<'w> = Option<ResMut<'w, R>>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_write(AccessKey::resource::<R>());
    }

    fn fetch<'w>(
        _state: &'w mut (),
        ctx: &SystemContext<'w>,
    ) -> SystemResult<Option<ResMut<'w, R>>> {
        Ok(ctx.world.resources().write::<R>().map(|value| ResMut { value }))
    }
}

// =============================================================================
// Main-thread resources
// =============================================================================

/// Shared borrow of a main-thread resource.
pub struct NonSend<'w, T: 'static> {
    value: std::cell::Ref<'w, T>,
}

impl<T: 'static> Deref for NonSend<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<'a, T: 'static> SystemParam for NonSend<'a, T> {
    type State = ();
    type Item<'w> = NonSend<'w, T>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_read(AccessKey::non_send::<T>());
        meta.access_mut().set_main_thread();
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<NonSend<'w, T>> {
        ctx.main_thread
            .and_then(MainThreadResources::get::<T>)
            .map(|value| NonSend { value })
            .ok_or_else(|| ctx.main_thread_unavailable::<T>())
    }
}

/// Exclusive borrow of a main-thread resource.
pub struct NonSendMut<'w, T: 'static> {
    value: std::cell::RefMut<'w, T>,
}

impl<T: 'static> Deref for NonSendMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: 'static> DerefMut for NonSendMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<'a, T: 'static> SystemParam for NonSendMut<'a, T> {
    type State = ();
    type Item<'w> = NonSendMut<'w, T>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_write(AccessKey::non_send::<T>());
        meta.access_mut().set_main_thread();
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<NonSendMut<'w, T>> {
        ctx.main_thread
            .and_then(MainThreadResources::get_mut::<T>)
            .map(|value| NonSendMut { value })
            .ok_or_else(|| ctx.main_thread_unavailable::<T>())
    }
}

// =============================================================================
// Local, Commands, Query
// =============================================================================

/// Value owned by one system and kept across invocations.
#[derive(Debug)]
pub struct Local<'w, T>(&'w mut T);

impl<T> Deref for Local<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.0
    }
}

impl<T> DerefMut for Local<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.0
    }
}

impl<'a, T: Default + Send + Sync + 'static> SystemParam for Local<'a, T> {
    type State = T;
    type Item<'w> = Local<'w, T>;

    fn init_state(_world: &mut World, _meta: &mut SystemMeta) -> T {
        T::default()
    }

    fn fetch<'w>(state: &'w mut T, _ctx: &SystemContext<'w>) -> SystemResult<Local<'w, T>> {
        Ok(Local(state))
    }
}

/// Deferred world mutations from inside a system.
///
/// Commands queue locally and are handed to the worker's buffer when the
/// parameter is dropped; the scheduler applies them at the next stage
/// boundary.
pub struct Commands<'w> {
    queue: CommandBuffer,
    sink: &'w Mutex<CommandBuffer>,
}

impl<'w> Commands<'w> {
    /// Creates commands flushing into `sink` on drop.
    #[must_use]
    pub fn new(sink: &'w Mutex<CommandBuffer>) -> Self {
        Self {
            queue: CommandBuffer::new(),
            sink,
        }
    }
}

impl Deref for Commands<'_> {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        &self.queue
    }
}

impl DerefMut for Commands<'_> {
    fn deref_mut(&mut self) -> &mut CommandBuffer {
        &mut self.queue
    }
}

impl Drop for Commands<'_> {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            self.sink.lock().append(&mut self.queue);
        }
    }
}

impl<'a> SystemParam for Commands<'a> {
    type State = ();
    type Item<'w> = Commands<'w>;

    fn init_state(_world: &mut World, _meta: &mut SystemMeta) {}

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<Commands<'w>> {
        Ok(Commands::new(ctx.commands))
    }
}

impl<'a, Q: QueryData> SystemParam for Query<'a, Q> {
    type State = ();
    type Item<'w> = Query<'w, Q>;

    fn init_state(world: &mut World, meta: &mut SystemMeta) {
        Q::init(world);
        Q::access(meta.access_mut());
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<Query<'w, Q>> {
        Ok(Query::new(ctx.world))
    }
}

// =============================================================================
// Events
// =============================================================================

/// Reads events of type `E` not yet seen by this system.
pub struct EventReader<'w, E: Event> {
    events: MappedRwLockReadGuard<'w, Events<E>>,
    cursor: &'w mut usize,
}

impl<E: Event> EventReader<'_, E> {
    /// Unread events, oldest first. Marks them read.
    pub fn read(&mut self) -> impl Iterator<Item = &E> + '_ {
        let start = *self.cursor;
        *self.cursor = self.events.next_id();
        self.events.since(start)
    }

    /// Number of unread events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.since(*self.cursor).count()
    }

    /// Returns `true` when there is nothing to read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.since(*self.cursor).next().is_none()
    }

    /// Marks every pending event read.
    pub fn clear(&mut self) {
        *self.cursor = self.events.next_id();
    }
}

impl<'a, E: Event> SystemParam for EventReader<'a, E> {
    type State = usize;
    type Item<'w> = EventReader<'w, E>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) -> usize {
        meta.access_mut().add_read(AccessKey::resource::<Events<E>>());
        0
    }

    fn fetch<'w>(state: &'w mut usize, ctx: &SystemContext<'w>) -> SystemResult<EventReader<'w, E>> {
        let events = ctx
            .world
            .resources()
            .get::<Events<E>>()
            .ok_or_else(|| ctx.missing::<Events<E>>())?;
        Ok(EventReader {
            events,
            cursor: state,
        })
    }
}

/// Sends events of type `E`.
pub struct EventWriter<'w, E: Event> {
    events: MappedRwLockWriteGuard<'w, Events<E>>,
}

impl<E: Event> EventWriter<'_, E> {
    /// Sends one event.
    pub fn send(&mut self, event: E) {
        self.events.send(event);
    }

    /// Sends every event of `events`.
    pub fn send_batch(&mut self, events: impl IntoIterator<Item = E>) {
        self.events.send_batch(events);
    }
}

impl<'a, E: Event> SystemParam for EventWriter<'a, E> {
    type State = ();
    type Item<'w> = EventWriter<'w, E>;

    fn init_state(_world: &mut World, meta: &mut SystemMeta) {
        meta.access_mut().add_write(AccessKey::resource::<Events<E>>());
    }

    fn fetch<'w>(_state: &'w mut (), ctx: &SystemContext<'w>) -> SystemResult<EventWriter<'w, E>> {
        ctx.world
            .resources()
            .write::<Events<E>>()
            .map(|events| EventWriter { events })
            .ok_or_else(|| ctx.missing::<Events<E>>())
    }
}

// =============================================================================
// Tuples
// =============================================================================

macro_rules! impl_system_param_tuple {
    ($($P:ident),*) => {
        #[allow(non_snake_case, unused_variables, clippy::unused_unit)]
        impl<$($P: SystemParam),*> SystemParam for ($($P,)*) {
            type State = ($($P::State,)*);
            type Item<'w> = ($($P::Item<'w>,)*);

            fn init_state(world: &mut World, meta: &mut SystemMeta) -> Self::State {
                ($($P::init_state(world, meta),)*)
            }

            fn fetch<'w>(
                state: &'w mut Self::State,
                ctx: &SystemContext<'w>,
            ) -> SystemResult<Self::Item<'w>> {
                let ($($P,)*) = state;
                Ok(($($P::fetch($P, ctx)?,)*))
            }
        }
    };
}

impl_system_param_tuple!();
impl_system_param_tuple!(P0);
impl_system_param_tuple!(P0, P1);
impl_system_param_tuple!(P0, P1, P2);
impl_system_param_tuple!(P0, P1, P2, P3);
impl_system_param_tuple!(P0, P1, P2, P3, P4);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5, P6);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5, P6, P7);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5, P6, P7, P8);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5, P6, P7, P8, P9);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5, P6, P7, P8, P9, P10);
impl_system_param_tuple!(P0, P1, P2, P3, P4, P5, P6, P7, P8, P9, P10, P11);
