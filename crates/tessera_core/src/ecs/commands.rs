//! # Command Buffers
//!
//! Deferred structural mutation. Systems cannot spawn, despawn, insert or
//! remove while they run; they queue commands instead and the scheduler
//! applies the queues between stages.
//!
//! ## Placeholders
//!
//! `spawn` returns an [`EntityHandle::Placeholder`]. The real [`Entity`] is
//! only created when the buffer is applied. Placeholder numbers come from a
//! process-wide counter, so buffers filled on different workers can be
//! merged without collisions. Resolved placeholders are published in the
//! [`PlaceholderMap`] resource.

use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Bundle, Component, Entity, Resource, World};

static NEXT_PLACEHOLDER: AtomicU64 = AtomicU64::new(1);

/// Stand-in for an entity that does not exist until its buffer is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Placeholder(u64);

impl Placeholder {
    fn next() -> Self {
        Self(NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw placeholder number.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Target of a command: a live entity or a placeholder from `spawn`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityHandle {
    /// An entity that already exists.
    Real(Entity),
    /// An entity that will exist once its buffer is applied.
    Placeholder(Placeholder),
}

impl From<Entity> for EntityHandle {
    fn from(entity: Entity) -> Self {
        Self::Real(entity)
    }
}

impl From<Placeholder> for EntityHandle {
    fn from(placeholder: Placeholder) -> Self {
        Self::Placeholder(placeholder)
    }
}

/// Placeholder -> entity mappings produced by applied buffers.
///
/// Entries are pruned once their entity dies.
#[derive(Debug, Default)]
pub struct PlaceholderMap {
    resolved: HashMap<Placeholder, Entity>,
}

impl PlaceholderMap {
    /// Resolves a handle to a real entity, if it has been materialized.
    #[must_use]
    pub fn resolve(&self, handle: EntityHandle) -> Option<Entity> {
        match handle {
            EntityHandle::Real(entity) => Some(entity),
            EntityHandle::Placeholder(placeholder) => self.resolved.get(&placeholder).copied(),
        }
    }

    /// Number of tracked placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Returns `true` when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub(crate) fn retain(&mut self, mut alive: impl FnMut(Entity) -> bool) {
        self.resolved.retain(|_, entity| alive(*entity));
    }

    fn record(&mut self, placeholder: Placeholder, entity: Entity) {
        self.resolved.insert(placeholder, entity);
    }
}

type EntityOp = Box<dyn FnOnce(&mut World, Entity) + Send>;
type WorldOp = Box<dyn FnOnce(&mut World) + Send>;

enum Command {
    Spawn(Placeholder),
    Entity {
        target: EntityHandle,
        op: &'static str,
        apply: EntityOp,
    },
    Despawn(EntityHandle),
    World(WorldOp),
}

/// Outcome of [`CommandBuffer::apply`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Commands that changed the world.
    pub applied: usize,
    /// Commands dropped because their target was gone.
    pub dropped: usize,
}

/// Ordered queue of deferred world mutations.
#[derive(Default)]
pub struct CommandBuffer {
    queue: Vec<Command>,
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("len", &self.queue.len())
            .finish()
    }
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` when nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues creation of an entity with no components.
    pub fn spawn_empty(&mut self) -> EntityHandle {
        let placeholder = Placeholder::next();
        self.queue.push(Command::Spawn(placeholder));
        EntityHandle::Placeholder(placeholder)
    }

    /// Queues creation of an entity carrying `bundle`.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EntityHandle {
        let handle = self.spawn_empty();
        self.queue.push(Command::Entity {
            target: handle,
            op: type_name::<B>(),
            apply: Box::new(move |world, entity| bundle.insert_into(world, entity)),
        });
        handle
    }

    /// Queues insertion (or replacement) of a component.
    pub fn insert<T: Component>(&mut self, target: impl Into<EntityHandle>, value: T) {
        self.queue.push(Command::Entity {
            target: target.into(),
            op: type_name::<T>(),
            apply: Box::new(move |world, entity| {
                world.insert_component(entity, value);
            }),
        });
    }

    /// Queues removal of a component.
    pub fn remove<T: Component>(&mut self, target: impl Into<EntityHandle>) {
        self.queue.push(Command::Entity {
            target: target.into(),
            op: type_name::<T>(),
            apply: Box::new(|world, entity| {
                world.remove_component::<T>(entity);
            }),
        });
    }

    /// Queues destruction of an entity.
    pub fn despawn(&mut self, target: impl Into<EntityHandle>) {
        self.queue.push(Command::Despawn(target.into()));
    }

    /// Queues insertion of a resource.
    pub fn insert_resource<R: Resource>(&mut self, value: R) {
        self.queue.push(Command::World(Box::new(move |world| {
            world.insert_resource(value);
        })));
    }

    /// Queues removal of a resource.
    pub fn remove_resource<R: Resource>(&mut self) {
        self.queue.push(Command::World(Box::new(|world| {
            world.remove_resource::<R>();
        })));
    }

    /// Queues an arbitrary world mutation.
    pub fn add(&mut self, op: impl FnOnce(&mut World) + Send + 'static) {
        self.queue.push(Command::World(Box::new(op)));
    }

    /// Moves every command of `other` to the end of this buffer.
    pub fn append(&mut self, other: &mut CommandBuffer) {
        self.queue.append(&mut other.queue);
    }

    /// Applies every queued command in submission order and empties the buffer.
    ///
    /// Commands aimed at an entity despawned earlier in the same apply are
    /// dropped quietly. Commands aimed at any other dead entity or at an
    /// unknown placeholder are dropped with a warning.
    pub fn apply(&mut self, world: &mut World) -> ApplyStats {
        let mut stats = ApplyStats::default();
        if self.queue.is_empty() {
            return stats;
        }

        let mut spawned: HashMap<Placeholder, Entity> = HashMap::new();
        let mut despawned: HashSet<Entity> = HashSet::new();

        for command in self.queue.drain(..) {
            match command {
                Command::Spawn(placeholder) => {
                    let entity = world.create_entity();
                    spawned.insert(placeholder, entity);
                    if let Some(map) = world.get_resource_mut::<PlaceholderMap>() {
                        map.record(placeholder, entity);
                    }
                    stats.applied += 1;
                }
                Command::Entity { target, op, apply } => {
                    match resolve(world, &spawned, &despawned, target, op) {
                        Some(entity) => {
                            apply(world, entity);
                            stats.applied += 1;
                        }
                        None => stats.dropped += 1,
                    }
                }
                Command::Despawn(target) => {
                    match resolve(world, &spawned, &despawned, target, "despawn") {
                        Some(entity) => {
                            world.destroy_entity(entity);
                            despawned.insert(entity);
                            stats.applied += 1;
                        }
                        None => stats.dropped += 1,
                    }
                }
                Command::World(op) => {
                    op(world);
                    stats.applied += 1;
                }
            }
        }

        if stats.dropped > 0 {
            tracing::debug!(
                applied = stats.applied,
                dropped = stats.dropped,
                "command buffer applied with dropped commands"
            );
        }
        stats
    }
}

fn resolve(
    world: &World,
    spawned: &HashMap<Placeholder, Entity>,
    despawned: &HashSet<Entity>,
    target: EntityHandle,
    op: &'static str,
) -> Option<Entity> {
    let entity = match target {
        EntityHandle::Real(entity) => entity,
        EntityHandle::Placeholder(placeholder) => {
            let known = spawned.get(&placeholder).copied().or_else(|| {
                world
                    .get_resource::<PlaceholderMap>()
                    .and_then(|map| map.resolve(target))
            });
            match known {
                Some(entity) => entity,
                None => {
                    tracing::warn!(
                        placeholder = placeholder.id(),
                        op,
                        "command targets unknown placeholder, dropped"
                    );
                    return None;
                }
            }
        }
    };

    if world.is_alive(entity) {
        return Some(entity);
    }
    if despawned.contains(&entity) {
        tracing::trace!(%entity, op, "command follows despawn in same buffer, dropped");
    } else {
        tracing::warn!(%entity, op, "command targets dead entity, dropped");
    }
    None
}
