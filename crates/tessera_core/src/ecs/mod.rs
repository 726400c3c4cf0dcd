//! # Entity Component System
//!
//! Sparse-set ECS storage:
//! - One column per component type, keyed by `TypeId`
//! - Resources as type-keyed singletons
//! - Deferred structural changes through command buffers
//! - Double-buffered events

pub mod commands;
pub mod component;
pub mod entity;
pub mod event;
pub mod query;
pub mod resource;
pub mod storage;
pub mod world;

pub use commands::{ApplyStats, CommandBuffer, EntityHandle, Placeholder, PlaceholderMap};
pub use component::{Bundle, Component};
pub use entity::{AliveIter, Entity, EntityAllocator};
pub use event::{update_events, Event, Events};
pub use query::{
    Mut, Optional, Query, QueryData, QueryIter, QueryIterMut, ReadOnlyQueryData, Ref, With,
    Without,
};
pub use resource::{MainThreadResources, Resource, Resources};
pub use storage::Column;
pub use world::World;
