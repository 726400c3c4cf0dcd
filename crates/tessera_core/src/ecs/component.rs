//! # Component Definitions
//!
//! Any `Send + Sync + 'static` type is a component. There is nothing to
//! derive; the type itself keys its column in the world.

use super::{Entity, World};

/// Marker trait for component types.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// A group of components inserted together.
///
/// Implemented for tuples of up to eight components. A single component is
/// written as a one-element tuple: `(Position::default(),)`.
pub trait Bundle: Send + 'static {
    /// Inserts every component of the bundle on `entity`.
    fn insert_into(self, world: &mut World, entity: Entity);
}

macro_rules! impl_bundle {
    ($($T:ident),+) => {
        impl<$($T: Component),+> Bundle for ($($T,)+) {
            #[allow(non_snake_case)]
            fn insert_into(self, world: &mut World, entity: Entity) {
                let ($($T,)+) = self;
                $(world.insert_component(entity, $T);)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
