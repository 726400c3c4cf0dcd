//! # Plugins
//!
//! Reusable bundles of resources, events and systems.

use std::any::type_name;

use crate::app::App;

/// Configures an [`App`].
///
/// ```rust,ignore
/// struct PhysicsPlugin;
///
/// impl Plugin for PhysicsPlugin {
///     fn build(&self, app: &mut App) {
///         app.init_resource::<Gravity>()
///             .add_systems(FIXED_UPDATE, integrate);
///     }
/// }
/// ```
pub trait Plugin: 'static {
    /// Registers everything the plugin provides.
    fn build(&self, app: &mut App);

    /// Name used in logs.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// A plugin or a tuple of plugins.
pub trait Plugins<Marker> {
    /// Builds every plugin into `app`, left to right.
    fn add_to_app(self, app: &mut App);
}

#[doc(hidden)]
pub struct IsPlugin;

#[doc(hidden)]
pub struct IsPluginTuple;

impl<P: Plugin> Plugins<IsPlugin> for P {
    fn add_to_app(self, app: &mut App) {
        tracing::debug!(plugin = self.name(), "building plugin");
        self.build(app);
    }
}

macro_rules! impl_plugins_tuple {
    ($(($P:ident, $M:ident)),+) => {
        #[allow(non_snake_case)]
        impl<$($P, $M),+> Plugins<(IsPluginTuple, $($M,)+)> for ($($P,)+)
        where
            $($P: Plugins<$M>),+
        {
            fn add_to_app(self, app: &mut App) {
                let ($($P,)+) = self;
                $($P.add_to_app(app);)+
            }
        }
    };
}

impl_plugins_tuple!((P0, M0));
impl_plugins_tuple!((P0, M0), (P1, M1));
impl_plugins_tuple!((P0, M0), (P1, M1), (P2, M2));
impl_plugins_tuple!((P0, M0), (P1, M1), (P2, M2), (P3, M3));
impl_plugins_tuple!((P0, M0), (P1, M1), (P2, M2), (P3, M3), (P4, M4));
impl_plugins_tuple!((P0, M0), (P1, M1), (P2, M2), (P3, M3), (P4, M4), (P5, M5));
impl_plugins_tuple!((P0, M0), (P1, M1), (P2, M2), (P3, M3), (P4, M4), (P5, M5), (P6, M6));
impl_plugins_tuple!(
    (P0, M0), (P1, M1), (P2, M2), (P3, M3), (P4, M4), (P5, M5), (P6, M6), (P7, M7)
);
