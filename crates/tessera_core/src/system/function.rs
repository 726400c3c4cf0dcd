//! # Function Systems
//!
//! Turns plain functions and closures into runnable systems.
//!
//! Any `FnMut(P0, .., Pn) -> Out` whose arguments are all
//! [`SystemParam`](super::SystemParam)s is a system, for up to twelve
//! arguments. The function's own type is its identity inside a schedule.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use super::access::Access;
use super::param::{SystemContext, SystemMeta, SystemParam, SystemParamItem};
use crate::ecs::World;
use crate::error::{SystemError, SystemResult};

/// Identity of a system: the `TypeId` of its function.
#[derive(Clone, Copy)]
pub struct SystemKey {
    id: TypeId,
    name: &'static str,
}

impl SystemKey {
    /// Key of function type `F`.
    #[must_use]
    pub fn of<F: 'static>() -> Self {
        Self {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
        }
    }

    /// Key of the function `value`.
    #[must_use]
    pub fn of_val<F: 'static>(_value: &F) -> Self {
        Self::of::<F>()
    }

    /// Full type name of the function.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for SystemKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SystemKey {}

impl Hash for SystemKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemKey({})", self.name)
    }
}

/// A runnable unit of work.
pub trait System: Send + Sync + 'static {
    /// Value returned by one invocation.
    type Out;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Identity inside a schedule.
    fn key(&self) -> SystemKey;

    /// Creates parameter state and registers access. Idempotent.
    fn initialize(&mut self, world: &mut World);

    /// Returns `true` once [`System::initialize`] has run.
    fn is_initialized(&self) -> bool;

    /// Declared reads and writes. Empty before initialization.
    fn access(&self) -> &Access;

    /// Runs the system once.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError`] when a parameter cannot be resolved.
    fn run(&mut self, ctx: &SystemContext<'_>) -> SystemResult<Self::Out>;
}

/// A boxed system.
pub type BoxedSystem<Out = ()> = Box<dyn System<Out = Out>>;

/// Conversion into a [`System`].
pub trait IntoSystem<Out, Marker>: Sized + Send + Sync + 'static {
    /// The resulting system type.
    type System: System<Out = Out>;

    /// Performs the conversion.
    fn into_system(this: Self) -> Self::System;
}

/// Functions whose arguments are all system parameters.
///
/// `Marker` is the function pointer type `fn(P0, ..) -> Out`; it only keeps
/// the blanket implementations apart.
pub trait SystemParamFunction<Marker>: Send + Sync + 'static {
    /// Parameters as one tuple.
    type Param: SystemParam;
    /// Return type.
    type Out;

    /// Calls the function with resolved parameters.
    fn run(&mut self, param: SystemParamItem<'_, Self::Param>) -> Self::Out;
}

macro_rules! impl_system_param_function {
    ($($P:ident),*) => {
        #[allow(non_snake_case)]
        impl<Out, Func, $($P: SystemParam),*> SystemParamFunction<fn($($P,)*) -> Out> for Func
        where
            Func: Send + Sync + 'static,
            for<'a> &'a mut Func:
                FnMut($($P),*) -> Out + FnMut($(SystemParamItem<'_, $P>),*) -> Out,
            Out: 'static,
        {
            type Param = ($($P,)*);
            type Out = Out;

            fn run(&mut self, param: SystemParamItem<'_, ($($P,)*)>) -> Out {
                // Pins the call to the `SystemParamItem` signature.
                fn call_inner<Out, $($P,)*>(mut f: impl FnMut($($P,)*) -> Out, $($P: $P,)*) -> Out {
                    f($($P,)*)
                }
                let ($($P,)*) = param;
                call_inner(self, $($P),*)
            }
        }
    };
}

impl_system_param_function!();
impl_system_param_function!(P0);
impl_system_param_function!(P0, P1);
impl_system_param_function!(P0, P1, P2);
impl_system_param_function!(P0, P1, P2, P3);
impl_system_param_function!(P0, P1, P2, P3, P4);
impl_system_param_function!(P0, P1, P2, P3, P4, P5);
impl_system_param_function!(P0, P1, P2, P3, P4, P5, P6);
impl_system_param_function!(P0, P1, P2, P3, P4, P5, P6, P7);
impl_system_param_function!(P0, P1, P2, P3, P4, P5, P6, P7, P8);
impl_system_param_function!(P0, P1, P2, P3, P4, P5, P6, P7, P8, P9);
impl_system_param_function!(P0, P1, P2, P3, P4, P5, P6, P7, P8, P9, P10);
impl_system_param_function!(P0, P1, P2, P3, P4, P5, P6, P7, P8, P9, P10, P11);

/// A system backed by a function.
pub struct FunctionSystem<Marker, F>
where
    F: SystemParamFunction<Marker>,
{
    func: F,
    state: Option<<F::Param as SystemParam>::State>,
    meta: SystemMeta,
    _marker: PhantomData<fn() -> Marker>,
}

impl<Marker, F> FunctionSystem<Marker, F>
where
    F: SystemParamFunction<Marker>,
{
    /// Wraps `func`. Parameter state is created by [`System::initialize`].
    pub fn new(func: F) -> Self {
        Self {
            func,
            state: None,
            meta: SystemMeta::new(type_name::<F>()),
            _marker: PhantomData,
        }
    }
}

impl<Marker, F> System for FunctionSystem<Marker, F>
where
    Marker: 'static,
    F: SystemParamFunction<Marker>,
{
    type Out = F::Out;

    fn name(&self) -> &'static str {
        self.meta.name()
    }

    fn key(&self) -> SystemKey {
        SystemKey::of::<F>()
    }

    fn initialize(&mut self, world: &mut World) {
        if self.state.is_none() {
            self.state = Some(<F::Param as SystemParam>::init_state(world, &mut self.meta));
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn access(&self) -> &Access {
        self.meta.access()
    }

    fn run(&mut self, ctx: &SystemContext<'_>) -> SystemResult<F::Out> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| SystemError::Uninitialized {
                system: self.meta.name().to_owned(),
            })?;
        let params = <F::Param as SystemParam>::fetch(state, ctx)?;
        Ok(self.func.run(params))
    }
}

impl<Marker, F> IntoSystem<F::Out, Marker> for F
where
    Marker: 'static,
    F: SystemParamFunction<Marker>,
{
    type System = FunctionSystem<Marker, F>;

    fn into_system(this: Self) -> Self::System {
        FunctionSystem::new(this)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::ecs::{CommandBuffer, Mut, Query, Ref};
    use crate::system::param::{Commands, Local, Res, ResMut};

    struct Score(u32);
    struct Speed(u32);

    fn add_speed(mut score: ResMut<Score>, speed: Res<Speed>) {
        score.0 += speed.0;
    }

    fn run_once<S: System>(system: &mut S, world: &mut World) -> SystemResult<S::Out> {
        system.initialize(world);
        let sink = Mutex::new(CommandBuffer::new());
        let out = {
            let ctx = SystemContext::new(world, &sink, None, system.name());
            system.run(&ctx)
        };
        sink.lock().apply(world);
        out
    }

    #[test]
    fn test_function_system_runs() {
        let mut world = World::new();
        world.insert_resource(Score(1));
        world.insert_resource(Speed(2));
        let mut system = IntoSystem::into_system(add_speed);
        run_once(&mut system, &mut world).unwrap();
        run_once(&mut system, &mut world).unwrap();
        assert_eq!(world.get_resource::<Score>().map(|s| s.0), Some(5));
    }

    #[test]
    fn test_access_recorded() {
        let mut world = World::new();
        let mut system = IntoSystem::into_system(add_speed);
        assert!(system.access().is_read_only());
        system.initialize(&mut world);
        assert!(!system.access().is_read_only());
        assert!(system.access().self_conflicts().is_empty());
        assert_eq!(system.key(), SystemKey::of_val(&add_speed));
    }

    #[test]
    fn test_missing_resource_is_error() {
        let mut world = World::new();
        world.insert_resource(Score(0));
        let mut system = IntoSystem::into_system(add_speed);
        let err = run_once(&mut system, &mut world).unwrap_err();
        assert!(matches!(err, SystemError::MissingResource { resource, .. } if resource.contains("Speed")));
    }

    #[test]
    fn test_local_persists_between_runs() {
        let mut world = World::new();
        let mut system = IntoSystem::into_system(|mut calls: Local<u32>| {
            *calls += 1;
            *calls
        });
        assert_eq!(run_once(&mut system, &mut world).unwrap(), 1);
        assert_eq!(run_once(&mut system, &mut world).unwrap(), 2);
    }

    #[test]
    fn test_commands_and_queries() {
        let mut world = World::new();
        let mut spawner = IntoSystem::into_system(|mut commands: Commands| {
            commands.spawn((Score(1),));
        });
        run_once(&mut spawner, &mut world).unwrap();
        assert_eq!(world.entity_count(), 1);

        let mut doubler = IntoSystem::into_system(|mut query: Query<Mut<Score>>| {
            for score in query.iter_mut() {
                score.0 *= 2;
            }
        });
        run_once(&mut doubler, &mut world).unwrap();

        let mut reader = IntoSystem::into_system(|query: Query<Ref<Score>>| {
            query.iter().map(|s| s.0).sum::<u32>()
        });
        assert_eq!(run_once(&mut reader, &mut world).unwrap(), 2);
    }

    #[test]
    fn test_intra_system_conflict_detected() {
        let mut world = World::new();
        let mut system =
            IntoSystem::into_system(|_a: Query<Mut<Score>>, _b: Query<Ref<Score>>| {});
        system.initialize(&mut world);
        assert_eq!(system.access().self_conflicts().len(), 1);
    }
}
