//! # System and Set Configuration
//!
//! Builder methods attached to systems, tuples of systems and set markers
//! before they are handed to a schedule.
//!
//! ```rust,ignore
//! schedule.add_systems((spawn, steer.after(spawn), draw.run_if(visible)).chain());
//! schedule.configure_sets((Input, Simulation, Presentation).chain());
//! ```

use super::condition::Condition;
use super::label::{IntoLabel, Label, SetKey, SystemSet};
use crate::system::{BoxedSystem, IntoSystem, System, SystemKey};

/// One system plus its scheduling metadata.
pub struct SystemConfig {
    pub(crate) system: BoxedSystem,
    pub(crate) key: SystemKey,
    pub(crate) after: Vec<Label>,
    pub(crate) before: Vec<Label>,
    pub(crate) sets: Vec<SetKey>,
    pub(crate) condition: Option<Condition>,
    pub(crate) main_thread: bool,
}

impl SystemConfig {
    fn new<M>(system: impl IntoSystem<(), M>) -> Self {
        let system = IntoSystem::into_system(system);
        Self {
            key: system.key(),
            system: Box::new(system),
            after: Vec::new(),
            before: Vec::new(),
            sets: Vec::new(),
            condition: None,
            main_thread: false,
        }
    }

    /// Identity of the configured system.
    #[must_use]
    pub fn key(&self) -> SystemKey {
        self.key
    }
}

/// An ordered group of system configurations.
pub struct SystemConfigs {
    pub(crate) configs: Vec<SystemConfig>,
}

impl SystemConfigs {
    fn each(mut self, mut apply: impl FnMut(&mut SystemConfig)) -> Self {
        for config in &mut self.configs {
            apply(config);
        }
        self
    }

    /// Number of systems in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns `true` if the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Anything that can be added to a schedule.
pub trait IntoSystemConfigs<Marker>: Sized {
    /// Converts into configurations.
    fn into_configs(self) -> SystemConfigs;

    /// Runs after `target` (a system or a set).
    fn after<M>(self, target: impl IntoLabel<M>) -> SystemConfigs {
        let label = target.into_label();
        self.into_configs().each(|config| config.after.push(label))
    }

    /// Runs before `target` (a system or a set).
    fn before<M>(self, target: impl IntoLabel<M>) -> SystemConfigs {
        let label = target.into_label();
        self.into_configs().each(|config| config.before.push(label))
    }

    /// Adds membership in `set`.
    fn in_set<S: SystemSet>(self, _set: S) -> SystemConfigs {
        let key = SetKey::of::<S>();
        self.into_configs().each(|config| config.sets.push(key))
    }

    /// Replaces the run condition.
    fn run_if<M>(self, condition: impl IntoSystem<bool, M> + Clone) -> SystemConfigs {
        self.into_configs().each(|config| {
            config.condition = Some(Condition::from_system(condition.clone()));
        })
    }

    /// Replaces the run condition with its negation.
    fn run_unless<M>(self, condition: impl IntoSystem<bool, M> + Clone) -> SystemConfigs {
        self.into_configs().each(|config| {
            config.condition = Some(Condition::from_system(condition.clone()).not());
        })
    }

    /// Ands `condition` onto the current one (`true` if none).
    fn run_and<M>(self, condition: impl IntoSystem<bool, M> + Clone) -> SystemConfigs {
        self.into_configs().each(|config| {
            let current = config.condition.take().unwrap_or(Condition::True);
            config.condition = Some(current.and(Condition::from_system(condition.clone())));
        })
    }

    /// Ors `condition` onto the current one (`true` if none).
    fn run_or<M>(self, condition: impl IntoSystem<bool, M> + Clone) -> SystemConfigs {
        self.into_configs().each(|config| {
            let current = config.condition.take().unwrap_or(Condition::True);
            config.condition = Some(current.or(Condition::from_system(condition.clone())));
        })
    }

    /// Orders the group so each system runs after the previous one.
    fn chain(self) -> SystemConfigs {
        let mut configs = self.into_configs();
        let keys: Vec<SystemKey> = configs.configs.iter().map(|config| config.key).collect();
        for (config, previous) in configs.configs.iter_mut().skip(1).zip(keys) {
            config.after.push(Label::System(previous));
        }
        configs
    }

    /// Pins every system of the group to the main thread.
    fn on_main_thread(self) -> SystemConfigs {
        self.into_configs().each(|config| config.main_thread = true)
    }
}

#[doc(hidden)]
pub struct IsFunction;

#[doc(hidden)]
pub struct IsTuple;

impl<F, M> IntoSystemConfigs<(IsFunction, M)> for F
where
    F: IntoSystem<(), M>,
{
    fn into_configs(self) -> SystemConfigs {
        SystemConfigs {
            configs: vec![SystemConfig::new(self)],
        }
    }
}

impl IntoSystemConfigs<()> for SystemConfigs {
    fn into_configs(self) -> SystemConfigs {
        self
    }
}

macro_rules! impl_into_system_configs {
    ($(($S:ident, $M:ident)),+) => {
        #[allow(non_snake_case)]
        impl<$($S, $M),+> IntoSystemConfigs<(IsTuple, $($M,)+)> for ($($S,)+)
        where
            $($S: IntoSystemConfigs<$M>),+
        {
            fn into_configs(self) -> SystemConfigs {
                let ($($S,)+) = self;
                let mut configs = Vec::new();
                $(configs.extend($S.into_configs().configs);)+
                SystemConfigs { configs }
            }
        }
    };
}

impl_into_system_configs!((S0, M0));
impl_into_system_configs!((S0, M0), (S1, M1));
impl_into_system_configs!((S0, M0), (S1, M1), (S2, M2));
impl_into_system_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3));
impl_into_system_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4));
impl_into_system_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5));
impl_into_system_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6));
impl_into_system_configs!(
    (S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6), (S7, M7)
);
impl_into_system_configs!(
    (S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6), (S7, M7),
    (S8, M8)
);
impl_into_system_configs!(
    (S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6), (S7, M7),
    (S8, M8), (S9, M9)
);
impl_into_system_configs!(
    (S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6), (S7, M7),
    (S8, M8), (S9, M9), (S10, M10)
);
impl_into_system_configs!(
    (S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6), (S7, M7),
    (S8, M8), (S9, M9), (S10, M10), (S11, M11)
);

// =============================================================================
// Sets
// =============================================================================

/// Ordering of one set relative to other sets.
#[derive(Debug)]
pub struct SetConfig {
    pub(crate) key: SetKey,
    pub(crate) before: Vec<SetKey>,
    pub(crate) after: Vec<SetKey>,
}

/// An ordered group of set configurations.
#[derive(Debug)]
pub struct SetConfigs {
    pub(crate) configs: Vec<SetConfig>,
}

impl SetConfigs {
    fn each(mut self, mut apply: impl FnMut(&mut SetConfig)) -> Self {
        for config in &mut self.configs {
            apply(config);
        }
        self
    }
}

/// Anything that can be passed to `configure_sets`.
pub trait IntoSetConfigs<Marker>: Sized {
    /// Converts into configurations.
    fn into_set_configs(self) -> SetConfigs;

    /// Every member runs before every member of `set`.
    fn before<S: SystemSet>(self, _set: S) -> SetConfigs {
        let key = SetKey::of::<S>();
        self.into_set_configs().each(|config| config.before.push(key))
    }

    /// Every member runs after every member of `set`.
    fn after<S: SystemSet>(self, _set: S) -> SetConfigs {
        let key = SetKey::of::<S>();
        self.into_set_configs().each(|config| config.after.push(key))
    }

    /// Orders the sets so each runs after the previous one.
    fn chain(self) -> SetConfigs {
        let mut configs = self.into_set_configs();
        let keys: Vec<SetKey> = configs.configs.iter().map(|config| config.key).collect();
        for (config, previous) in configs.configs.iter_mut().skip(1).zip(keys) {
            config.after.push(previous);
        }
        configs
    }
}

#[doc(hidden)]
pub struct IsSetMarker;

impl<S: SystemSet> IntoSetConfigs<IsSetMarker> for S {
    fn into_set_configs(self) -> SetConfigs {
        SetConfigs {
            configs: vec![SetConfig {
                key: SetKey::of::<S>(),
                before: Vec::new(),
                after: Vec::new(),
            }],
        }
    }
}

impl IntoSetConfigs<()> for SetConfigs {
    fn into_set_configs(self) -> SetConfigs {
        self
    }
}

macro_rules! impl_into_set_configs {
    ($(($S:ident, $M:ident)),+) => {
        #[allow(non_snake_case)]
        impl<$($S, $M),+> IntoSetConfigs<(IsTuple, $($M,)+)> for ($($S,)+)
        where
            $($S: IntoSetConfigs<$M>),+
        {
            fn into_set_configs(self) -> SetConfigs {
                let ($($S,)+) = self;
                let mut configs = Vec::new();
                $(configs.extend($S.into_set_configs().configs);)+
                SetConfigs { configs }
            }
        }
    };
}

impl_into_set_configs!((S0, M0));
impl_into_set_configs!((S0, M0), (S1, M1));
impl_into_set_configs!((S0, M0), (S1, M1), (S2, M2));
impl_into_set_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3));
impl_into_set_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4));
impl_into_set_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5));
impl_into_set_configs!((S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6));
impl_into_set_configs!(
    (S0, M0), (S1, M1), (S2, M2), (S3, M3), (S4, M4), (S5, M5), (S6, M6), (S7, M7)
);

#[cfg(test)]
mod tests {
    use super::*;

    struct Physics;
    impl SystemSet for Physics {}

    struct Render;
    impl SystemSet for Render {}

    fn a() {}
    fn b() {}
    fn c() {}
    fn visible() -> bool {
        true
    }

    #[test]
    fn test_chain_links_neighbours() {
        let configs = (a, b, c).chain().into_configs();
        assert_eq!(configs.len(), 3);
        assert!(configs.configs[0].after.is_empty());
        assert_eq!(configs.configs[1].after, vec![Label::System(SystemKey::of_val(&a))]);
        assert_eq!(configs.configs[2].after, vec![Label::System(SystemKey::of_val(&b))]);
    }

    #[test]
    fn test_builders_apply_to_every_member() {
        let configs = (a, b).in_set(Physics).before(Render).run_if(visible).into_configs();
        for config in &configs.configs {
            assert_eq!(config.sets, vec![SetKey::of::<Physics>()]);
            assert_eq!(config.before, vec![Label::Set(SetKey::of::<Render>())]);
            assert!(config.condition.is_some());
        }
    }

    #[test]
    fn test_run_and_starts_from_true() {
        let configs = a.run_and(visible).into_configs();
        assert!(matches!(configs.configs[0].condition, Some(Condition::And(ref left, _)) if matches!(**left, Condition::True)));
        let configs = a.run_if(visible).run_or(visible).into_configs();
        assert!(matches!(configs.configs[0].condition, Some(Condition::Or(..))));
    }

    #[test]
    fn test_set_chain() {
        let configs = (Physics, Render).chain().into_set_configs();
        assert_eq!(configs.configs[1].after, vec![SetKey::of::<Physics>()]);
        assert!(configs.configs[0].after.is_empty());
    }
}
