//! # Schedule
//!
//! A set of systems plus ordering constraints, compiled into stages.
//!
//! ## Stage formation
//!
//! Systems are sorted topologically (Kahn). Each round takes the ready set
//! in registration order and packs a stage:
//!
//! - A ready main-thread system forms a stage of its own.
//! - Otherwise ready systems join greedily while their access does not
//!   conflict with the stage built so far.
//!
//! Successors are released only after a stage is closed, so an ordering
//! edge always crosses a stage boundary. When no system is ready but some
//! remain, the remaining graph holds a cycle, which is reported by name.

use std::collections::{BTreeSet, HashMap};

use super::condition::Condition;
use super::config::{IntoSetConfigs, IntoSystemConfigs, SystemConfig};
use super::executor::Executor;
use super::label::{Label, SetKey};
use crate::ecs::{MainThreadResources, World};
use crate::error::{ScheduleError, ScheduleResult, SystemResult};
use crate::system::{Access, BoxedSystem, SystemContext, SystemKey};

/// How a stage is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// One system on the calling thread, with main-thread resources.
    MainThread,
    /// Mutually compatible systems on the worker pool.
    Parallel,
}

/// A group of systems that run together.
#[derive(Clone, Debug)]
pub struct Stage {
    kind: StageKind,
    nodes: Vec<usize>,
}

impl Stage {
    /// Execution kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Registration indices of the members, ascending.
    #[must_use]
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the stage has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub(crate) struct SystemNode {
    system: BoxedSystem,
    after: Vec<Label>,
    before: Vec<Label>,
    sets: Vec<SetKey>,
    condition: Option<Condition>,
    main_thread: bool,
    access: Access,
    initialized: bool,
}

impl SystemNode {
    fn new(config: SystemConfig) -> Self {
        Self {
            system: config.system,
            after: config.after,
            before: config.before,
            sets: config.sets,
            condition: config.condition,
            main_thread: config.main_thread,
            access: Access::new(),
            initialized: false,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.system.name()
    }

    /// Evaluates the condition, then runs the system if it holds.
    pub(crate) fn run(&mut self, ctx: &SystemContext<'_>) -> SystemResult<()> {
        let _span = tracing::trace_span!("system", name = self.name()).entered();
        if let Some(condition) = self.condition.as_mut() {
            if !condition.evaluate(ctx)? {
                return Ok(());
            }
        }
        self.system.run(ctx)
    }
}

#[derive(Default)]
struct SetNode {
    before: Vec<SetKey>,
    after: Vec<SetKey>,
}

/// An ordered collection of systems.
pub struct Schedule {
    name: String,
    nodes: Vec<SystemNode>,
    index: HashMap<SystemKey, usize>,
    sets: HashMap<SetKey, SetNode>,
    set_order: Vec<SetKey>,
    stages: Vec<Stage>,
    dirty: bool,
    pending: Vec<ScheduleError>,
}

impl Schedule {
    /// Creates an empty schedule. `name` only appears in logs and errors.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
            sets: HashMap::new(),
            set_order: Vec::new(),
            stages: Vec::new(),
            dirty: true,
            pending: Vec::new(),
        }
    }

    /// Name of the schedule.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the schedule has no systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if the system is registered here.
    #[must_use]
    pub fn contains(&self, key: SystemKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Names of the systems in registration order.
    pub fn system_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.nodes.iter().map(SystemNode::name)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Adds systems with their constraints.
    ///
    /// A system already in the schedule is rejected; the error surfaces from
    /// the next [`Schedule::build`].
    pub fn add_systems<M>(&mut self, systems: impl IntoSystemConfigs<M>) -> &mut Self {
        for config in systems.into_configs().configs {
            if self.index.contains_key(&config.key) {
                tracing::warn!(schedule = %self.name, system = config.key.name(), "duplicate system rejected");
                self.pending.push(ScheduleError::DuplicateSystem {
                    schedule: self.name.clone(),
                    system: config.key.name().to_owned(),
                });
                continue;
            }
            for set in &config.sets {
                self.set_entry(*set);
            }
            self.index.insert(config.key, self.nodes.len());
            self.nodes.push(SystemNode::new(config));
        }
        self.dirty = true;
        self
    }

    /// Declares ordering between sets.
    pub fn configure_sets<M>(&mut self, sets: impl IntoSetConfigs<M>) -> &mut Self {
        for config in sets.into_set_configs().configs {
            let node = self.set_entry(config.key);
            node.before.extend(config.before);
            node.after.extend(config.after);
        }
        self.dirty = true;
        self
    }

    fn set_entry(&mut self, key: SetKey) -> &mut SetNode {
        if !self.sets.contains_key(&key) {
            self.set_order.push(key);
        }
        self.sets.entry(key).or_default()
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Initializes new systems and their conditions.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::DuplicateSystem`] for a rejected registration
    /// - [`ScheduleError::ConflictingAccess`] when a system aliases its own data
    /// - [`ScheduleError::ConditionWrites`] when a condition is not read-only
    pub fn initialize(&mut self, world: &mut World) -> ScheduleResult<()> {
        if let Some(error) = self.pending.first() {
            return Err(error.clone());
        }
        for node in self.nodes.iter_mut().filter(|node| !node.initialized) {
            node.system.initialize(world);
            if let Some(condition) = node.condition.as_mut() {
                condition.initialize(world);
            }

            let own = node.system.access();
            if let Some(key) = own.self_conflicts().first() {
                return Err(ScheduleError::ConflictingAccess {
                    schedule: self.name.clone(),
                    system: node.system.name().to_owned(),
                    target: key.to_string(),
                });
            }
            let mut access = own.clone();
            if let Some(condition) = &node.condition {
                let mut writer = None;
                condition.for_each_system(&mut |system| {
                    if writer.is_none() && !system.access().is_read_only() {
                        writer = Some(system.name());
                    }
                });
                if let Some(condition_name) = writer {
                    return Err(ScheduleError::ConditionWrites {
                        schedule: self.name.clone(),
                        system: node.system.name().to_owned(),
                        condition: condition_name.to_owned(),
                    });
                }
                condition.merge_access(&mut access);
            }
            if node.main_thread {
                access.set_main_thread();
            }
            node.access = access;
            node.initialized = true;
        }
        Ok(())
    }

    /// Initializes and, if anything changed, recomputes the stages.
    ///
    /// # Errors
    ///
    /// Everything [`Schedule::initialize`] reports, plus unknown ordering
    /// targets and dependency cycles.
    pub fn build(&mut self, world: &mut World) -> ScheduleResult<()> {
        self.initialize(world)?;
        if self.dirty {
            self.stages = self.sort()?;
            self.dirty = false;
            tracing::debug!(
                schedule = %self.name,
                systems = self.nodes.len(),
                stages = self.stages.len(),
                "schedule built"
            );
        }
        Ok(())
    }

    /// Stages from the last successful build.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Index of the stage holding `key`, if built.
    #[must_use]
    pub fn stage_of(&self, key: SystemKey) -> Option<usize> {
        let node = *self.index.get(&key)?;
        self.stages
            .iter()
            .position(|stage| stage.nodes.contains(&node))
    }

    /// Builds if needed, then runs every stage in order.
    ///
    /// Commands are applied after each stage. The first system failure
    /// stops the schedule after its stage has been flushed.
    ///
    /// # Errors
    ///
    /// Build errors and the first [`crate::error::SystemError`] raised.
    pub fn run(
        &mut self,
        world: &mut World,
        main_thread: &MainThreadResources,
        executor: &Executor,
    ) -> ScheduleResult<()> {
        self.build(world)?;
        let _span = tracing::debug_span!("schedule", name = %self.name).entered();
        executor.run_stages(&self.stages, &mut self.nodes, world, main_thread)
    }

    fn members(&self) -> HashMap<SetKey, Vec<usize>> {
        let mut members: HashMap<SetKey, Vec<usize>> = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            for set in &node.sets {
                members.entry(*set).or_default().push(index);
            }
        }
        members
    }

    fn resolve(
        &self,
        label: &Label,
        owner: &str,
        members: &HashMap<SetKey, Vec<usize>>,
    ) -> ScheduleResult<Vec<usize>> {
        match label {
            Label::System(key) => self
                .index
                .get(key)
                .map(|&index| vec![index])
                .ok_or_else(|| ScheduleError::UnknownSystem {
                    schedule: self.name.clone(),
                    system: owner.to_owned(),
                    target: key.name().to_owned(),
                }),
            Label::Set(key) => self.resolve_set(*key, owner, members),
        }
    }

    fn resolve_set(
        &self,
        key: SetKey,
        owner: &str,
        members: &HashMap<SetKey, Vec<usize>>,
    ) -> ScheduleResult<Vec<usize>> {
        if !self.sets.contains_key(&key) {
            return Err(ScheduleError::UnknownSet {
                schedule: self.name.clone(),
                owner: owner.to_owned(),
                set: key.name().to_owned(),
            });
        }
        Ok(members.get(&key).cloned().unwrap_or_default())
    }

    /// Successor sets indexed by node, self-edges skipped.
    fn edges(&self) -> ScheduleResult<Vec<BTreeSet<usize>>> {
        let members = self.members();
        let mut successors = vec![BTreeSet::new(); self.nodes.len()];
        let mut link = |from: usize, to: usize| {
            if from != to {
                successors[from].insert(to);
            }
        };

        for (index, node) in self.nodes.iter().enumerate() {
            for label in &node.after {
                for prior in self.resolve(label, node.name(), &members)? {
                    link(prior, index);
                }
            }
            for label in &node.before {
                for next in self.resolve(label, node.name(), &members)? {
                    link(index, next);
                }
            }
        }

        for key in &self.set_order {
            let Some(set) = self.sets.get(key) else {
                continue;
            };
            let own = members.get(key).map(Vec::as_slice).unwrap_or_default();
            for other in &set.before {
                for next in self.resolve_set(*other, key.name(), &members)? {
                    for &from in own {
                        link(from, next);
                    }
                }
            }
            for other in &set.after {
                for prior in self.resolve_set(*other, key.name(), &members)? {
                    for &to in own {
                        link(prior, to);
                    }
                }
            }
        }
        Ok(successors)
    }

    fn sort(&self) -> ScheduleResult<Vec<Stage>> {
        let successors = self.edges()?;
        let mut in_degree = vec![0usize; self.nodes.len()];
        for next in successors.iter().flatten() {
            in_degree[*next] += 1;
        }

        let mut ready: BTreeSet<usize> = (0..self.nodes.len())
            .filter(|&index| in_degree[index] == 0)
            .collect();
        let mut placed = vec![false; self.nodes.len()];
        let mut remaining = self.nodes.len();
        let mut stages = Vec::new();

        while remaining > 0 {
            if ready.is_empty() {
                let cycle = find_cycle(&successors, &placed)
                    .into_iter()
                    .map(|index| self.nodes[index].name().to_owned())
                    .collect();
                return Err(ScheduleError::Cycle {
                    schedule: self.name.clone(),
                    systems: cycle,
                });
            }

            let main = ready
                .iter()
                .copied()
                .find(|&index| self.nodes[index].access.is_main_thread());
            let stage = match main {
                Some(index) => Stage {
                    kind: StageKind::MainThread,
                    nodes: vec![index],
                },
                None => {
                    let mut stage_access = Access::new();
                    let mut chosen = Vec::new();
                    for &index in &ready {
                        let access = &self.nodes[index].access;
                        if !access.conflicts_with(&stage_access) {
                            stage_access.merge(access);
                            chosen.push(index);
                        }
                    }
                    Stage {
                        kind: StageKind::Parallel,
                        nodes: chosen,
                    }
                }
            };

            for &index in &stage.nodes {
                ready.remove(&index);
                placed[index] = true;
                remaining -= 1;
            }
            for &index in &stage.nodes {
                for &next in &successors[index] {
                    in_degree[next] -= 1;
                    if in_degree[next] == 0 {
                        ready.insert(next);
                    }
                }
            }
            stages.push(stage);
        }
        Ok(stages)
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("name", &self.name)
            .field("systems", &self.nodes.len())
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// Finds one cycle among the unplaced nodes.
fn find_cycle(successors: &[BTreeSet<usize>], placed: &[bool]) -> Vec<usize> {
    let mut visited = vec![false; successors.len()];
    let mut on_path = vec![false; successors.len()];
    let mut path = Vec::new();
    for start in 0..successors.len() {
        if placed[start] || visited[start] {
            continue;
        }
        if let Some(cycle) = dfs_cycle(start, successors, placed, &mut visited, &mut on_path, &mut path) {
            return cycle;
        }
    }
    Vec::new()
}

fn dfs_cycle(
    node: usize,
    successors: &[BTreeSet<usize>],
    placed: &[bool],
    visited: &mut [bool],
    on_path: &mut [bool],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited[node] = true;
    on_path[node] = true;
    path.push(node);

    for &next in &successors[node] {
        if placed[next] {
            continue;
        }
        if on_path[next] {
            let start = path.iter().position(|&entry| entry == next)?;
            return Some(path[start..].to_vec());
        }
        if !visited[next] {
            if let Some(cycle) = dfs_cycle(next, successors, placed, visited, on_path, path) {
                return Some(cycle);
            }
        }
    }

    on_path[node] = false;
    path.pop();
    None
}
