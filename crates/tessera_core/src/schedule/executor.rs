//! # Stage Executor
//!
//! Runs built stages on a rayon worker pool.
//!
//! Every worker owns a command buffer. After a stage finishes, worker
//! buffers are appended to the main buffer in worker-index order and the
//! whole queue is applied, so structural changes land between stages and
//! never while a system holds a borrow.

use parking_lot::Mutex;

use super::graph::{Stage, StageKind, SystemNode};
use crate::ecs::{CommandBuffer, MainThreadResources, World};
use crate::error::{ScheduleError, ScheduleResult, SystemError};
use crate::system::SystemContext;

/// Worker pool plus per-worker command buffers.
pub struct Executor {
    pool: rayon::ThreadPool,
    worker_buffers: Vec<Mutex<CommandBuffer>>,
    main_buffer: Mutex<CommandBuffer>,
}

impl Executor {
    /// Creates a pool with `worker_threads` threads (`0` means one per core).
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::WorkerPool`] if the threads cannot be spawned.
    pub fn new(worker_threads: usize) -> ScheduleResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|index| format!("tessera-worker-{index}"))
            .build()
            .map_err(|err| ScheduleError::WorkerPool(err.to_string()))?;
        let workers = pool.current_num_threads().max(1);
        tracing::debug!(workers, "executor started");

        Ok(Self {
            pool,
            worker_buffers: (0..workers).map(|_| Mutex::new(CommandBuffer::new())).collect(),
            main_buffer: Mutex::new(CommandBuffer::new()),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_buffers.len()
    }

    pub(crate) fn run_stages(
        &self,
        stages: &[Stage],
        nodes: &mut [SystemNode],
        world: &mut World,
        main_thread: &MainThreadResources,
    ) -> ScheduleResult<()> {
        for stage in stages {
            let result = match stage.kind() {
                StageKind::MainThread => self.run_inline(stage, nodes, world, Some(main_thread)),
                StageKind::Parallel if stage.len() == 1 => {
                    self.run_inline(stage, nodes, world, None)
                }
                StageKind::Parallel => self.run_parallel(stage, nodes, world),
            };
            self.flush(world);
            result?;
        }
        Ok(())
    }

    fn run_inline(
        &self,
        stage: &Stage,
        nodes: &mut [SystemNode],
        world: &World,
        main_thread: Option<&MainThreadResources>,
    ) -> Result<(), SystemError> {
        for &index in stage.nodes() {
            let node = &mut nodes[index];
            let ctx = SystemContext::new(world, &self.main_buffer, main_thread, node.name());
            node.run(&ctx)?;
        }
        Ok(())
    }

    fn run_parallel(
        &self,
        stage: &Stage,
        nodes: &mut [SystemNode],
        world: &World,
    ) -> Result<(), SystemError> {
        let (errors_tx, errors_rx) = crossbeam_channel::unbounded();
        let members = stage.nodes();
        let buffers = &self.worker_buffers;
        let selected: Vec<&mut SystemNode> = nodes
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| members.binary_search(index).is_ok())
            .map(|(_, node)| node)
            .collect();

        self.pool.scope(move |scope| {
            for node in selected {
                let errors_tx = errors_tx.clone();
                scope.spawn(move |_| {
                    let worker = rayon::current_thread_index().unwrap_or(0) % buffers.len();
                    let ctx = SystemContext::new(world, &buffers[worker], None, node.name());
                    if let Err(err) = node.run(&ctx) {
                        tracing::error!(system = node.name(), error = %err, "system failed");
                        // Receiver outlives the scope.
                        let _ = errors_tx.send(err);
                    }
                });
            }
        });

        match errors_rx.try_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Merges worker buffers into the main buffer and applies it.
    fn flush(&self, world: &mut World) {
        let mut main = self.main_buffer.lock();
        for buffer in &self.worker_buffers {
            main.append(&mut buffer.lock());
        }
        let stats = main.apply(world);
        if stats.applied > 0 {
            tracing::trace!(applied = stats.applied, dropped = stats.dropped, "stage commands applied");
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("workers", &self.worker_buffers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count() {
        let executor = Executor::new(3).unwrap();
        assert_eq!(executor.worker_count(), 3);
    }

    #[test]
    fn test_default_worker_count_nonzero() {
        let executor = Executor::new(0).unwrap();
        assert!(executor.worker_count() >= 1);
    }
}
