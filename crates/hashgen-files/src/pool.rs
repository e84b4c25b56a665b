//! Block hashing worker pool.
//!
//! A fixed set of OS threads pulls [`Block`]s from one shared bounded queue,
//! hashes each body and sends a [`BlockDigest`] back on a single-consumer
//! result channel. The coordinator is the only reader of that channel, so the
//! per-file result slots never need a lock.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──spawn all──▶ Running ──shutdown()──▶ Draining ──join all──▶ Stopped
//! ```
//!
//! Each worker blocks on a choice between its own stop channel and the shared
//! queue. A stop signal is only observed between blocks; it never interrupts
//! a hash in progress. Shutdown sends one stop per worker and joins every
//! thread, so no worker outlives the pool. Dropping a pool that was never shut
//! down performs the same drain.

use crate::digest::DigestAlgorithm;
use crate::error::{HashgenError, Result};
use crate::{Block, BlockDigest, DEFAULT_QUEUE_CAPACITY};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use std::thread::{self, JoinHandle};

/// Threads kept free for the splitter/coordinator and for print coordination
pub const RESERVED_THREADS: usize = 2;

/// Worker count derived from the available hardware parallelism.
///
/// Leaves [`RESERVED_THREADS`] cores for the rest of the process, with a floor
/// of one worker.
#[must_use]
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(RESERVED_THREADS)
        .max(1)
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers (0 = derive from available parallelism)
    pub workers: usize,
    /// Capacity of the shared work queue, in blocks
    pub queue_capacity: usize,
    /// Digest applied to every block
    pub algorithm: DigestAlgorithm,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            algorithm: DigestAlgorithm::default(),
        }
    }
}

impl PoolConfig {
    /// Worker count after resolving `0` to the hardware default
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            default_worker_count()
        } else {
            self.workers
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::InvalidConfig`] if the queue capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(HashgenError::InvalidConfig(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pool-level lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Workers are being spawned
    Starting,
    /// Accepting blocks
    Running,
    /// Stop signals sent, waiting for workers to exit
    Draining,
    /// Every worker has exited
    Stopped,
}

/// Per-worker totals reported when the worker exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Worker identity
    pub id: usize,
    /// Blocks hashed over the worker's lifetime
    pub blocks_hashed: u64,
}

/// Summary returned by [`WorkerPool::shutdown`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// One entry per worker that acknowledged its stop signal, by id
    pub workers: Vec<WorkerStats>,
}

impl PoolReport {
    /// Blocks hashed across all workers
    #[must_use]
    pub fn total_blocks(&self) -> u64 {
        self.workers.iter().map(|w| w.blocks_hashed).sum()
    }
}

struct Worker {
    id: usize,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

/// Fixed pool of block hashing workers
pub struct WorkerPool {
    algorithm: DigestAlgorithm,
    state: PoolState,
    workers: Vec<Worker>,
    work_tx: Sender<Block>,
    result_rx: Receiver<BlockDigest>,
}

impl WorkerPool {
    /// Spawn the workers described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a thread cannot be
    /// spawned. Workers spawned before the failure are stopped and joined.
    pub fn start(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let worker_count = config.resolved_workers();
        let (work_tx, work_rx) = bounded::<Block>(config.queue_capacity);
        let (result_tx, result_rx) = unbounded::<BlockDigest>();

        let mut pool = Self {
            algorithm: config.algorithm,
            state: PoolState::Starting,
            workers: Vec::with_capacity(worker_count),
            work_tx,
            result_rx,
        };

        for id in 0..worker_count {
            let (stop_tx, stop_rx) = bounded::<()>(1);
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let algorithm = config.algorithm;

            let handle = thread::Builder::new()
                .name(format!("block-hasher-{id}"))
                .spawn(move || run_worker(id, algorithm, &work_rx, &stop_rx, &result_tx))
                .map_err(|source| HashgenError::WorkerSpawn { id, source })?;

            pool.workers.push(Worker {
                id,
                stop_tx,
                handle: Some(handle),
            });
        }

        pool.state = PoolState::Running;
        tracing::debug!(
            workers = worker_count,
            queue_capacity = config.queue_capacity,
            algorithm = %config.algorithm,
            "Worker pool running"
        );

        Ok(pool)
    }

    /// Digest algorithm applied by the workers
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Number of workers
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Queue a block for hashing, blocking while the queue is full
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::PoolDisconnected`] if no worker is left to
    /// receive the block.
    pub fn dispatch(&self, block: Block) -> Result<()> {
        self.work_tx
            .send(block)
            .map_err(|_| HashgenError::PoolDisconnected)
    }

    /// Wait for the next completed block digest
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::PoolDisconnected`] if every worker has exited.
    pub fn next_result(&self) -> Result<BlockDigest> {
        self.result_rx
            .recv()
            .map_err(|_| HashgenError::PoolDisconnected)
    }

    /// Stop every worker and wait for all of them to exit
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::WorkerPanicked`] for the first worker that
    /// panicked. The remaining workers are still joined.
    pub fn shutdown(mut self) -> Result<PoolReport> {
        self.drain()
    }

    fn drain(&mut self) -> Result<PoolReport> {
        if self.state == PoolState::Stopped {
            return Ok(PoolReport::default());
        }
        self.state = PoolState::Draining;

        for worker in &self.workers {
            // A worker that already exited has dropped its receiver.
            let _ = worker.stop_tx.send(());
        }

        let mut report = PoolReport::default();
        let mut first_error = None;

        for worker in &mut self.workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            match handle.join() {
                Ok(stats) => report.workers.push(stats),
                Err(_) => {
                    tracing::error!(worker = worker.id, "Block hasher panicked");
                    first_error.get_or_insert(HashgenError::WorkerPanicked { id: worker.id });
                }
            }
        }

        self.state = PoolState::Stopped;
        tracing::debug!(
            workers = report.workers.len(),
            blocks = report.total_blocks(),
            "Worker pool stopped"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.state != PoolState::Stopped {
            let _ = self.drain();
        }
    }
}

fn run_worker(
    id: usize,
    algorithm: DigestAlgorithm,
    work_rx: &Receiver<Block>,
    stop_rx: &Receiver<()>,
    result_tx: &Sender<BlockDigest>,
) -> WorkerStats {
    let mut stats = WorkerStats {
        id,
        blocks_hashed: 0,
    };

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(work_rx) -> msg => {
                let Ok(block) = msg else { break };
                let Block { index, body } = block;
                let digest = algorithm.digest(&body);
                drop(body);

                if result_tx.send(BlockDigest { index, digest }).is_err() {
                    break;
                }
                stats.blocks_hashed += 1;
            }
        }
    }

    tracing::debug!(worker = id, blocks = stats.blocks_hashed, "Block hasher stopping");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(workers: usize) -> PoolConfig {
        PoolConfig {
            workers,
            ..PoolConfig::default()
        }
    }

    #[test]
    fn test_default_worker_count_has_floor() {
        assert!(default_worker_count() >= 1);
        assert_eq!(config(0).resolved_workers(), default_worker_count());
        assert_eq!(config(3).resolved_workers(), 3);
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let cfg = PoolConfig {
            queue_capacity: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            WorkerPool::start(&cfg),
            Err(HashgenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_start_and_shutdown_acknowledged_by_every_worker() {
        let pool = WorkerPool::start(&config(4)).unwrap();
        assert_eq!(pool.state(), PoolState::Running);
        assert_eq!(pool.worker_count(), 4);

        let report = pool.shutdown().unwrap();
        let mut ids: Vec<usize> = report.workers.iter().map(|w| w.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(report.total_blocks(), 0);
    }

    #[test]
    fn test_workers_hash_dispatched_blocks() {
        let pool = WorkerPool::start(&config(3)).unwrap();

        for index in 0..50u64 {
            pool.dispatch(Block {
                index,
                body: index.to_le_bytes().to_vec(),
            })
            .unwrap();
        }

        let mut seen = vec![false; 50];
        for _ in 0..50 {
            let result = pool.next_result().unwrap();
            let expected = DigestAlgorithm::Sha1.digest(&result.index.to_le_bytes());
            assert_eq!(result.digest, expected);
            seen[result.index as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));

        let report = pool.shutdown().unwrap();
        assert_eq!(report.total_blocks(), 50);
    }

    #[test]
    fn test_single_worker_pool() {
        let pool = WorkerPool::start(&config(1)).unwrap();
        pool.dispatch(Block {
            index: 0,
            body: b"solo".to_vec(),
        })
        .unwrap();
        assert_eq!(pool.next_result().unwrap().index, 0);
        assert_eq!(pool.shutdown().unwrap().workers.len(), 1);
    }

    #[test]
    fn test_drop_joins_workers() {
        let pool = WorkerPool::start(&config(2)).unwrap();
        let work_tx = pool.work_tx.clone();
        drop(pool);

        // Every worker has exited and released its queue receiver.
        assert!(
            work_tx
                .send(Block {
                    index: 0,
                    body: vec![1],
                })
                .is_err()
        );
    }
}
