use rayon::ThreadPool;
use std::{sync::Arc, time::Duration};

/// Where the worker threads of a [`Runner`](crate::runner::Runner) come from.
#[derive(Debug, Clone)]
pub enum PoolSource {
    /// A pool owned by the caller. The runner submits work to it and never
    /// shuts it down.
    Shared(Arc<ThreadPool>),
    /// A fixed-size pool built for each `run` call and shut down before the
    /// call returns.
    Owned {
        /// Number of worker threads. Zero is rejected by `Runner::setup`.
        threads: usize,
    },
}

impl Default for PoolSource {
    fn default() -> Self {
        Self::Owned {
            threads: std::thread::available_parallelism().map_or(1, usize::from),
        }
    }
}

/// Configuration of a [`Runner`](crate::runner::Runner).
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Worker pool used to execute a batch.
    pub pool: PoolSource,
    /// Upper bound on the total wait for a whole batch. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Name prefix for the threads of an owned pool; workers are named
    /// `{prefix}-{index}`. Ignored for shared pools.
    pub thread_name: Option<String>,
}

impl RunnerConfig {
    /// Configuration for an owned pool of `threads` workers and no deadline.
    pub fn owned(threads: usize) -> Self {
        Self {
            pool: PoolSource::Owned { threads },
            ..Self::default()
        }
    }

    /// Configuration submitting to a caller-owned pool with no deadline.
    pub fn shared(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool: PoolSource::Shared(pool),
            ..Self::default()
        }
    }
}
