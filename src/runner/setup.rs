use crate::config::{PoolSource, RunnerConfig};
use core::num::NonZeroUsize;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Error returned by `Runner::setup` when the configuration is unusable.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RunnerSetupError {
    /// An owned pool was requested with zero worker threads.
    #[error("worker pool must have at least one thread")]
    ZeroThreads,
}

/// Validated form of [`PoolSource`].
#[derive(Debug, Clone)]
pub(super) enum Pool {
    Shared(Arc<ThreadPool>),
    Owned {
        threads: NonZeroUsize,
        thread_name: Option<Arc<str>>,
    },
}

pub(super) fn validate(
    config: RunnerConfig,
) -> Result<(Pool, Option<Duration>), RunnerSetupError> {
    let RunnerConfig {
        pool,
        timeout,
        thread_name,
    } = config;
    let pool = match pool {
        PoolSource::Shared(pool) => Pool::Shared(pool),
        PoolSource::Owned { threads } => Pool::Owned {
            threads: NonZeroUsize::new(threads).ok_or(RunnerSetupError::ZeroThreads)?,
            thread_name: thread_name.map(Arc::from),
        },
    };
    Ok((pool, timeout))
}

/// Build a pool of `threads` workers, hand it to `with_pool`, then shut it
/// down.
///
/// The pool is dropped before this returns (or unwinds): it accepts no more
/// work and its threads exit on their own. Idle workers leave immediately and
/// a worker busy with an in-flight job leaves once that job ends, so the caller
/// never waits for abandoned work.
pub(super) fn with_owned_pool<R>(
    threads: NonZeroUsize,
    thread_name: Option<&Arc<str>>,
    with_pool: impl FnOnce(&ThreadPool) -> R,
) -> Result<R, ThreadPoolBuildError> {
    let mut builder = ThreadPoolBuilder::new()
        .num_threads(threads.get())
        .start_handler(|idx| log::trace!("Worker {idx} started"))
        .exit_handler(|idx| log::trace!("Worker {idx} exited"));
    if let Some(prefix) = thread_name {
        let prefix = Arc::clone(prefix);
        builder = builder.thread_name(move |idx| format!("{prefix}-{idx}"));
    }
    log::debug!("Starting owned worker pool with {threads} thread(s)");
    let pool = builder.build()?;
    let result = with_pool(&pool);
    drop(pool);
    log::debug!("Owned worker pool shut down");
    Ok(result)
}
