mod execute;
mod setup;

/// Error returned by `Runner::run`.
pub use crate::runner::execute::RunError;
/// Error returned by `Runner::setup` when the configuration is unusable.
pub use crate::runner::setup::RunnerSetupError;
use crate::{
    config::RunnerConfig,
    runner::{
        execute::{Interrupted, execute},
        setup::{Pool, validate, with_owned_pool},
    },
    task::Computation,
};
use rayon::ThreadPool;
use std::{panic, sync::Arc, time::Duration};

/// Runs a batch of independent computations on a worker pool and returns
/// their results in submission order.
///
/// - With a shared pool, work is submitted to the caller's pool, which is left
///   running afterwards.
/// - With an owned pool, a fixed-size pool is started for every `run` call and
///   is shut down before `run` returns: it accepts no further work and its
///   threads exit once their current job ends. This holds on success, on
///   timeout, on failure and when a computation panics.
///
/// The deadline bounds the caller's wait in both cases. Computations still
/// running when it elapses cannot be interrupted; they finish on their worker
/// and their results are dropped.
///
/// The first failing computation fails the whole call and computations that
/// have not started yet are skipped. Results that were already produced are
/// discarded. Each computation runs at most once per call.
#[must_use]
#[derive(Debug, Clone)]
pub struct Runner {
    pool: Pool,
    timeout: Option<Duration>,
}

impl Runner {
    /// Construct a runner from `config`.
    ///
    /// # Errors
    /// If an owned pool is configured with zero threads.
    pub fn setup(config: RunnerConfig) -> Result<Self, RunnerSetupError> {
        let (pool, timeout) = validate(config)?;
        Ok(Self { pool, timeout })
    }

    /// Runner owning a pool of `threads` workers per call.
    ///
    /// # Errors
    /// If `threads` is zero.
    pub fn with_threads(threads: usize) -> Result<Self, RunnerSetupError> {
        Self::setup(RunnerConfig::owned(threads))
    }

    /// Runner submitting to a pool owned by the caller.
    pub fn with_pool(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool: Pool::Shared(pool),
            timeout: None,
        }
    }

    /// Bound the total wait for each batch by `timeout`.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Execute `batch` and return one result per computation, positioned as
    /// the computations were submitted.
    ///
    /// Blocks the calling thread until every computation has completed, one of
    /// them has failed, or the deadline has elapsed.
    ///
    /// # Errors
    /// - [`RunError::Failed`] with the original error of the first computation
    ///   observed to fail.
    /// - [`RunError::Timeout`] if the deadline elapsed first.
    /// - [`RunError::PoolBuild`] if the owned pool could not be started.
    ///
    /// # Panics
    /// Re-raises the panic of a computation that panicked, after the pool has
    /// been torn down.
    pub fn run<I, C>(&self, batch: I) -> Result<Vec<C::Output>, RunError<C::Error>>
    where
        I: IntoIterator<Item = C>,
        C: Computation + Send + 'static,
        C::Output: Send + 'static,
        C::Error: Send + 'static,
    {
        let Self { pool, timeout } = self;
        let batch: Vec<C> = batch.into_iter().collect();
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let total = batch.len();
        log::debug!("Running a batch of {total} computation(s)");

        let outcome = match pool {
            Pool::Shared(pool) => execute(pool, batch, *timeout),
            Pool::Owned {
                threads,
                thread_name,
            } => with_owned_pool(*threads, thread_name.as_ref(), |pool| {
                execute(pool, batch, *timeout)
            })?,
        };
        match outcome {
            Ok(outputs) => Ok(outputs),
            Err(Interrupted::Error(error)) => {
                match &error {
                    RunError::Failed { index, .. } => {
                        log::debug!("Computation #{index} of {total} failed; batch abandoned");
                    }
                    RunError::Timeout {
                        completed, timeout, ..
                    } => {
                        log::debug!(
                            "Batch timed out after {timeout:?} with {completed} of {total} done"
                        );
                    }
                    _ => {}
                }
                Err(error)
            }
            Err(Interrupted::Panic(payload)) => {
                log::debug!("A computation panicked; batch abandoned");
                panic::resume_unwind(payload)
            }
        }
    }
}

/// Run `batch` on a pool of `threads` workers owned by this call, optionally
/// bounded by `timeout`.
///
/// # Errors
/// See [`Runner::run`]. Additionally [`RunError::Setup`] if `threads` is zero.
pub fn run<I, C>(
    threads: usize,
    timeout: Option<Duration>,
    batch: I,
) -> Result<Vec<C::Output>, RunError<C::Error>>
where
    I: IntoIterator<Item = C>,
    C: Computation + Send + 'static,
    C::Output: Send + 'static,
    C::Error: Send + 'static,
{
    let runner = Runner::setup(RunnerConfig {
        timeout,
        ..RunnerConfig::owned(threads)
    })?;
    runner.run(batch)
}
