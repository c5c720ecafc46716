use crate::{runner::setup::RunnerSetupError, task::Computation};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rayon::{ThreadPool, ThreadPoolBuildError};
use std::{
    any::Any,
    iter,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use thiserror::Error;

/// Error returned by `Runner::run`.
///
/// `E` is the error type of the computations in the batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError<E> {
    /// A computation failed. Carries the original error unchanged.
    #[error("computation #{index} of the batch failed")]
    Failed {
        /// Submission position of the failed computation.
        index: usize,
        /// The error reported by the computation.
        source: E,
    },
    /// The deadline elapsed before every computation completed.
    #[error("batch did not complete within {timeout:?} ({completed} of {total} done)")]
    Timeout {
        /// The configured deadline.
        timeout: Duration,
        /// Number of computations that had completed when time ran out.
        completed: usize,
        /// Size of the batch.
        total: usize,
    },
    /// The runner configuration is unusable.
    #[error(transparent)]
    Setup(#[from] RunnerSetupError),
    /// The owned worker pool could not be started.
    #[error("failed to build worker pool")]
    PoolBuild(#[from] ThreadPoolBuildError),
}

impl<E> RunError<E> {
    /// Whether the batch was abandoned because of the deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The error of the failed computation, if that is what stopped the
    /// batch.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}

type PanicPayload = Box<dyn Any + Send + 'static>;

enum Outcome<T, E> {
    Done(T),
    Failed(E),
    Panicked(PanicPayload),
}

/// Why a batch stopped before producing every result.
pub(super) enum Interrupted<E> {
    Error(RunError<E>),
    /// Resumed on the calling thread once the pool is torn down.
    Panic(PanicPayload),
}

/// Submit every computation of `batch` to `pool` and wait for the results.
///
/// Once the batch is abandoned (deadline, failure or panic), computations that
/// have not started yet are skipped. Running ones finish on their worker and
/// their results are dropped.
pub(super) fn execute<C>(
    pool: &ThreadPool,
    batch: Vec<C>,
    timeout: Option<Duration>,
) -> Result<Vec<C::Output>, Interrupted<C::Error>>
where
    C: Computation + Send + 'static,
    C::Output: Send + 'static,
    C::Error: Send + 'static,
{
    let deadline = timeout.and_then(|timeout| {
        let deadline = Instant::now().checked_add(timeout)?;
        Some((deadline, timeout))
    });
    let total = batch.len();
    let cancelled = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = crossbeam_channel::unbounded();

    for (index, computation) in batch.into_iter().enumerate() {
        let sender = sender.clone();
        let cancelled = Arc::clone(&cancelled);
        pool.spawn(move || {
            if cancelled.load(Ordering::Relaxed) {
                return;
            }
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| computation.compute())) {
                Ok(Ok(output)) => Outcome::Done(output),
                Ok(Err(error)) => Outcome::Failed(error),
                Err(payload) => Outcome::Panicked(payload),
            };
            // Fails only if the batch was abandoned and the receiver is gone.
            let _ = sender.send((index, outcome));
        });
    }
    // Every remaining sender belongs to a pending job.
    drop(sender);

    let result = collect(&receiver, total, deadline);
    if result.is_err() {
        cancelled.store(true, Ordering::Relaxed);
    }
    result
}

fn collect<T, E>(
    receiver: &Receiver<(usize, Outcome<T, E>)>,
    total: usize,
    deadline: Option<(Instant, Duration)>,
) -> Result<Vec<T>, Interrupted<E>> {
    let mut slots: Vec<Option<T>> = iter::repeat_with(|| None).take(total).collect();
    for completed in 0..total {
        let received = match deadline {
            Some((deadline, _)) => receiver.recv_deadline(deadline),
            None => receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        let (index, outcome) = match received {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => {
                let (_, timeout) = deadline.expect("Runner::run: [1]");
                return Err(Interrupted::Error(RunError::Timeout {
                    timeout,
                    completed,
                    total,
                }));
            }
            // Jobs are only skipped after the batch is abandoned, and rayon never
            // drops a spawned job without running it.
            Err(RecvTimeoutError::Disconnected) => unreachable!("Runner::run: [2]"),
        };
        match outcome {
            Outcome::Done(output) => {
                let slot = &mut slots[index];
                assert!(slot.is_none(), "Runner::run: [3]");
                *slot = Some(output);
            }
            Outcome::Failed(source) => {
                return Err(Interrupted::Error(RunError::Failed { index, source }));
            }
            Outcome::Panicked(payload) => return Err(Interrupted::Panic(payload)),
        }
    }
    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("Runner::run: [4]"))
        .collect())
}
