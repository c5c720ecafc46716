//! Small concurrency toolkit with three independent, composable primitives.
//!
//! - `runner`: executes a batch of independent computations on a worker pool,
//!   optionally under a deadline, and returns the results in submission order.
//!   The pool is either supplied by the caller or started by the runner for
//!   the duration of one call and shut down before the call returns.
//! - `sticky`: memoizes a function in a bounded table keyed by its input, with
//!   deterministic oldest-first eviction.
//! - `synced`: forces every call on a wrapped function or computation, and the
//!   start of every traversal of a wrapped sequence, through one lock, which
//!   may be shared across wrappers.
//!
//! The wrappers implement the same capability they wrap (see `task`), so they
//! nest freely: a memoized function can be serialized, and serialized or
//! memoized calls can be fanned out by the runner.
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use threadkit::{runner::Runner, sticky::Sticky, task::Func};
//!
//! let square = Arc::new(Sticky::<u64, _>::with_capacity(|x: u64| Ok::<_, ()>(x * x), 8));
//! let runner = Runner::with_threads(4).unwrap().timeout(Duration::from_secs(5));
//! let batch = (0..4u64).map(|x| {
//!     let square = Arc::clone(&square);
//!     move || square.apply(x)
//! });
//! assert_eq!(runner.run(batch).unwrap(), vec![0, 1, 4, 9]);
//! ```

/// Runner configuration: where the worker pool comes from and how long a
/// batch may take.
pub mod config;
/// The parallel batch runner.
///
/// Submits each computation of a batch to a rayon pool, collects results by
/// submission index and enforces the optional deadline. Owned pools are shut
/// down before `run` returns on every exit path.
pub mod runner;
/// Bounded memoization of a function keyed by its input.
pub mod sticky;
mod sync;
/// Lock-serialized functions, computations and sequences, and the shareable
/// lock handle.
pub mod synced;
/// Capabilities consumed and exposed by the wrappers: one-shot
/// `Computation`, shared `Func` and exclusive `FuncMut`.
pub mod task;
/// Common aliases.
pub mod types;
