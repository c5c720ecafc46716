#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

use rayon::ThreadPoolBuilder;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};
use threadkit::{
    config::{PoolSource, RunnerConfig},
    runner::{RunError, Runner, RunnerSetupError, run},
};

#[derive(Debug, PartialEq)]
struct Broken(&'static str);

/// Number of live threads of this process whose name starts with `prefix`.
#[cfg(target_os = "linux")]
fn live_threads_named(prefix: &str) -> usize {
    let Ok(tasks) = std::fs::read_dir("/proc/self/task") else {
        return 0;
    };
    tasks
        .filter_map(Result::ok)
        .filter(|task| {
            std::fs::read_to_string(task.path().join("comm"))
                .is_ok_and(|name| name.starts_with(prefix))
        })
        .count()
}

/// Wait up to `limit` for every thread named `prefix*` to exit.
#[cfg(target_os = "linux")]
fn threads_gone(prefix: &str, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while live_threads_named(prefix) > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    true
}

fn sleepy(idx: usize, millis: u64) -> impl FnOnce() -> Result<usize, Broken> + Send + 'static {
    move || {
        thread::sleep(Duration::from_millis(millis));
        Ok(idx)
    }
}

#[test]
fn results_follow_submission_order() {
    // The first task finishes last, the last task first.
    let batch = vec![sleepy(0, 60), sleepy(1, 30), sleepy(2, 0)];
    let results = run(4, None, batch).expect("batch must succeed");
    assert_eq!(results, vec![0, 1, 2]);
}

#[test]
fn large_batch_keeps_order() {
    let batch: Vec<_> = (0..64).map(|idx| sleepy(idx, ((idx * 7) % 5) as u64)).collect();
    let results = run(3, Some(Duration::from_secs(30)), batch).expect("batch must succeed");
    assert_eq!(results, (0..64).collect::<Vec<_>>());
}

#[test]
fn empty_batch_yields_nothing() {
    let batch: Vec<fn() -> Result<u8, Broken>> = vec![];
    assert_eq!(run(2, None, batch).expect("empty batch"), Vec::<u8>::new());
}

#[test]
fn single_failure_fails_the_batch() {
    let batch: Vec<Box<dyn FnOnce() -> Result<usize, Broken> + Send>> = vec![
        Box::new(sleepy(0, 10)),
        Box::new(|| Err(Broken("second"))),
        Box::new(sleepy(2, 10)),
    ];
    let err = run(2, None, batch).expect_err("batch must fail");
    assert!(!err.is_timeout());
    match err {
        RunError::Failed { index, source } => {
            assert_eq!(index, 1);
            assert_eq!(source, Broken("second"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn failure_is_surfaced_unchanged() {
    let batch = vec![|| -> Result<(), std::io::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
    }];
    let err = run(1, None, batch).expect_err("batch must fail");
    let source = err.into_failure().expect("must carry the original error");
    assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
    assert_eq!(source.to_string(), "missing");
}

#[test]
fn deadline_bounds_wait_and_owned_pool_shuts_down() {
    let started = Arc::new(AtomicUsize::new(0));
    let batch: Vec<_> = (0..8)
        .map(|idx| {
            let started = Arc::clone(&started);
            move || -> Result<usize, Broken> {
                started.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(300));
                Ok(idx)
            }
        })
        .collect();
    let runner = Runner::setup(RunnerConfig {
        pool: PoolSource::Owned { threads: 2 },
        timeout: Some(Duration::from_millis(50)),
        thread_name: Some("tk-tmo".to_owned()),
    })
    .expect("valid config");

    let begin = Instant::now();
    let err = runner.run(batch).expect_err("batch must time out");
    let waited = begin.elapsed();
    assert!(
        waited < Duration::from_millis(250),
        "caller waited {waited:?} for in-flight work"
    );
    assert!(err.is_timeout());
    match err {
        RunError::Timeout {
            timeout,
            completed,
            total,
        } => {
            assert_eq!(timeout, Duration::from_millis(50));
            assert_eq!(completed, 0);
            assert_eq!(total, 8);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Queued computations were cancelled and nothing keeps running afterwards.
    let started_at_return = started.load(Ordering::SeqCst);
    assert!(started_at_return < 8, "cancelled work must not start");
    thread::sleep(Duration::from_millis(400));
    assert_eq!(started.load(Ordering::SeqCst), started_at_return);
    #[cfg(target_os = "linux")]
    assert!(threads_gone("tk-tmo", Duration::from_secs(2)));
}

#[test]
fn owned_pool_deadline_does_not_wait_for_running_work() {
    let begin = Instant::now();
    let err = run(1, Some(Duration::from_millis(50)), vec![sleepy(0, 1500)])
        .expect_err("batch must time out");
    assert!(err.is_timeout());
    assert!(begin.elapsed() < Duration::from_millis(500));
}

#[cfg(target_os = "linux")]
#[test]
fn owned_pool_threads_live_only_during_run() {
    let seen = Arc::new(AtomicUsize::new(0));
    let batch: Vec<_> = (0..4)
        .map(|_| {
            let seen = Arc::clone(&seen);
            move || -> Result<(), Broken> {
                seen.fetch_max(live_threads_named("tk-own"), Ordering::SeqCst);
                Ok(())
            }
        })
        .collect();
    let runner = Runner::setup(RunnerConfig {
        thread_name: Some("tk-own".to_owned()),
        ..RunnerConfig::owned(2)
    })
    .expect("valid config");
    runner.run(batch).expect("batch must succeed");
    assert!(seen.load(Ordering::SeqCst) >= 1);
    assert!(threads_gone("tk-own", Duration::from_secs(2)));
}

#[test]
fn shared_pool_survives_timeout() {
    let pool = Arc::new(
        ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .expect("pool must build"),
    );
    let runner = Runner::with_pool(Arc::clone(&pool)).timeout(Duration::from_millis(50));
    let started = Instant::now();
    let err = runner
        .run(vec![sleepy(0, 500), sleepy(1, 500)])
        .expect_err("batch must time out");
    assert!(err.is_timeout());
    // A shared pool is not joined, so the call returns at the deadline.
    assert!(started.elapsed() < Duration::from_millis(450));

    let runner = Runner::with_pool(Arc::clone(&pool));
    let results = runner
        .run(vec![sleepy(0, 0), sleepy(1, 0)])
        .expect("pool must still accept work");
    assert_eq!(results, vec![0, 1]);
    assert_eq!(pool.install(|| 7), 7);
}

#[test]
fn zero_threads_is_rejected() {
    assert_eq!(
        Runner::with_threads(0).expect_err("zero threads"),
        RunnerSetupError::ZeroThreads
    );
    let err = run(0, None, vec![sleepy(0, 0)]).expect_err("zero threads");
    assert!(matches!(err, RunError::Setup(RunnerSetupError::ZeroThreads)));
}

#[test]
fn each_computation_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let batch: Vec<_> = (0..16)
        .map(|idx| {
            let calls = Arc::clone(&calls);
            move || -> Result<usize, Broken> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(idx * 2)
            }
        })
        .collect();
    let runner = Runner::with_threads(4).expect("valid config");
    let results = runner.run(batch).expect("batch must succeed");
    assert_eq!(results, (0..16).map(|idx| idx * 2).collect::<Vec<_>>());
    assert_eq!(calls.load(Ordering::SeqCst), 16);
}

#[test]
#[should_panic(expected = "computation exploded")]
fn panic_is_resumed_on_caller() {
    let batch: Vec<Box<dyn FnOnce() -> Result<u8, Broken> + Send>> = vec![
        Box::new(|| Ok(1)),
        Box::new(|| panic!("computation exploded")),
    ];
    let _ = run(2, None, batch);
}
