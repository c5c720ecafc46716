#[cfg(not(feature = "loom"))]
use crate::sync::LoomUnsafeCellCompat as _;
use crate::{
    sync::{Mutex, MutexGuard, UnsafeCell, lock},
    task::{Computation, Func, FuncMut},
};
use derive_more::Debug;
use std::sync::Arc;

/// Opaque handle to a mutual-exclusion lock.
///
/// Clones refer to the same lock. Passing clones to several [`Synced`]
/// wrappers serializes calls across all of them.
#[derive(Debug, Clone)]
pub struct SharedLock(#[debug(skip)] Arc<Mutex<()>>);

impl SharedLock {
    /// A fresh lock, not shared with anything yet.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(())))
    }

    /// Whether `self` and `other` are the same lock.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        lock(&self.0)
    }
}

impl Default for SharedLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Forces every call on the wrapped value through a single lock.
///
/// The wrapped value is only ever touched while the lock is held, so a value
/// that is `Send` but not safe to use concurrently (an `FnMut` closure, a
/// stateful generator) becomes shareable between threads:
///
/// - [`Func`] is implemented for any wrapped [`FuncMut`].
/// - [`Computation`] is implemented for any wrapped [`Computation`].
///
/// The lock is released when the call returns, fails or panics. It is not
/// reentrant: calling back into a wrapper that shares the lock from inside the
/// protected call deadlocks.
///
/// No reference to the wrapped value ever leaves the lock, so a `Synced` cannot
/// be iterated; use [`SyncedIter`] for sequences.
///
/// ```compile_fail
/// use threadkit::synced::Synced;
///
/// let synced = Synced::new(vec![1, 2, 3]);
/// for item in &synced {
///     let _ = item;
/// }
/// ```
#[derive(Debug)]
pub struct Synced<T> {
    #[debug(skip)]
    origin: UnsafeCell<T>,
    lock: SharedLock,
}

// SAFETY: `origin` is accessed only while `lock` is held (or by value), and no
// reference to it outlives the critical section, so at most one thread touches
// it at a time.
unsafe impl<T: Send> Sync for Synced<T> {}

impl<T> Synced<T> {
    /// Protect `origin` with a private lock.
    pub fn new(origin: T) -> Self {
        Self::with_lock(origin, SharedLock::new())
    }

    /// Protect `origin` with `lock`, which may be shared with other wrappers.
    pub fn with_lock(origin: T, lock: SharedLock) -> Self {
        Self {
            origin: UnsafeCell::new(origin),
            lock,
        }
    }

    /// The lock guarding this wrapper.
    pub fn lock(&self) -> &SharedLock {
        &self.lock
    }

    /// Unwrap the protected value.
    pub fn into_inner(self) -> T {
        self.origin.into_inner()
    }

    /// Run `f` on the protected value while holding the lock.
    fn locked<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = self.lock.acquire();
        // SAFETY: the guard gives this thread exclusive access to `origin` until it
        // drops at the end of this scope, after `f` has returned or unwound.
        self.origin
            .with_mut(|ptr| f(unsafe { ptr.as_mut().expect("Synced::locked: [1]") }))
    }
}

impl<T: Default> Default for Synced<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<In, T> Func<In> for Synced<T>
where
    T: FuncMut<In>,
{
    type Output = T::Output;
    type Error = T::Error;

    fn apply(&self, input: In) -> Result<T::Output, T::Error> {
        self.locked(|origin| origin.apply_mut(input))
    }
}

impl<T> Computation for Synced<T>
where
    T: Computation,
{
    type Output = T::Output;
    type Error = T::Error;

    fn compute(self) -> Result<T::Output, T::Error> {
        let Self { origin, lock } = self;
        let _guard = lock.acquire();
        origin.into_inner().compute()
    }
}

/// Serializes the start of every traversal of a sequence.
///
/// Obtaining an iterator (`iter`, or iterating `&SyncedIter<I>`) takes the lock
/// for as long as `&I` is turned into an iterator. Advancing an iterator that
/// has already been handed out is not serialized, so callers sharing one
/// iterator across threads must coordinate themselves. Passing the lock of a
/// [`Synced`] wrapper makes traversal setup exclusive with its protected calls.
///
/// The sequence is only ever read, never borrowed mutably, which is what makes
/// handing out iterators that outlive the lock sound.
#[derive(Debug)]
pub struct SyncedIter<I> {
    #[debug(skip)]
    origin: I,
    lock: SharedLock,
}

impl<I> SyncedIter<I> {
    /// Protect `origin` with a private lock.
    pub fn new(origin: I) -> Self {
        Self::with_lock(origin, SharedLock::new())
    }

    /// Protect `origin` with `lock`, which may be shared with other wrappers.
    pub fn with_lock(origin: I, lock: SharedLock) -> Self {
        Self { origin, lock }
    }

    /// The lock guarding this wrapper.
    pub fn lock(&self) -> &SharedLock {
        &self.lock
    }

    /// Unwrap the protected sequence.
    pub fn into_inner(self) -> I {
        self.origin
    }

    /// Obtain a fresh iterator over the sequence under the lock.
    pub fn iter<'a>(&'a self) -> <&'a I as IntoIterator>::IntoIter
    where
        &'a I: IntoIterator,
    {
        let _guard = self.lock.acquire();
        (&self.origin).into_iter()
    }
}

impl<'a, I> IntoIterator for &'a SyncedIter<I>
where
    &'a I: IntoIterator,
{
    type Item = <&'a I as IntoIterator>::Item;
    type IntoIter = <&'a I as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
