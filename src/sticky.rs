use crate::{
    sync::{AtomicU64, Mutex, Ordering, lock},
    task::{Func, FuncMut},
    types::IndexMap,
};
use core::{hash::Hash, marker::PhantomData};
use derive_more::Debug;
use rustc_hash::FxBuildHasher;

/// Capacity used by [`Sticky::new`]: effectively unbounded.
pub const UNBOUNDED: usize = usize::MAX;

/// Memoizes a [`Func`] in a bounded, insertion-ordered table.
///
/// - A hit returns a clone of the stored value without calling the function.
/// - A miss calls the function and, on success, stores the value. If the
///   table is full the oldest inserted entry is evicted first (FIFO; hits do
///   not refresh an entry's position).
/// - A failure stores nothing, so the next call with the same key retries.
/// - With capacity 0 nothing is ever stored and every call recomputes.
///
/// The function runs outside the table lock. Concurrent misses on the same key
/// may therefore compute it more than once; the first value inserted is kept.
///
/// Use `V = Arc<T>` to hand out the very same object on every hit.
#[derive(Debug)]
pub struct Sticky<K, F>
where
    F: Func<K>,
{
    #[debug(skip)]
    func: F,
    capacity: usize,
    #[debug(skip)]
    entries: Mutex<IndexMap<K, F::Output>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    #[debug(skip)]
    _marker: PhantomData<fn(K)>,
}

/// Snapshot of the counters of a [`Sticky`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls answered from the table.
    pub hits: u64,
    /// Calls that invoked the underlying function.
    pub misses: u64,
    /// Entries removed to respect the capacity.
    pub evictions: u64,
}

impl<K, F> Sticky<K, F>
where
    K: Hash + Eq + Clone,
    F: Func<K>,
    F::Output: Clone,
{
    /// Memoize `func` without a practical bound on the number of entries.
    pub fn new(func: F) -> Self {
        Self::with_capacity(func, UNBOUNDED)
    }

    /// Memoize `func`, retaining at most `capacity` entries.
    pub fn with_capacity(func: F, capacity: usize) -> Self {
        let preallocate = capacity.min(16);
        Self {
            func,
            capacity,
            entries: Mutex::new(IndexMap::with_capacity_and_hasher(
                preallocate,
                FxBuildHasher,
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }

    /// Return the memoized value for `key`, computing it on a miss.
    ///
    /// # Errors
    /// The error of the underlying function. Nothing is cached in that case.
    pub fn get(&self, key: K) -> Result<F::Output, F::Error> {
        if let Some(value) = lock(&self.entries).get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("Cache hit");
            return Ok(value.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::trace!("Cache miss");

        let value = self.func.apply(key.clone())?;
        if self.capacity == 0 {
            return Ok(value);
        }

        let mut entries = lock(&self.entries);
        if entries.contains_key(&key) {
            // Another caller computed the same key in the meantime.
            return Ok(value);
        }
        if entries.len() >= self.capacity {
            let evicted = entries.shift_remove_index(0);
            assert!(evicted.is_some(), "Sticky::get: [1]");
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::trace!("Cache full ({} entries); evicted oldest", self.capacity);
        }
        entries.insert(key, value.clone());
        Ok(value)
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently retained entries.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether no entry is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a value for `key` is retained.
    pub fn contains(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Drop every retained entry. Counters are left untouched.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Current hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<K, F> Func<K> for Sticky<K, F>
where
    K: Hash + Eq + Clone,
    F: Func<K>,
    F::Output: Clone,
{
    type Output = F::Output;
    type Error = F::Error;

    fn apply(&self, input: K) -> Result<F::Output, F::Error> {
        self.get(input)
    }
}

/// Lets a `Sticky` be wrapped in [`Synced`](crate::synced::Synced).
impl<K, F> FuncMut<K> for Sticky<K, F>
where
    K: Hash + Eq + Clone,
    F: Func<K>,
    F::Output: Clone,
{
    type Output = F::Output;
    type Error = F::Error;

    fn apply_mut(&mut self, input: K) -> Result<F::Output, F::Error> {
        self.get(input)
    }
}
