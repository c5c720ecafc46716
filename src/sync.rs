#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::{
        cell::UnsafeCell,
        sync::{
            Mutex, MutexGuard,
            atomic::{AtomicU64, Ordering},
        },
    };
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::{
        cell::UnsafeCell,
        sync::atomic::{AtomicU64, Ordering},
    };
    pub(crate) use std::sync::{Mutex, MutexGuard};

    /// Mirrors the closure-based access of `loom::cell::UnsafeCell`.
    pub(crate) trait LoomUnsafeCellCompat<T> {
        fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R;
    }

    impl<T> LoomUnsafeCellCompat<T> for UnsafeCell<T> {
        #[inline]
        fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
            f(self.get())
        }
    }
}

pub(crate) use imp::*;
use std::sync::PoisonError;

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate either guards no data or leaves the
/// guarded data consistent after each single operation, so poisoning carries
/// no information worth propagating.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
