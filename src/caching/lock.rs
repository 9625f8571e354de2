//! Lock helpers that survive poisoning.
//!
//! A panicking stage must not take the shared cache down with it, so every
//! guard acquisition recovers the inner state and leaves a warning behind.

use std::sync::{LockResult, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(
    result: LockResult<G>,
    lock_kind: &'static str,
    target: &'static str,
    op: &'static str,
) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            lock_kind,
            result = "poisoned_recovered",
            hint = "entries may be stale after a panic in another thread",
            "Recovered from poisoned lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn read<'a, T: ?Sized>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), "rwlock.read", target, op)
}

pub(crate) fn write<'a, T: ?Sized>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), "rwlock.write", target, op)
}

pub(crate) fn lock<'a, T: ?Sized>(
    mutex: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(mutex.lock(), "mutex.lock", target, op)
}
