//! Keyed mutual exclusion for attach/detach sequences.
//!
//! Two sequences for the same global mount path must not interleave (duplicate directory
//! creation, inconsistent mount-point observation). The lifecycle manager does not lock on its
//! own; callers that may race wrap their calls in [`VolumeLocks::with_lock`].

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

static GLOBAL_LOCKS: Lazy<VolumeLocks> = Lazy::new(VolumeLocks::new);

#[derive(Debug, Default)]
pub struct VolumeLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl VolumeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static VolumeLocks {
        &GLOBAL_LOCKS
    }

    /// Run `f` while holding the lock for `key`. Distinct keys never block each other.
    pub fn with_lock<R>(&self, key: &Path, f: impl FnOnce() -> R) -> R {
        let entry = {
            let mut locks = lock_ignoring_poison(&self.locks);
            locks
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let release = Release {
            locks: self,
            key,
            entry: Some(entry),
        };
        let _guard = release.entry.as_deref().map(lock_ignoring_poison);
        f()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        lock_ignoring_poison(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Prunes the key on drop, including while unwinding out of a panicking closure.
struct Release<'a> {
    locks: &'a VolumeLocks,
    key: &'a Path,
    entry: Option<Arc<Mutex<()>>>,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        let mut locks = lock_ignoring_poison(&self.locks.locks);
        drop(self.entry.take());
        // Drop the entry once nobody else is holding or waiting on it.
        if let Some(existing) = locks.get(self.key) {
            if Arc::strong_count(existing) == 1 {
                locks.remove(self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_key_is_serialized() {
        let locks = Arc::new(VolumeLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.with_lock(Path::new("/mounts/vol-1"), || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn distinct_keys_do_not_block() {
        let locks = VolumeLocks::new();
        let value = locks.with_lock(Path::new("/mounts/vol-1"), || {
            // Re-entering with another key while holding the first must not deadlock.
            locks.with_lock(Path::new("/mounts/vol-2"), || 7)
        });
        assert_eq!(value, 7);
        assert!(locks.is_empty());
    }

    #[test]
    fn panicking_closure_does_not_poison_key() {
        let locks = Arc::new(VolumeLocks::new());
        let cloned = Arc::clone(&locks);
        let _ = thread::spawn(move || {
            cloned.with_lock(Path::new("/mounts/vol-1"), || panic!("boom"))
        })
        .join();

        assert!(locks.is_empty());
        assert_eq!(locks.with_lock(Path::new("/mounts/vol-1"), || 1), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn global_registry_is_shared() {
        let key = Path::new("/mounts/global-registry-test");
        let value = VolumeLocks::global().with_lock(key, || {
            assert!(!VolumeLocks::global().is_empty());
            3
        });
        assert_eq!(value, 3);
    }
}
