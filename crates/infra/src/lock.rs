//! Keyed mutual exclusion for read-validate-write sequences.
//!
//! One lock per key, created on demand and dropped again once nobody holds or
//! waits on it. Different keys never contend.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &K, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };

        let result = {
            // The mutex guards no data, so a poisoned lock is still usable.
            let _guard = slot.lock().unwrap_or_else(|p| p.into_inner());
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        drop(slot);
        if locks.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
            locks.remove(key);
        }
        result
    }

    /// Keys with a live lock (held or awaited).
    pub fn active(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<u32>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (locks, inside, max_seen) = (locks.clone(), inside.clone(), max_seen.clone());
                thread::spawn(move || {
                    locks.with_lock(&7, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn returns_closure_result_and_releases_slot() {
        let locks = KeyedLocks::new();
        assert_eq!(locks.with_lock(&"a", || 41 + 1), 42);
        assert_eq!(locks.active(), 0);
    }
}
