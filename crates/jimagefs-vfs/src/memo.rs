//! Compute-once concurrent map.
//!
//! Each key owns an `Arc<OnceLock<V>>` cell. The map shard is only locked
//! long enough to fetch or insert the cell; the value is computed outside
//! the shard lock, so callers for the same key wait on each other while
//! callers for other keys proceed.

use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

/// Concurrent map whose values are computed at most once per key.
#[derive(Debug)]
pub struct OnceMap<K, V>
where
    K: Eq + Hash,
{
    cells: DashMap<K, Arc<OnceLock<V>>>,
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, computing it with `init` on first use.
    ///
    /// Concurrent first calls for the same key run `init` once; the others
    /// block until it completes and observe its result.
    pub fn get_or_init(&self, key: &K, init: impl FnOnce() -> V) -> V {
        let cell = Arc::clone(&self.cells.entry(key.clone()).or_default());
        cell.get_or_init(init).clone()
    }

    /// Returns the value for `key` if it has already been computed.
    pub fn get(&self, key: &K) -> Option<V> {
        let cell = self.cells.get(key).map(|entry| Arc::clone(&entry))?;
        cell.get().cloned()
    }

    /// Drops every entry. Computations already in flight finish into their
    /// detached cells.
    pub fn clear(&self) {
        self.cells.clear();
    }

    /// Number of keys with a cell.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if no key has a cell.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn value_is_computed_once() {
        let map = OnceMap::<String, usize>::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = map.get_or_init(&"a".to_string(), || {
                let _ = calls.fetch_add(1, Ordering::SeqCst);
                7
            });
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn absent_results_are_cached_too() {
        let map = OnceMap::<u32, Option<u32>>::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            assert_eq!(
                map.get_or_init(&1, || {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    None
                }),
                None
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_calls_share_one_computation() {
        let map = OnceMap::<u32, u32>::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);
        thread::scope(|s| {
            for _ in 0..8 {
                let _ = s.spawn(|| {
                    let _ = barrier.wait();
                    let value = map.get_or_init(&42, || {
                        let _ = calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        99
                    });
                    assert_eq!(value, 99);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slow_key_does_not_block_other_keys() {
        let map = OnceMap::<u32, u32>::new();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let shared = &map;
        thread::scope(|s| {
            let _ = s.spawn(move || {
                shared.get_or_init(&1, || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    1
                })
            });
            started_rx.recv().unwrap();
            assert_eq!(map.get_or_init(&2, || 2), 2);
            release_tx.send(()).unwrap();
        });
        assert_eq!(map.get(&1), Some(1));
    }

    #[test]
    fn clear_forgets_values() {
        let map = OnceMap::<u32, u32>::new();
        let _ = map.get_or_init(&1, || 1);
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.get(&1), None);
        assert_eq!(map.get_or_init(&1, || 2), 2);
    }
}
