//! Thread-safe handles over the two engines.
//!
//! Both hand out cloned values so no lock guard escapes a call.
//! [`SharedHashIndex`] uses a mutex: even lookups advance a running resize
//! and need exclusive access. [`SharedOrderedIndex`] reads under a shared
//! lock.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};

use crate::config::{HashConfig, OrderedConfig};
use crate::error::Result;
use crate::hash::HashIndex;
use crate::ordered::OrderedIndex;

// =============================================================================
// SharedHashIndex
// =============================================================================

/// A [`HashIndex`] behind a [`Mutex`].
///
/// ```rust
/// use std::sync::Arc;
/// use kvindex::SharedHashIndex;
///
/// let idx = Arc::new(SharedHashIndex::new());
/// let handles: Vec<_> = (0..4u64)
///     .map(|t| {
///         let idx = Arc::clone(&idx);
///         std::thread::spawn(move || {
///             for i in 0..100 {
///                 idx.insert(t * 100 + i, i);
///             }
///         })
///     })
///     .collect();
/// for h in handles {
///     h.join().unwrap();
/// }
/// assert_eq!(idx.len(), 400);
/// assert_eq!(idx.get(&205), Some(5));
/// ```
pub struct SharedHashIndex<K, V, S = RandomState> {
    inner: Mutex<HashIndex<K, V, S>>,
}

impl<K: Hash + Eq, V> SharedHashIndex<K, V, RandomState> {
    pub fn new() -> Self {
        Self::from_index(HashIndex::new())
    }

    pub fn with_config(config: HashConfig) -> Result<Self> {
        Ok(Self::from_index(HashIndex::with_config(config)?))
    }
}

impl<K, V, S> SharedHashIndex<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn from_index(index: HashIndex<K, V, S>) -> Self {
        Self {
            inner: Mutex::new(index),
        }
    }

    pub fn into_inner(self) -> HashIndex<K, V, S> {
        self.inner.into_inner()
    }

    /// Returns the previous value if the key already existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.lock().insert(key, value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.lock().get(key).ok().cloned()
    }

    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().exists(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().remove(key)
    }

    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().erase(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One [`HashIndex::scan`] step with owned results. The lock is released
    /// between calls, so other threads may mutate mid-pass.
    pub fn scan(&self, cursor: u64) -> (u64, Vec<(K, V)>)
    where
        K: Clone,
        V: Clone,
    {
        let inner = self.inner.lock();
        let mut batch = Vec::new();
        let next = inner.scan_with(cursor, |k, v| batch.push((k.clone(), v.clone())));
        (next, batch)
    }

    /// Runs `f` with exclusive access to the index.
    pub fn with<R>(&self, f: impl FnOnce(&mut HashIndex<K, V, S>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<K: Hash + Eq, V> Default for SharedHashIndex<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SharedOrderedIndex
// =============================================================================

/// An [`OrderedIndex`] behind a [`RwLock`].
pub struct SharedOrderedIndex<K, V> {
    inner: RwLock<OrderedIndex<K, V>>,
}

impl<K: Ord, V> SharedOrderedIndex<K, V> {
    pub fn new() -> Self {
        Self::from_index(OrderedIndex::new())
    }

    pub fn with_config(config: OrderedConfig) -> Result<Self> {
        Ok(Self::from_index(OrderedIndex::with_config(config)?))
    }

    pub fn from_index(index: OrderedIndex<K, V>) -> Self {
        Self {
            inner: RwLock::new(index),
        }
    }

    pub fn into_inner(self) -> OrderedIndex<K, V> {
        self.inner.into_inner()
    }

    pub fn insert(&self, key: K, value: V) -> bool {
        self.inner.write().insert(key, value)
    }

    pub fn erase(&self, key: &K) -> bool {
        self.inner.write().erase(key)
    }

    pub fn remove(&self, key: &K) -> Option<(K, V)> {
        self.inner.write().remove(key)
    }

    pub fn rank(&self, key: &K) -> usize {
        self.inner.read().rank(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&OrderedIndex<K, V>) -> R) -> R {
        f(&self.inner.read())
    }
}

impl<K: Ord + Clone, V: Clone> SharedOrderedIndex<K, V> {
    pub fn lower_bound(&self, key: &K) -> Option<(K, V)> {
        let inner = self.inner.read();
        inner.lower_bound(key).map(|(k, v)| (k.clone(), v.clone()))
    }

    pub fn upper_bound(&self, key: &K) -> Option<(K, V)> {
        let inner = self.inner.read();
        inner.upper_bound(key).map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Entries with `min <= key <= max`, in key order.
    pub fn range(&self, min: &K, max: &K) -> Vec<(K, V)> {
        let inner = self.inner.read();
        inner
            .range(min, max)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Ord, V> Default for SharedOrderedIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_hash_basic_operations() {
        let idx: SharedHashIndex<String, u64> = SharedHashIndex::new();
        assert!(idx.insert("key1".into(), 1).is_none());
        assert!(idx.insert("key2".into(), 2).is_none());
        assert_eq!(idx.insert("key1".into(), 10), Some(1));

        assert_eq!(idx.get("key1"), Some(10));
        assert_eq!(idx.get("key3"), None);
        assert!(idx.exists("key2"));
        assert_eq!(idx.len(), 2);

        assert_eq!(idx.remove("key1"), Some(10));
        assert!(!idx.erase("key1"));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.with(|inner| inner.bucket_count()), 4);
    }

    #[test]
    fn test_hash_concurrent_writers() {
        let idx = Arc::new(SharedHashIndex::new());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let idx = Arc::clone(&idx);
                thread::spawn(move || {
                    for i in 0..500 {
                        idx.insert(t * 1000 + i, t);
                        if i % 3 == 0 {
                            idx.erase(&(t * 1000 + i));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 167 of every 500 keys were erased.
        assert_eq!(idx.len(), 8 * 333);
        let mut idx = Arc::try_unwrap(idx).ok().unwrap().into_inner();
        idx.validate();
        assert_eq!(idx.get(&7001), Ok(&7));
    }

    #[test]
    fn test_hash_scan_while_writing() {
        let idx = Arc::new(SharedHashIndex::new());
        for k in 0..1000u32 {
            idx.insert(k, ());
        }

        let writer = {
            let idx = Arc::clone(&idx);
            thread::spawn(move || {
                for k in 1000..3000u32 {
                    idx.insert(k, ());
                }
            })
        };

        let mut seen = std::collections::HashSet::new();
        let mut cursor = 0;
        loop {
            let (next, batch) = idx.scan(cursor);
            seen.extend(batch.into_iter().map(|(k, _)| k));
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        writer.join().unwrap();
        assert!((0..1000).all(|k| seen.contains(&k)));
    }

    #[test]
    fn test_ordered_readers_and_writers() {
        let idx = Arc::new(SharedOrderedIndex::new());
        let writers: Vec<_> = (0..4i64)
            .map(|t| {
                let idx = Arc::clone(&idx);
                thread::spawn(move || {
                    for i in 0..250 {
                        idx.insert(i * 4 + t, t);
                    }
                })
            })
            .collect();
        for h in writers {
            h.join().unwrap();
        }

        assert_eq!(idx.len(), 1000);
        assert_eq!(idx.rank(&0), 1);
        assert_eq!(idx.rank(&999), 1000);
        assert_eq!(idx.lower_bound(&500), Some((500, 0)));
        assert_eq!(idx.upper_bound(&500), Some((501, 1)));
        assert_eq!(idx.range(&10, &13), [(10, 2), (11, 3), (12, 0), (13, 1)]);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let idx = Arc::clone(&idx);
                thread::spawn(move || idx.read(|inner| inner.get_by_rank(42).map(|(k, _)| *k)))
            })
            .collect();
        for h in readers {
            assert_eq!(h.join().unwrap(), Some(41));
        }

        assert_eq!(idx.remove(&0), Some((0, 0)));
        assert!(!idx.erase(&0));
        let idx = Arc::try_unwrap(idx).ok().unwrap().into_inner();
        idx.validate();
    }
}
