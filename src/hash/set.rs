use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use ahash::RandomState;

use super::HashIndex;
use crate::config::HashConfig;
use crate::error::Result;

/// A set of keys on top of [`HashIndex`], sharing its incremental resize
/// and scan behavior.
#[derive(Clone)]
pub struct KeySet<K, S = RandomState> {
    inner: HashIndex<K, (), S>,
}

impl<K: Hash + Eq> KeySet<K, RandomState> {
    pub fn new() -> Self {
        Self {
            inner: HashIndex::new(),
        }
    }

    pub fn with_config(config: HashConfig) -> Result<Self> {
        Ok(Self {
            inner: HashIndex::with_config(config)?,
        })
    }
}

impl<K, S> KeySet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: HashIndex::with_hasher(hasher),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: K) -> bool {
        self.inner.insert(key, ()).is_none()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.erase(key)
    }

    pub fn contains<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.exists(key)
    }

    /// Returns the stored key equal to `key`.
    pub fn get<Q>(&mut self, key: &Q) -> Result<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get_key_value(key).map(|(k, _)| k)
    }

    pub fn iter(&mut self) -> impl Iterator<Item = &K> + '_ {
        self.inner.keys()
    }

    /// See [`HashIndex::scan`].
    pub fn scan(&self, cursor: u64) -> (u64, Vec<&K>) {
        let mut batch = Vec::new();
        let next = self.inner.scan_with(cursor, |k, _| batch.push(k));
        (next, batch)
    }
}

impl<K: Hash + Eq> Default for KeySet<K, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> fmt::Debug for KeySet<K, S>
where
    K: Hash + Eq + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.iter_raw().map(|(k, _)| k)).finish()
    }
}

impl<K, S> FromIterator<K> for KeySet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(|k| (k, ())).collect(),
        }
    }
}
