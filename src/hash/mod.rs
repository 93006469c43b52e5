//! Hash index with incremental rehashing.
//!
//! Resizing never happens in one pass. When the load crosses a threshold a
//! second table is allocated and every subsequent `insert`, `erase`, `get` or
//! `exists` migrates a bounded number of buckets into it, so the cost of a
//! resize is spread across the operations that follow the trigger.
//!
//! While a resize is running, buckets below the rehash cursor live in the
//! target table and the rest still live in the active table. Lookups probe
//! the target first and fall back to the active table. Once the cursor passes
//! the last active bucket the tables swap and the old one is dropped whole.
//!
//! [`HashIndex::scan`] walks the index with a reverse-binary cursor that stays
//! valid across resizes, so callers can page through a large index without
//! forcing the migration to finish.

mod iter;
mod scan;
mod set;
mod table;

pub use iter::Iter;
pub use set::KeySet;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use ahash::RandomState;
use tracing::{debug, trace};

use crate::arena::{Arena, NodeId};
use crate::config::{HashConfig, RehashStep};
use crate::error::{Error, Result};

use table::{Entry, Table};

#[derive(Clone)]
enum Phase {
    Stable,
    Resizing {
        /// Next active-table bucket awaiting migration.
        cursor: usize,
        target: Table,
    },
}

/// Snapshot of the index layout, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashStats {
    pub len: usize,
    /// Bucket count of the active table.
    pub buckets: usize,
    /// Bucket count of the target table while resizing.
    pub target_buckets: Option<usize>,
    pub rehash_cursor: Option<usize>,
    /// Longest chain across both tables.
    pub longest_chain: usize,
}

/// An unordered map that resizes in small steps.
///
/// ```rust
/// use kvindex::{Error, HashIndex};
///
/// let mut idx = HashIndex::new();
/// idx.insert("hello".to_string(), 1);
/// idx.insert("world".to_string(), 2);
///
/// assert_eq!(idx.get("hello"), Ok(&1));
/// assert!(idx.erase("hello"));
/// assert_eq!(idx.get("hello"), Err(Error::NotFound));
///
/// let mut cursor = 0;
/// let mut seen = Vec::new();
/// loop {
///     let (next, batch) = idx.scan(cursor);
///     seen.extend(batch.into_iter().map(|(k, _)| k.clone()));
///     cursor = next;
///     if cursor == 0 {
///         break;
///     }
/// }
/// assert_eq!(seen, ["world"]);
/// ```
#[derive(Clone)]
pub struct HashIndex<K, V, S = RandomState> {
    entries: Arena<Entry<K, V>>,
    active: Table,
    phase: Phase,
    config: HashConfig,
    hasher: S,
}

impl<K, V> HashIndex<K, V, RandomState>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::build(HashConfig::default(), RandomState::new())
    }

    pub fn with_config(config: HashConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V, S> HashIndex<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(HashConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: HashConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(mut config: HashConfig, hasher: S) -> Self {
        config.min_buckets = config.min_buckets.next_power_of_two();
        Self {
            entries: Arena::with_capacity(config.min_buckets),
            active: Table::new(config.min_buckets),
            phase: Phase::Stable,
            config,
            hasher,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket count of the active table.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.active.bucket_count()
    }

    #[inline]
    pub fn is_rehashing(&self) -> bool {
        matches!(self.phase, Phase::Resizing { .. })
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Approximate heap bytes held by the index.
    pub fn memory_usage(&self) -> usize {
        let target = match &self.phase {
            Phase::Resizing { target, .. } => target.bucket_count(),
            Phase::Stable => 0,
        };
        self.entries.memory_usage()
            + (self.active.bucket_count() + target) * std::mem::size_of::<Option<NodeId>>()
    }

    pub fn stats(&self) -> HashStats {
        let longest = |table: &Table| {
            (0..table.bucket_count())
                .map(|b| table.chain_len(&self.entries, b))
                .max()
                .unwrap_or(0)
        };
        let (target_buckets, rehash_cursor, target_longest) = match &self.phase {
            Phase::Resizing { cursor, target } => {
                (Some(target.bucket_count()), Some(*cursor), longest(target))
            }
            Phase::Stable => (None, None, 0),
        };
        HashStats {
            len: self.len(),
            buckets: self.active.bucket_count(),
            target_buckets,
            rehash_cursor,
            longest_chain: longest(&self.active).max(target_longest),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = Table::new(self.config.min_buckets);
        self.phase = Phase::Stable;
    }

    // -------------------------------------------------------------------------
    // Rehashing
    // -------------------------------------------------------------------------

    #[inline]
    fn hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    fn needs_grow(&self) -> bool {
        self.active.len as f64 > self.active.bucket_count() as f64 * self.config.load_factor
    }

    fn needs_shrink(&self) -> bool {
        let len = self.active.len;
        let buckets = self.active.bucket_count();
        len > self.config.min_buckets
            && (len as f64) < buckets as f64 * self.config.shrink_factor
            && self.target_size(len) < buckets
    }

    /// Smallest power of two that holds `len` entries under the load factor.
    fn target_size(&self, len: usize) -> usize {
        let needed = (len as f64 / self.config.load_factor).ceil() as usize;
        needed.next_power_of_two().max(self.config.min_buckets)
    }

    /// Starts a resize if the active table crossed a threshold.
    fn begin_resize_if_due(&mut self) -> bool {
        if self.is_rehashing() {
            return true;
        }
        if !(self.needs_grow() || self.needs_shrink()) {
            return false;
        }

        let from = self.active.bucket_count();
        let to = self.target_size(self.active.len);
        debug_assert_ne!(from, to);
        debug!(
            len = self.active.len,
            from,
            to,
            direction = if to > from { "grow" } else { "shrink" },
            "hash index resize started"
        );
        self.phase = Phase::Resizing {
            cursor: 0,
            target: Table::new(to),
        };
        true
    }

    /// Buckets to migrate per triggering operation.
    fn configured_step(&self) -> usize {
        match self.config.rehash_step {
            RehashStep::Fixed(n) => n,
            RehashStep::Full => self.active.bucket_count(),
            RehashStep::Auto => {
                let old = self.active.bucket_count();
                let new = match &self.phase {
                    Phase::Resizing { target, .. } => target.bucket_count(),
                    Phase::Stable => old,
                };
                let ratio = old.max(new) / old.min(new);
                old.div_ceil(ratio)
            }
        }
    }

    /// Moves up to `steps` active buckets into the target table.
    fn migrate(&mut self, steps: usize) {
        let Phase::Resizing { cursor, target } = &mut self.phase else {
            return;
        };

        let start = *cursor;
        let end = start.saturating_add(steps).min(self.active.bucket_count());
        let mut moved = 0;
        for bucket in start..end {
            let mut cur = self.active.buckets[bucket].take();
            while let Some(id) = cur {
                let entry = &mut self.entries[id];
                cur = entry.next.take();
                let hash = self.hasher.hash_one(&entry.key);
                target.push_front(&mut self.entries, hash, id);
                moved += 1;
            }
        }
        self.active.len -= moved;
        *cursor = end;
        trace!(from = start, to = end, moved, "hash index rehash step");

        if end == self.active.bucket_count() {
            let Phase::Resizing { target, .. } = std::mem::replace(&mut self.phase, Phase::Stable)
            else {
                unreachable!()
            };
            debug_assert_eq!(self.active.len, 0, "entries left behind in the old table");
            let old = std::mem::replace(&mut self.active, target);
            debug!(
                len = self.active.len,
                from = old.bucket_count(),
                to = self.active.bucket_count(),
                "hash index resize finished"
            );
        }
    }

    /// Runs the per-operation rehash work: start a resize if a threshold was
    /// crossed, then advance a running one by the configured step.
    fn maintain(&mut self) {
        if self.begin_resize_if_due() {
            let steps = self.configured_step();
            self.migrate(steps);
        }
    }

    /// Migrates up to `buckets` buckets, starting a resize first if one is
    /// due. Returns whether a resize is still in progress.
    pub fn rehash_step(&mut self, buckets: usize) -> bool {
        if self.begin_resize_if_due() {
            self.migrate(buckets);
        }
        self.is_rehashing()
    }

    /// Completes any running resize in one go.
    pub fn finish_rehash(&mut self) {
        self.migrate(usize::MAX);
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    fn find<Q>(&self, hash: u64, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        if let Phase::Resizing { target, .. } = &self.phase {
            if let Some(id) = target.find(&self.entries, hash, key) {
                return Some(id);
            }
        }
        self.active.find(&self.entries, hash, key)
    }

    /// Inserts or replaces, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.maintain();
        let hash = self.hash(&key);
        if let Some(id) = self.find(hash, &key) {
            return Some(std::mem::replace(&mut self.entries[id].value, value));
        }

        let id = self.entries.insert(Entry {
            key,
            value,
            next: None,
        });
        let table = match &mut self.phase {
            Phase::Resizing { target, .. } => target,
            Phase::Stable => &mut self.active,
        };
        table.push_front(&mut self.entries, hash, id);
        None
    }

    pub fn get<Q>(&mut self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&mut self, key: &Q) -> Result<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.maintain();
        let id = self.find(self.hash(key), key).ok_or(Error::NotFound)?;
        let entry = &self.entries[id];
        Ok((&entry.key, &entry.value))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.maintain();
        let id = self.find(self.hash(key), key).ok_or(Error::NotFound)?;
        Ok(&mut self.entries[id].value)
    }

    pub fn exists<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.maintain();
        self.find(self.hash(key), key).is_some()
    }

    /// Read-only lookup that leaves any running resize untouched.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(self.hash(key), key).map(|id| &self.entries[id].value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.maintain();
        let hash = self.hash(key);
        let mut id = None;
        if let Phase::Resizing { target, .. } = &mut self.phase {
            id = target.unlink(&mut self.entries, hash, key);
        }
        let id = match id {
            Some(id) => id,
            None => self.active.unlink(&mut self.entries, hash, key)?,
        };
        Some(self.entries.remove(id).value)
    }

    /// Removes `key`. Returns `false` if it was absent.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key).is_some()
    }

    // -------------------------------------------------------------------------
    // Iteration and scanning
    // -------------------------------------------------------------------------

    /// Iterates every entry. Finishes any running resize first, so the walk
    /// covers a single table.
    pub fn iter(&mut self) -> Iter<'_, K, V> {
        self.finish_rehash();
        Iter::new(&self.entries, &self.active, self.len())
    }

    pub fn keys(&mut self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&mut self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Walks both tables without touching the resize state.
    fn iter_raw(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let target = match &self.phase {
            Phase::Resizing { target, .. } => Some(Iter::new(&self.entries, target, target.len)),
            Phase::Stable => None,
        };
        Iter::new(&self.entries, &self.active, self.active.len).chain(target.into_iter().flatten())
    }

    /// Visits the entries addressed by `cursor` and returns the cursor for
    /// the next call. A full pass starts at 0 and ends when 0 comes back.
    ///
    /// Every entry present for the whole pass is visited at least once, even
    /// if the index resizes between calls. Entries may be visited twice.
    pub fn scan_with<'a>(&'a self, cursor: u64, mut f: impl FnMut(&'a K, &'a V)) -> u64 {
        let mut v = cursor;
        match &self.phase {
            Phase::Stable => {
                let mask = self.active.mask() as u64;
                self.active.for_each_in(&self.entries, (v & mask) as usize, &mut f);
                v = scan::advance(v, mask);
            }
            Phase::Resizing { target, .. } => {
                let (small, large) = if target.bucket_count() < self.active.bucket_count() {
                    (target, &self.active)
                } else {
                    (&self.active, target)
                };
                let (m0, m1) = (small.mask() as u64, large.mask() as u64);

                small.for_each_in(&self.entries, (v & m0) as usize, &mut f);
                loop {
                    large.for_each_in(&self.entries, (v & m1) as usize, &mut f);
                    v = scan::advance(v, m1);
                    if v & (m0 ^ m1) == 0 {
                        break;
                    }
                }
            }
        }
        v
    }

    /// Collecting form of [`scan_with`](Self::scan_with).
    pub fn scan(&self, cursor: u64) -> (u64, Vec<(&K, &V)>) {
        let mut batch = Vec::new();
        let next = self.scan_with(cursor, |k, v| batch.push((k, v)));
        (next, batch)
    }
}

impl<K, V> Default for HashIndex<K, V, RandomState>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for HashIndex<K, V, S>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_raw()).finish()
    }
}

impl<K, V, S> PartialEq for HashIndex<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter_raw().all(|(k, v)| other.peek(k) == Some(v))
    }
}

impl<K, V, S> Extend<(K, V)> for HashIndex<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashIndex<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut idx = Self::with_hasher(S::default());
        idx.extend(iter);
        idx
    }
}

// =============================================================================
// Structural validation (tests only)
// =============================================================================

#[cfg(test)]
impl<K, V, S> HashIndex<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Panics unless every entry sits in the bucket its hash selects, counts
    /// add up, and nothing migrated is left below the cursor.
    pub(crate) fn validate(&self) {
        let check = |table: &Table, skip_below: usize| {
            let mut n = 0;
            for bucket in 0..table.bucket_count() {
                if bucket < skip_below {
                    assert!(table.buckets[bucket].is_none(), "migrated bucket {bucket} not empty");
                }
                table.for_each_in(&self.entries, bucket, |k, _| {
                    assert_eq!(table.bucket_of(self.hash(k)), bucket, "entry in wrong bucket");
                    n += 1;
                });
            }
            assert_eq!(n, table.len, "table length");
            n
        };

        let mut total = 0;
        match &self.phase {
            Phase::Stable => total += check(&self.active, 0),
            Phase::Resizing { cursor, target } => {
                assert!(*cursor < self.active.bucket_count(), "cursor past the active table");
                total += check(&self.active, *cursor);
                total += check(target, 0);
            }
        }
        assert_eq!(total, self.entries.len(), "arena holds stray entries");
        assert!(self.active.bucket_count() >= self.config.min_buckets);
    }
}
