//! Ordered index: a span-annotated skip list.
//!
//! Every link carries the number of entries it jumps over, which lets
//! [`OrderedIndex::rank`] and [`OrderedIndex::get_by_rank`] run in expected
//! O(log n) without walking level 0.
//!
//! ```text
//! Level 2:  HEAD ──────────────(3)──────────────► 8 ──(0)──► TAIL
//! Level 1:  HEAD ──(1)──► 1 ──────(2)───────────► 8 ──(0)──► TAIL
//! Level 0:  HEAD ──(1)──► 1 ──(1)──► 3 ──(1)────► 8 ──(0)──► TAIL
//!                 ◄──────    ◄──────    ◄───────    ◄───────
//! ```
//!
//! Links into the tail carry the number of entries after their source, so
//! the level-0 spans always sum to `len()`.
//!
//! Duplicate keys are allowed. A new entry lands after every entry whose key
//! compares `<=`, so equal keys keep insertion order, and lookups (`get`,
//! `rank`, `remove`, `lower_bound`) address the earliest of them.

mod iter;
mod score;

pub use iter::Iter;
pub use score::Score;

use std::fmt;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use smallvec::SmallVec;
use tracing::trace;

use crate::arena::{Arena, NodeId};
use crate::config::{OrderedConfig, MAX_LEVELS};
use crate::error::Result;

const HEAD: NodeId = NodeId::new(0);
const TAIL: NodeId = NodeId::new(1);

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Copy, Debug)]
struct Link {
    next: NodeId,
    /// Entries skipped by following `next`, counting `next` itself.
    span: usize,
}

#[derive(Clone)]
struct Node<K, V> {
    /// `None` only for the two sentinels.
    entry: Option<(K, V)>,
    /// One link per level the node participates in.
    links: SmallVec<[Link; 2]>,
    /// Level-0 predecessor. Not an ownership edge.
    prev: NodeId,
}

/// Predecessor and its rank on every level, gathered while descending.
struct Path {
    preds: [NodeId; MAX_LEVELS],
    ranks: [usize; MAX_LEVELS],
}

impl Path {
    fn new() -> Self {
        Self {
            preds: [HEAD; MAX_LEVELS],
            ranks: [0; MAX_LEVELS],
        }
    }
}

// =============================================================================
// OrderedIndex
// =============================================================================

/// An ordered multimap with O(log n) rank queries.
///
/// ```rust
/// use kvindex::OrderedIndex;
///
/// let mut idx = OrderedIndex::with_seed(7);
/// idx.insert(3, "llo");
/// idx.insert(1, "he");
/// idx.insert(8, "world");
///
/// assert_eq!(idx.rank(&3), 2);
/// assert_eq!(idx.upper_bound(&3), Some((&8, &"world")));
/// let keys: Vec<_> = idx.iter().rev().map(|(k, _)| *k).collect();
/// assert_eq!(keys, [8, 3, 1]);
/// ```
#[derive(Clone)]
pub struct OrderedIndex<K, V> {
    nodes: Arena<Node<K, V>>,
    /// Highest populated level, 0-based.
    level: usize,
    len: usize,
    max_levels: usize,
    /// A level is added while a 16-bit draw falls below this.
    level_threshold: u32,
    rng: SmallRng,
}

impl<K: Ord, V> OrderedIndex<K, V> {
    /// Creates an empty index with default configuration, seeded from the OS.
    pub fn new() -> Self {
        Self::build(OrderedConfig::default())
    }

    /// Creates an empty index whose level draws are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(OrderedConfig {
            seed: Some(seed),
            ..OrderedConfig::default()
        })
    }

    pub fn with_config(config: OrderedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: OrderedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            nodes: Self::sentinels(config.max_level),
            level: 0,
            len: 0,
            max_levels: config.max_level,
            level_threshold: 0x1_0000 / config.level_ratio,
            rng,
        }
    }

    fn sentinels(max_levels: usize) -> Arena<Node<K, V>> {
        let mut nodes = Arena::new();
        let head = nodes.insert(Node {
            entry: None,
            links: (0..max_levels)
                .map(|_| Link { next: TAIL, span: 0 })
                .collect(),
            prev: HEAD,
        });
        let tail = nodes.insert(Node {
            entry: None,
            links: SmallVec::new(),
            prev: HEAD,
        });
        debug_assert_eq!((head, tail), (HEAD, TAIL));
        nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Highest populated level (0-based).
    #[inline]
    pub fn max_level(&self) -> usize {
        self.level
    }

    /// Approximate heap bytes held by the index.
    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage()
    }

    pub fn clear(&mut self) {
        self.nodes = Self::sentinels(self.max_levels);
        self.level = 0;
        self.len = 0;
    }

    // -------------------------------------------------------------------------
    // Node access
    // -------------------------------------------------------------------------

    #[inline]
    fn link(&self, id: NodeId, level: usize) -> Link {
        self.nodes[id].links[level]
    }

    #[inline]
    fn key(&self, id: NodeId) -> &K {
        match &self.nodes[id].entry {
            Some((key, _)) => key,
            None => panic!("sentinel {} has no key", id.index()),
        }
    }

    #[inline]
    fn entry(&self, id: NodeId) -> Option<(&K, &V)> {
        self.nodes[id].entry.as_ref().map(|(k, v)| (k, v))
    }

    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level + 1 < self.max_levels && (self.rng.next_u32() & 0xFFFF) < self.level_threshold
        {
            level += 1;
        }
        level
    }

    /// Descends from the top level, moving right while `advance(next_key)`
    /// holds. Returns the last node reached on level 0 and its rank.
    fn seek(&self, mut advance: impl FnMut(&K) -> bool) -> (NodeId, usize) {
        let mut x = HEAD;
        let mut rank = 0;
        for level in (0..=self.level).rev() {
            loop {
                let link = self.link(x, level);
                if link.next == TAIL || !advance(self.key(link.next)) {
                    break;
                }
                rank += link.span;
                x = link.next;
            }
        }
        (x, rank)
    }

    /// Like [`seek`](Self::seek), but records the stop node of every level.
    fn seek_path(&self, mut advance: impl FnMut(&K) -> bool, path: &mut Path) {
        let mut x = HEAD;
        let mut rank = 0;
        for level in (0..=self.level).rev() {
            loop {
                let link = self.link(x, level);
                if link.next == TAIL || !advance(self.key(link.next)) {
                    break;
                }
                rank += link.span;
                x = link.next;
            }
            path.preds[level] = x;
            path.ranks[level] = rank;
        }
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Inserts an entry after every existing entry with a key `<= key`.
    ///
    /// Always succeeds; duplicate keys are kept side by side.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let mut path = Path::new();
        self.seek_path(|k| k <= &key, &mut path);

        let level = self.random_level();
        if level > self.level {
            for l in self.level + 1..=level {
                path.preds[l] = HEAD;
                path.ranks[l] = 0;
                self.nodes[HEAD].links[l] = Link {
                    next: TAIL,
                    span: self.len,
                };
            }
            trace!(from = self.level, to = level, "ordered index raised top level");
            self.level = level;
        }

        let rank0 = path.ranks[0];
        let links: SmallVec<[Link; 2]> = (0..=level)
            .map(|l| {
                let pred = self.link(path.preds[l], l);
                Link {
                    next: pred.next,
                    span: pred.span - (rank0 - path.ranks[l]),
                }
            })
            .collect();
        let succ = links[0].next;
        let id = self.nodes.insert(Node {
            entry: Some((key, value)),
            links,
            prev: path.preds[0],
        });

        for l in 0..=level {
            self.nodes[path.preds[l]].links[l] = Link {
                next: id,
                span: rank0 - path.ranks[l] + 1,
            };
        }
        for l in level + 1..=self.level {
            self.nodes[path.preds[l]].links[l].span += 1;
        }
        self.nodes[succ].prev = id;
        self.len += 1;
        true
    }

    /// Removes the earliest entry with `key`, returning it.
    pub fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let mut path = Path::new();
        self.seek_path(|k| k < key, &mut path);

        let target = self.link(path.preds[0], 0).next;
        if target == TAIL || self.key(target) != key {
            return None;
        }

        let node = self.nodes.remove(target);
        for l in 0..=self.level {
            let link = &mut self.nodes[path.preds[l]].links[l];
            if link.next == target {
                let skipped = node.links[l];
                link.span = link.span + skipped.span - 1;
                link.next = skipped.next;
            } else {
                link.span -= 1;
            }
        }
        self.nodes[node.links[0].next].prev = path.preds[0];

        let top = self.level;
        while self.level > 0 && self.link(HEAD, self.level).next == TAIL {
            self.level -= 1;
        }
        if self.level != top {
            trace!(from = top, to = self.level, "ordered index lowered top level");
        }

        self.len -= 1;
        node.entry
    }

    /// Removes the earliest entry with `key`. Returns `false` if none exists.
    pub fn erase(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Smallest entry.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.entry(self.link(HEAD, 0).next)
    }

    /// Largest entry (the latest-inserted among equal largest keys).
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entry(self.nodes[TAIL].prev)
    }

    /// Value of the earliest entry with `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let (x, _) = self.seek(|k| k < key);
        match self.entry(self.link(x, 0).next) {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// First entry with a key `>= key`.
    pub fn lower_bound(&self, key: &K) -> Option<(&K, &V)> {
        match self.last() {
            Some((last, _)) if last >= key => {}
            _ => return None,
        }
        let (x, _) = self.seek(|k| k < key);
        self.entry(self.link(x, 0).next)
    }

    /// First entry with a key `> key`.
    pub fn upper_bound(&self, key: &K) -> Option<(&K, &V)> {
        match self.last() {
            Some((last, _)) if last > key => {}
            _ => return None,
        }
        let (x, _) = self.seek(|k| k <= key);
        self.entry(self.link(x, 0).next)
    }

    /// 1-based position of the earliest entry with `key`, or 0 if absent.
    pub fn rank(&self, key: &K) -> usize {
        let (x, rank) = self.seek(|k| k < key);
        let next = self.link(x, 0);
        if next.next != TAIL && self.key(next.next) == key {
            rank + next.span
        } else {
            0
        }
    }

    /// Entry at 1-based position `rank`.
    pub fn get_by_rank(&self, rank: usize) -> Option<(&K, &V)> {
        if rank == 0 || rank > self.len {
            return None;
        }
        let mut x = HEAD;
        let mut traversed = 0;
        for level in (0..=self.level).rev() {
            loop {
                let link = self.link(x, level);
                if link.next == TAIL || traversed + link.span > rank {
                    break;
                }
                traversed += link.span;
                x = link.next;
            }
            if traversed == rank {
                return self.entry(x);
            }
        }
        None
    }

    /// Whether `[min, max]` overlaps the stored keys at all.
    fn overlaps(&self, min: &K, max: &K) -> bool {
        if min > max {
            return false;
        }
        match (self.first(), self.last()) {
            (Some((first, _)), Some((last, _))) => min <= last && max >= first,
            _ => false,
        }
    }

    /// First entry with `min <= key <= max`.
    pub fn first_in_range(&self, min: &K, max: &K) -> Option<(&K, &V)> {
        if !self.overlaps(min, max) {
            return None;
        }
        let (x, _) = self.seek(|k| k < min);
        self.entry(self.link(x, 0).next).filter(|(k, _)| *k <= max)
    }

    /// Last entry with `min <= key <= max`.
    pub fn last_in_range(&self, min: &K, max: &K) -> Option<(&K, &V)> {
        if !self.overlaps(min, max) {
            return None;
        }
        let (x, _) = self.seek(|k| k <= max);
        self.entry(x).filter(|(k, _)| *k >= min)
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    /// Entries in key order. Use `.rev()` to walk backwards.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self, self.link(HEAD, 0).next, self.nodes[TAIL].prev, self.len)
    }

    /// Entries with `min <= key <= max`, in key order.
    pub fn range(&self, min: &K, max: &K) -> Iter<'_, K, V> {
        if !self.overlaps(min, max) {
            return Iter::new(self, TAIL, HEAD, 0);
        }
        let (before, before_rank) = self.seek(|k| k < min);
        let (back, back_rank) = self.seek(|k| k <= max);
        Iter::new(
            self,
            self.link(before, 0).next,
            back,
            back_rank.saturating_sub(before_rank),
        )
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: Ord, V> Default for OrderedIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for OrderedIndex<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a OrderedIndex<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Ord, V> Extend<(K, V)> for OrderedIndex<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for OrderedIndex<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut idx = Self::new();
        idx.extend(iter);
        idx
    }
}

// =============================================================================
// Structural validation (tests only)
// =============================================================================

#[cfg(test)]
impl<K: Ord + fmt::Debug, V> OrderedIndex<K, V> {
    /// Panics unless every level is sorted, spans match rank distances and
    /// back-links mirror level 0.
    pub(crate) fn validate(&self) {
        use std::collections::HashMap;

        assert_eq!(self.nodes.len(), self.len + 2, "arena holds stray nodes");

        let mut ranks: HashMap<NodeId, usize> = HashMap::new();
        ranks.insert(HEAD, 0);
        let mut prev = HEAD;
        let mut x = self.link(HEAD, 0).next;
        let mut rank = 0;
        while x != TAIL {
            rank += 1;
            assert_eq!(self.nodes[x].prev, prev, "back-link mismatch at rank {rank}");
            if prev != HEAD {
                assert!(self.key(prev) <= self.key(x), "level 0 out of order at rank {rank}");
            }
            ranks.insert(x, rank);
            prev = x;
            x = self.link(x, 0).next;
        }
        assert_eq!(rank, self.len, "level 0 length");
        assert_eq!(self.nodes[TAIL].prev, prev, "tail back-link");
        ranks.insert(TAIL, self.len);

        for level in 0..=self.level {
            let mut x = HEAD;
            let mut span_sum = 0;
            loop {
                let link = self.link(x, level);
                let expected = ranks[&link.next] - ranks[&x];
                assert_eq!(link.span, expected, "span at level {level}");
                span_sum += link.span;
                if link.next == TAIL {
                    break;
                }
                assert!(
                    self.nodes[link.next].links.len() > level,
                    "node linked above its height"
                );
                if x != HEAD {
                    assert!(self.key(x) <= self.key(link.next), "level {level} out of order");
                }
                x = link.next;
            }
            assert_eq!(span_sum, self.len, "spans at level {level} must cover the list");
        }

        if self.level > 0 {
            assert_ne!(self.link(HEAD, self.level).next, TAIL, "empty top level");
        }
    }
}
