use std::borrow::Borrow;

use crate::arena::{Arena, NodeId};

/// A chained entry. Chains are singly linked through the entry arena.
#[derive(Clone)]
pub(super) struct Entry<K, V> {
    pub(super) key: K,
    pub(super) value: V,
    pub(super) next: Option<NodeId>,
}

/// Power-of-two array of chain heads. Entries themselves live in the
/// index's arena, so moving an entry between tables is a relink.
#[derive(Clone)]
pub(super) struct Table {
    pub(super) buckets: Box<[Option<NodeId>]>,
    pub(super) len: usize,
}

impl Table {
    pub(super) fn new(bucket_count: usize) -> Self {
        assert!(
            bucket_count.is_power_of_two(),
            "bucket count {bucket_count} is not a power of two"
        );
        Self {
            buckets: vec![None; bucket_count].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    pub(super) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(super) fn mask(&self) -> usize {
        self.buckets.len() - 1
    }

    #[inline]
    pub(super) fn bucket_of(&self, hash: u64) -> usize {
        hash as usize & self.mask()
    }

    pub(super) fn find<K, V, Q>(
        &self,
        entries: &Arena<Entry<K, V>>,
        hash: u64,
        key: &Q,
    ) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut cur = self.buckets[self.bucket_of(hash)];
        while let Some(id) = cur {
            let entry = &entries[id];
            let candidate: &Q = entry.key.borrow();
            if candidate == key {
                return Some(id);
            }
            cur = entry.next;
        }
        None
    }

    /// Links `id` in at the head of its bucket.
    pub(super) fn push_front<K, V>(
        &mut self,
        entries: &mut Arena<Entry<K, V>>,
        hash: u64,
        id: NodeId,
    ) {
        let bucket = self.bucket_of(hash);
        entries[id].next = self.buckets[bucket];
        self.buckets[bucket] = Some(id);
        self.len += 1;
    }

    /// Detaches the entry matching `key` from its chain without freeing it.
    pub(super) fn unlink<K, V, Q>(
        &mut self,
        entries: &mut Arena<Entry<K, V>>,
        hash: u64,
        key: &Q,
    ) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let bucket = self.bucket_of(hash);
        let mut prev: Option<NodeId> = None;
        let mut cur = self.buckets[bucket];
        while let Some(id) = cur {
            let next = entries[id].next;
            let candidate: &Q = entries[id].key.borrow();
            if candidate == key {
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(p) => entries[p].next = next,
                }
                entries[id].next = None;
                self.len -= 1;
                return Some(id);
            }
            prev = Some(id);
            cur = next;
        }
        None
    }

    /// Calls `f` on every entry chained in `bucket`.
    pub(super) fn for_each_in<'a, K, V>(
        &self,
        entries: &'a Arena<Entry<K, V>>,
        bucket: usize,
        mut f: impl FnMut(&'a K, &'a V),
    ) {
        let mut cur = self.buckets[bucket];
        while let Some(id) = cur {
            let entry = &entries[id];
            f(&entry.key, &entry.value);
            cur = entry.next;
        }
    }

    pub(super) fn chain_len<K, V>(&self, entries: &Arena<Entry<K, V>>, bucket: usize) -> usize {
        let mut n = 0;
        self.for_each_in(entries, bucket, |_, _| n += 1);
        n
    }
}
