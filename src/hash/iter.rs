use std::iter::FusedIterator;

use super::table::{Entry, Table};
use crate::arena::{Arena, NodeId};

/// Iterator over the entries of one table, bucket by bucket.
///
/// Created by [`HashIndex::iter`](super::HashIndex::iter).
pub struct Iter<'a, K, V> {
    entries: &'a Arena<Entry<K, V>>,
    buckets: &'a [Option<NodeId>],
    bucket: usize,
    chain: Option<NodeId>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(super) fn new(entries: &'a Arena<Entry<K, V>>, table: &'a Table, remaining: usize) -> Self {
        Self {
            entries,
            buckets: &table.buckets,
            bucket: 0,
            chain: None,
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            if let Some(id) = self.chain {
                let entry = &self.entries[id];
                self.chain = entry.next;
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            let head = self.buckets.get(self.bucket)?;
            self.chain = *head;
            self.bucket += 1;
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
            buckets: self.buckets,
            bucket: self.bucket,
            chain: self.chain,
            remaining: self.remaining,
        }
    }
}
