use std::iter::FusedIterator;

use super::{OrderedIndex, TAIL};
use crate::arena::NodeId;

/// Double-ended iterator over a run of level-0 nodes.
///
/// Created by [`OrderedIndex::iter`] and [`OrderedIndex::range`].
pub struct Iter<'a, K, V> {
    index: &'a OrderedIndex<K, V>,
    front: NodeId,
    back: NodeId,
    remaining: usize,
}

impl<'a, K: Ord, V> Iter<'a, K, V> {
    pub(super) fn new(
        index: &'a OrderedIndex<K, V>,
        front: NodeId,
        back: NodeId,
        remaining: usize,
    ) -> Self {
        Self {
            index,
            front,
            back,
            remaining,
        }
    }
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front;
        debug_assert_ne!(id, TAIL);
        self.front = self.index.link(id, 0).next;
        self.remaining -= 1;
        self.index.entry(id)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: Ord, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back;
        self.back = self.index.nodes[id].prev;
        self.remaining -= 1;
        self.index.entry(id)
    }
}

impl<K: Ord, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K: Ord, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}
