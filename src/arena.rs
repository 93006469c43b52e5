//! Slot arena shared by both engines.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`] instead of
//! pointers. Freed slots are threaded onto an intrusive free list and reused
//! by the next allocation, so ids stay stable for the lifetime of a node.

use std::ops::{Index, IndexMut};

/// Stable 32-bit handle to a node in an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone)]
enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<NodeId> },
}

#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<NodeId>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> NodeId {
        self.len += 1;
        if let Some(id) = self.free_head {
            let slot = &mut self.slots[id.index()];
            match *slot {
                Slot::Vacant { next_free } => self.free_head = next_free,
                Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
            }
            *slot = Slot::Occupied(value);
            return id;
        }

        assert!(self.slots.len() < u32::MAX as usize, "arena exhausted");
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot::Occupied(value));
        id
    }

    /// Frees `id` and hands back its value.
    ///
    /// Panics if the slot is already vacant: a dangling id means the owning
    /// structure is corrupt.
    pub(crate) fn remove(&mut self, id: NodeId) -> T {
        let slot = std::mem::replace(
            &mut self.slots[id.index()],
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        match slot {
            Slot::Occupied(value) => {
                self.free_head = Some(id);
                self.len -= 1;
                value
            }
            Slot::Vacant { .. } => panic!("double free of arena slot {}", id.index()),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        match self.slots.get(id.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }

    /// Approximate heap bytes held by the arena.
    pub(crate) fn memory_usage(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot<T>>()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: NodeId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("dangling node id {}", id.index()),
        }
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("dangling node id {}", id.index()),
        }
    }
}
