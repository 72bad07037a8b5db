//! Node allocation capability.
//!
//! The tree never decides where its nodes live. It asks a [`NodeAllocator`]
//! for exactly one slot per inserted element and gives exactly one slot back
//! per erased element. [`Arena`] is the default implementation: a vector of
//! generational slots threaded by a free list, optionally capped at a fixed
//! number of live nodes.

use std::ops::{Index, IndexMut};

use super::node::{Node, NodeHandle};
use crate::error::AllocationError;

/// The largest number of nodes a handle can address.
const MAX_SLOTS: usize = u32::MAX as usize;

/// A source of node slots for a tree.
///
/// Implementations must hand out handles that stay valid until they are
/// passed to [`deallocate`](Self::deallocate), and must never resolve a
/// deallocated handle through [`get`](Self::get) again. An allocation must
/// succeed while [`len`](Self::len) is below [`max_nodes`](Self::max_nodes).
///
/// Indexing with a handle that is not live is a broken invariant of the
/// caller and may panic, like indexing a slice out of bounds.
pub trait NodeAllocator<K>:
    Index<NodeHandle, Output = Node<K>> + IndexMut<NodeHandle, Output = Node<K>>
{
    /// Stores `node` and returns a handle to it.
    ///
    /// # Errors
    ///
    /// Returns the node inside an [`AllocationError`] when no slot can be
    /// produced.
    fn allocate(&mut self, node: Node<K>) -> Result<NodeHandle, AllocationError<Node<K>>>;

    /// Releases the slot behind `handle` and returns the node it held, or
    /// `None` if the handle is not live.
    fn deallocate(&mut self, handle: NodeHandle) -> Option<Node<K>>;

    /// Returns the node behind `handle` if the handle is live.
    fn get(&self, handle: NodeHandle) -> Option<&Node<K>>;

    /// Returns the number of live nodes.
    fn len(&self) -> usize;

    /// Returns `true` if no node is live.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of nodes this allocator can hold at once.
    fn max_nodes(&self) -> usize;
}

// =============================================================================
// Arena
// =============================================================================

#[derive(Clone, Debug)]
enum Slot<K> {
    Occupied {
        generation: u32,
        node: Node<K>,
    },
    Vacant {
        generation: u32,
        next_free: Option<u32>,
    },
}

/// The default node allocator: a growable vector of generational slots.
///
/// Released slots are reused before the vector grows. Every release bumps the
/// slot generation so that stale handles are recognised.
///
/// # Examples
///
/// ```rust
/// use ordtree::tree::{Arena, RedBlackTree};
/// use ordtree::compare::Less;
///
/// let mut tree = RedBlackTree::with_compare_and_allocator(Less, Arena::bounded(2));
/// assert!(tree.insert(1).is_ok());
/// assert!(tree.insert(2).is_ok());
/// assert!(tree.insert(3).unwrap_err().is_allocation_failure());
/// assert_eq!(tree.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Arena<K> {
    slots: Vec<Slot<K>>,
    free_head: Option<u32>,
    live: usize,
    limit: usize,
}

impl<K> Arena<K> {
    /// Creates an empty, unbounded arena.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            live: 0,
            limit: MAX_SLOTS,
        }
    }

    /// Creates an empty, unbounded arena with room for `capacity` nodes
    /// before it reallocates.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(MAX_SLOTS)),
            ..Self::new()
        }
    }

    /// Creates an arena that refuses to hold more than `limit` live nodes.
    #[must_use]
    pub const fn bounded(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            live: 0,
            limit: if limit < MAX_SLOTS { limit } else { MAX_SLOTS },
        }
    }

    /// Returns the number of slots ever created, live or vacant.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn occupied(&self, handle: NodeHandle) -> Option<&Node<K>> {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied { generation, node }) if *generation == handle.generation() => {
                Some(node)
            }
            _ => None,
        }
    }

    fn occupied_mut(&mut self, handle: NodeHandle) -> Option<&mut Node<K>> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Occupied { generation, node }) if *generation == handle.generation() => {
                Some(node)
            }
            _ => None,
        }
    }
}

impl<K> Default for Arena<K> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K> NodeAllocator<K> for Arena<K> {
    fn allocate(&mut self, node: Node<K>) -> Result<NodeHandle, AllocationError<Node<K>>> {
        if self.live >= self.limit {
            log::warn!(
                "arena refused a node allocation: {} of {} nodes live",
                self.live,
                self.limit
            );
            return Err(AllocationError::new(node, self.limit));
        }

        if let Some(index) = self.free_head
            && let Some(&Slot::Vacant {
                generation,
                next_free,
            }) = self.slots.get(index as usize)
        {
            self.free_head = next_free;
            self.slots[index as usize] = Slot::Occupied { generation, node };
            self.live += 1;
            return Ok(NodeHandle::new(index, generation));
        }

        let Ok(index) = u32::try_from(self.slots.len()) else {
            return Err(AllocationError::new(node, MAX_SLOTS));
        };
        if self.slots.len() == self.slots.capacity() {
            log::trace!("arena growing beyond {} slots", self.slots.len());
        }
        self.slots.push(Slot::Occupied {
            generation: 0,
            node,
        });
        self.live += 1;
        Ok(NodeHandle::new(index, 0))
    }

    fn deallocate(&mut self, handle: NodeHandle) -> Option<Node<K>> {
        self.occupied(handle)?;
        let index = handle.index();
        let vacant = Slot::Vacant {
            generation: handle.generation().wrapping_add(1),
            next_free: self.free_head,
        };
        match std::mem::replace(&mut self.slots[index], vacant) {
            Slot::Occupied { node, .. } => {
                self.free_head = u32::try_from(index).ok();
                self.live -= 1;
                Some(node)
            }
            Slot::Vacant { .. } => None,
        }
    }

    #[inline]
    fn get(&self, handle: NodeHandle) -> Option<&Node<K>> {
        self.occupied(handle)
    }

    #[inline]
    fn len(&self) -> usize {
        self.live
    }

    #[inline]
    fn max_nodes(&self) -> usize {
        self.limit
    }
}

impl<K> Index<NodeHandle> for Arena<K> {
    type Output = Node<K>;

    #[inline]
    fn index(&self, handle: NodeHandle) -> &Self::Output {
        match self.occupied(handle) {
            Some(node) => node,
            None => panic!("{handle} is not live in this arena"),
        }
    }
}

impl<K> IndexMut<NodeHandle> for Arena<K> {
    #[inline]
    fn index_mut(&mut self, handle: NodeHandle) -> &mut Self::Output {
        match self.occupied_mut(handle) {
            Some(node) => node,
            None => panic!("{handle} is not live in this arena"),
        }
    }
}
