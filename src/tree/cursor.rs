//! Positions inside a tree and the iterators built on them.
//!
//! A [`Cursor`] names either one node or the end-sentinel of a particular
//! tree. It does not borrow the tree: stepping and dereferencing go through
//! the tree ([`RedBlackTree::next`], [`RedBlackTree::prev`],
//! [`RedBlackTree::get`]), which checks that the cursor still refers to a
//! live node of that same tree.
//!
//! The borrowing iterators ([`Iter`], [`Range`]) share one traversal core
//! that walks successor links from the front and predecessor links from the
//! back until both ends meet. Neither needs auxiliary storage.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicU64, Ordering};

use super::allocator::NodeAllocator;
use super::engine::RedBlackTree;
use super::node::NodeHandle;

// =============================================================================
// Tree Identity
// =============================================================================

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one tree instance, used to reject cursors from other trees.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct TreeId(u64);

impl TreeId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A position in a [`RedBlackTree`]: one element, or the end-sentinel.
///
/// The end-sentinel is both "one past the last element" and "one before the
/// first element". Cursors stay valid across every mutation except the
/// erasure of the element they name.
///
/// # Examples
///
/// ```rust
/// use ordtree::tree::RedBlackTree;
///
/// let mut tree = RedBlackTree::new();
/// let two = tree.insert(2).unwrap();
/// tree.insert(1).unwrap();
/// tree.insert(3).unwrap();
///
/// assert_eq!(tree.get(two), Ok(&2));
/// let three = tree.next(two).unwrap();
/// assert_eq!(tree.get(three), Ok(&3));
/// assert!(tree.next(three).unwrap().is_end());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    tree: TreeId,
    position: Option<NodeHandle>,
}

impl Cursor {
    #[inline]
    pub(crate) const fn new(tree: TreeId, position: Option<NodeHandle>) -> Self {
        Self { tree, position }
    }

    #[inline]
    pub(crate) const fn tree(self) -> TreeId {
        self.tree
    }

    /// Returns `true` if this cursor is the end-sentinel.
    #[inline]
    #[must_use]
    pub const fn is_end(self) -> bool {
        self.position.is_none()
    }

    /// Returns the handle of the named node, or `None` at the end-sentinel.
    #[inline]
    #[must_use]
    pub const fn handle(self) -> Option<NodeHandle> {
        self.position
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(handle) => write!(formatter, "Cursor({handle})"),
            None => write!(formatter, "Cursor(end)"),
        }
    }
}

// =============================================================================
// Traversal Core
// =============================================================================

/// Inclusive front/back pair of a bounded in-order walk.
///
/// Both ends are `Some` while elements remain and both become `None` once
/// the ends meet.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Walk {
    front: Option<NodeHandle>,
    back: Option<NodeHandle>,
}

impl Walk {
    pub(crate) const fn new(front: NodeHandle, back: NodeHandle) -> Self {
        Self {
            front: Some(front),
            back: Some(back),
        }
    }

    pub(crate) const fn empty() -> Self {
        Self {
            front: None,
            back: None,
        }
    }

    const fn is_exhausted(&self) -> bool {
        self.front.is_none()
    }

    fn next_front<K, C, A>(&mut self, tree: &RedBlackTree<K, C, A>) -> Option<NodeHandle>
    where
        A: NodeAllocator<K>,
    {
        let current = self.front?;
        if self.back == Some(current) {
            *self = Self::empty();
        } else {
            self.front = tree.successor(current);
            if self.front.is_none() {
                self.back = None;
            }
        }
        Some(current)
    }

    fn next_back<K, C, A>(&mut self, tree: &RedBlackTree<K, C, A>) -> Option<NodeHandle>
    where
        A: NodeAllocator<K>,
    {
        let current = self.back?;
        if self.front == Some(current) {
            *self = Self::empty();
        } else {
            self.back = tree.predecessor(current);
            if self.back.is_none() {
                self.front = None;
            }
        }
        Some(current)
    }
}

// =============================================================================
// Iter
// =============================================================================

/// An in-order iterator over all keys of a [`RedBlackTree`].
pub struct Iter<'a, K, C, A> {
    tree: &'a RedBlackTree<K, C, A>,
    walk: Walk,
    remaining: usize,
}

impl<'a, K, C, A> Iter<'a, K, C, A> {
    pub(crate) const fn new(tree: &'a RedBlackTree<K, C, A>, walk: Walk, remaining: usize) -> Self {
        Self {
            tree,
            walk,
            remaining,
        }
    }
}

impl<K, C, A> Clone for Iter<'_, K, C, A> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            walk: self.walk,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, C, A: NodeAllocator<K>> Iterator for Iter<'a, K, C, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let handle = self.walk.next_front(tree)?;
        self.remaining -= 1;
        Some(tree.key_at(handle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, C, A: NodeAllocator<K>> DoubleEndedIterator for Iter<'_, K, C, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let handle = self.walk.next_back(tree)?;
        self.remaining -= 1;
        Some(tree.key_at(handle))
    }
}

impl<K, C, A: NodeAllocator<K>> ExactSizeIterator for Iter<'_, K, C, A> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, C, A: NodeAllocator<K>> FusedIterator for Iter<'_, K, C, A> {}

impl<K: fmt::Debug, C, A: NodeAllocator<K>> fmt::Debug for Iter<'_, K, C, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.clone()).finish()
    }
}

// =============================================================================
// Range
// =============================================================================

/// An in-order iterator over a contiguous span of keys.
///
/// Produced by [`RedBlackTree::range`] and [`RedBlackTree::iter_between`].
pub struct Range<'a, K, C, A> {
    tree: &'a RedBlackTree<K, C, A>,
    walk: Walk,
}

impl<'a, K, C, A> Range<'a, K, C, A> {
    pub(crate) const fn new(tree: &'a RedBlackTree<K, C, A>, walk: Walk) -> Self {
        Self { tree, walk }
    }
}

impl<K, C, A> Clone for Range<'_, K, C, A> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            walk: self.walk,
        }
    }
}

impl<'a, K, C, A: NodeAllocator<K>> Iterator for Range<'a, K, C, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        self.walk.next_front(tree).map(|handle| tree.key_at(handle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.walk.is_exhausted() {
            (0, Some(0))
        } else {
            (1, Some(self.tree.len()))
        }
    }
}

impl<K, C, A: NodeAllocator<K>> DoubleEndedIterator for Range<'_, K, C, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        self.walk.next_back(tree).map(|handle| tree.key_at(handle))
    }
}

impl<K, C, A: NodeAllocator<K>> FusedIterator for Range<'_, K, C, A> {}

impl<K: fmt::Debug, C, A: NodeAllocator<K>> fmt::Debug for Range<'_, K, C, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.clone()).finish()
    }
}

// =============================================================================
// IntoIter
// =============================================================================

/// An owning in-order iterator over the keys of a [`RedBlackTree`].
#[derive(Debug, Clone)]
pub struct IntoIter<K> {
    keys: std::vec::IntoIter<K>,
}

impl<K> IntoIter<K> {
    pub(crate) fn new(keys: Vec<K>) -> Self {
        Self {
            keys: keys.into_iter(),
        }
    }
}

impl<K> Iterator for IntoIter<K> {
    type Item = K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.keys.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<K> DoubleEndedIterator for IntoIter<K> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.keys.next_back()
    }
}

impl<K> ExactSizeIterator for IntoIter<K> {
    #[inline]
    fn len(&self) -> usize {
        self.keys.len()
    }
}

impl<K> FusedIterator for IntoIter<K> {}
