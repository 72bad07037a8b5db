//! Mutable red-black tree with duplicate keys.
//!
//! This module provides [`RedBlackTree`], the engine behind the ordered
//! containers of this crate. Keys are kept in the order defined by a
//! [`Compare`] relation; keys that compare equivalent are all kept, in the
//! order they were inserted.
//!
//! # Overview
//!
//! - O(log N) insert, erase, find, `lower_bound`, `upper_bound`
//! - amortized O(1) insert when the hint names the exact gap
//! - O(log N + k) `count`, `equal_range` and range erasure
//! - O(1) `len`, `is_empty`, `swap`
//!
//! Nodes live in a [`NodeAllocator`] and are addressed by generational
//! handles. Rebalancing only relinks nodes, so a [`Cursor`] keeps naming the
//! same key until that key is erased.
//!
//! # Examples
//!
//! ```rust
//! use ordtree::tree::RedBlackTree;
//!
//! let mut tree = RedBlackTree::new();
//! for key in [5, 1, 3, 3, 7] {
//!     tree.insert(key).unwrap();
//! }
//!
//! assert_eq!(tree.count(&3), 2);
//! let keys: Vec<i32> = tree.iter().copied().collect();
//! assert_eq!(keys, vec![1, 3, 3, 5, 7]);
//!
//! let first_three = tree.find(&3);
//! let after = tree.erase(first_three).unwrap();
//! assert_eq!(tree.get(after), Ok(&3));
//! assert_eq!(tree.len(), 4);
//! ```
//!
//! # Internal Structure
//!
//! The tree maintains the following invariants after every public call:
//! 1. Every node is either red or black
//! 2. The root is black
//! 3. Absent children count as black leaves
//! 4. Red nodes have only black children
//! 5. Every path from a node to its absent descendants has the same number
//!    of black nodes
//! 6. No element is ordered before its in-order predecessor
//!
//! Equal keys always descend to the right, which keeps equal-key runs in
//! insertion order.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Bound, Index, RangeBounds};

use smallvec::SmallVec;

use super::allocator::{Arena, NodeAllocator};
use super::cursor::{Cursor, IntoIter, Iter, Range, TreeId, Walk};
use super::node::{Color, Node, NodeHandle, Side};
use crate::compare::{Compare, Less};
use crate::error::{AllocationError, InvariantViolation, TreeError};

/// Inline capacity of traversal stacks. A red-black tree of 2^24 elements is
/// at most 48 levels deep.
const STACK_INLINE: usize = 48;

// =============================================================================
// RedBlackTree Definition
// =============================================================================

/// An ordered collection of keys, duplicates allowed, balanced as a
/// red-black tree.
///
/// `C` is the ordering relation and `A` the node allocator. Both are held by
/// value and fixed for the lifetime of the tree.
///
/// # Type Parameters
///
/// - `K`: The key type
/// - `C`: The comparator, [`Less`] by default
/// - `A`: The node allocator, [`Arena`] by default
///
/// # Examples
///
/// ```rust
/// use ordtree::compare::Greater;
/// use ordtree::tree::RedBlackTree;
///
/// let mut tree = RedBlackTree::with_compare(Greater);
/// tree.insert(1).unwrap();
/// tree.insert(3).unwrap();
/// tree.insert(2).unwrap();
///
/// assert_eq!(tree.first(), Some(&3));
/// assert_eq!(tree.last(), Some(&1));
/// ```
pub struct RedBlackTree<K, C = Less, A = Arena<K>> {
    root: Option<NodeHandle>,
    length: usize,
    compare: C,
    allocator: A,
    identity: TreeId,
    marker: PhantomData<K>,
}

impl<K> RedBlackTree<K, Less, Arena<K>> {
    /// Creates an empty tree ordered by [`Ord`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::tree::RedBlackTree;
    ///
    /// let tree: RedBlackTree<i32> = RedBlackTree::new();
    /// assert!(tree.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_compare_and_allocator(Less, Arena::new())
    }
}

impl<K, C> RedBlackTree<K, C, Arena<K>> {
    /// Creates an empty tree ordered by `compare`.
    #[must_use]
    pub fn with_compare(compare: C) -> Self {
        Self::with_compare_and_allocator(compare, Arena::new())
    }
}

impl<K, A: NodeAllocator<K>> RedBlackTree<K, Less, A> {
    /// Creates an empty tree ordered by [`Ord`] that stores its nodes in
    /// `allocator`.
    #[must_use]
    pub fn with_allocator(allocator: A) -> Self {
        Self::with_compare_and_allocator(Less, allocator)
    }
}

impl<K, C, A: NodeAllocator<K>> RedBlackTree<K, C, A> {
    /// Creates an empty tree from a comparator and an allocator.
    #[must_use]
    pub fn with_compare_and_allocator(compare: C, allocator: A) -> Self {
        Self {
            root: None,
            length: 0,
            compare,
            allocator,
            identity: TreeId::fresh(),
            marker: PhantomData,
        }
    }

    // =========================================================================
    // Size and Parameters
    // =========================================================================

    /// Returns the number of elements.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the tree has no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the largest number of elements the allocator can ever hold.
    ///
    /// An allocator shared with other trees counts their nodes against the
    /// same limit.
    #[inline]
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.allocator.max_nodes()
    }

    /// Returns the ordering relation.
    #[inline]
    #[must_use]
    pub const fn compare(&self) -> &C {
        &self.compare
    }

    /// Returns the node allocator.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Returns the number of nodes on the longest root-to-leaf path.
    ///
    /// A red-black tree of `n` elements is never higher than
    /// `2 * log2(n + 1)`.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut pending: SmallVec<[(NodeHandle, usize); STACK_INLINE]> = SmallVec::new();
        pending.extend(self.root.map(|root| (root, 1)));
        while let Some((handle, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            let node = self.node(handle);
            pending.extend(node.left().map(|child| (child, depth + 1)));
            pending.extend(node.right().map(|child| (child, depth + 1)));
        }
        deepest
    }

    // =========================================================================
    // Cursors
    // =========================================================================

    /// Returns a cursor to the smallest element, or the end-sentinel if the
    /// tree is empty.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn begin(&self) -> Cursor {
        self.cursor(self.first_handle())
    }

    /// Returns the end-sentinel of this tree.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Cursor {
        self.cursor(None)
    }

    /// Returns a cursor to the largest element, or the end-sentinel if the
    /// tree is empty. Retreating from it walks the tree in reverse.
    #[must_use]
    pub fn rbegin(&self) -> Cursor {
        self.cursor(self.last_handle())
    }

    /// Returns the end-sentinel, which is also the position one before the
    /// smallest element.
    #[inline]
    #[must_use]
    pub const fn rend(&self) -> Cursor {
        self.end()
    }

    /// Returns the key at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] if `cursor` is the
    /// end-sentinel, names an erased element, or belongs to another tree.
    pub fn get(&self, cursor: Cursor) -> Result<&K, TreeError> {
        let handle = self.resolve_node(cursor, "get")?;
        Ok(self.key_at(handle))
    }

    /// Returns the node at `cursor`, exposing its color and links.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`get`](Self::get).
    pub fn node_at(&self, cursor: Cursor) -> Result<&Node<K>, TreeError> {
        let handle = self.resolve_node(cursor, "node_at")?;
        Ok(self.node(handle))
    }

    /// Advances `cursor` to the in-order successor. The successor of the
    /// largest element is the end-sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] if `cursor` is already the
    /// end-sentinel or is not a valid cursor of this tree.
    ///
    /// # Complexity
    ///
    /// O(log N) worst case, amortized O(1) over a full traversal
    pub fn next(&self, cursor: Cursor) -> Result<Cursor, TreeError> {
        let handle = self.resolve_node(cursor, "next")?;
        Ok(self.cursor(self.successor(handle)))
    }

    /// Retreats `cursor` to the in-order predecessor.
    ///
    /// Retreating from the end-sentinel yields the largest element, and
    /// retreating from the smallest element yields the end-sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] when retreating from the
    /// end-sentinel of an empty tree, or if `cursor` is not a valid cursor
    /// of this tree.
    pub fn prev(&self, cursor: Cursor) -> Result<Cursor, TreeError> {
        match self.resolve(cursor, "prev")? {
            Some(handle) => Ok(self.cursor(self.predecessor(handle))),
            None => self
                .last_handle()
                .map(|last| self.cursor(Some(last)))
                .ok_or(TreeError::InvalidIterator { operation: "prev" }),
        }
    }

    /// Returns `true` if `cursor` is the end-sentinel or names a live
    /// element of this tree.
    #[must_use]
    pub fn is_valid(&self, cursor: Cursor) -> bool {
        self.resolve(cursor, "is_valid").is_ok()
    }

    // =========================================================================
    // Element Access
    // =========================================================================

    /// Returns the smallest key.
    #[must_use]
    pub fn first(&self) -> Option<&K> {
        self.first_handle().map(|handle| self.key_at(handle))
    }

    /// Returns the largest key. Among equal keys, the one inserted last.
    #[must_use]
    pub fn last(&self) -> Option<&K> {
        self.last_handle().map(|handle| self.key_at(handle))
    }

    /// Returns an in-order iterator over the keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::tree::RedBlackTree;
    ///
    /// let tree: RedBlackTree<i32> = [3, 1, 2].into_iter().collect();
    /// let reversed: Vec<&i32> = tree.iter().rev().collect();
    /// assert_eq!(reversed, vec![&3, &2, &1]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, C, A> {
        let walk = match (self.first_handle(), self.last_handle()) {
            (Some(front), Some(back)) => Walk::new(front, back),
            _ => Walk::empty(),
        };
        Iter::new(self, walk, self.length)
    }

    /// Returns an iterator over the half-open cursor range `[first, last)`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] if either cursor is not a valid
    /// cursor of this tree, and [`TreeError::PreconditionViolation`] if
    /// `last` is not reachable from `first` by advancing.
    ///
    /// # Complexity
    ///
    /// O(log N) to create, O(1) amortized per element
    pub fn iter_between(&self, first: Cursor, last: Cursor) -> Result<Range<'_, K, C, A>, TreeError> {
        let start = self.resolve(first, "iter_between")?;
        let stop = self.resolve(last, "iter_between")?;
        if !self.reaches(start, stop) {
            return Err(TreeError::PreconditionViolation {
                operation: "iter_between",
                reason: "last is not reachable from first",
            });
        }
        Ok(Range::new(self, self.walk_between(start, stop)))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns a cursor to the first element not ordered before `key`, or
    /// the end-sentinel.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.cursor(self.lower_bound_handle(key))
    }

    /// Returns a cursor to the first element ordered after `key`, or the
    /// end-sentinel.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.cursor(self.upper_bound_handle(key))
    }

    /// Returns `(lower_bound(key), upper_bound(key))`, the run of elements
    /// equivalent to `key`.
    pub fn equal_range<Q>(&self, key: &Q) -> (Cursor, Cursor)
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        (self.lower_bound(key), self.upper_bound(key))
    }

    /// Returns a cursor to the first element equivalent to `key`, or the
    /// end-sentinel if there is none.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub fn find<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.cursor(self.find_handle(key))
    }

    /// Returns `true` if an element equivalent to `key` exists.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.find_handle(key).is_some()
    }

    /// Returns the number of elements equivalent to `key`.
    ///
    /// # Complexity
    ///
    /// O(log N + k) where k is the returned count
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let stop = self.upper_bound_handle(key);
        let mut current = self.lower_bound_handle(key);
        let mut count = 0;
        while current != stop {
            let Some(handle) = current else { break };
            count += 1;
            current = self.successor(handle);
        }
        count
    }

    /// Returns an iterator over the elements whose keys fall within `range`.
    ///
    /// An inverted range (end ordered before start) is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::tree::RedBlackTree;
    ///
    /// let tree: RedBlackTree<i32> = [1, 3, 3, 5, 7].into_iter().collect();
    /// let inner: Vec<&i32> = tree.range(3..7).collect();
    /// assert_eq!(inner, vec![&3, &3, &5]);
    /// assert_eq!(tree.range(6..2).count(), 0);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log N) to create, O(1) amortized per element
    pub fn range<Q, R>(&self, range: R) -> Range<'_, K, C, A>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
        R: RangeBounds<Q>,
    {
        let inverted = match (range.start_bound(), range.end_bound()) {
            (Bound::Excluded(start), Bound::Excluded(end)) => !self.compare.less(start, end),
            (
                Bound::Included(start) | Bound::Excluded(start),
                Bound::Included(end) | Bound::Excluded(end),
            ) => self.compare.less(end, start),
            _ => false,
        };
        if inverted {
            return Range::new(self, Walk::empty());
        }

        let start = match range.start_bound() {
            Bound::Included(key) => self.lower_bound_handle(key),
            Bound::Excluded(key) => self.upper_bound_handle(key),
            Bound::Unbounded => self.first_handle(),
        };
        let stop = match range.end_bound() {
            Bound::Included(key) => self.upper_bound_handle(key),
            Bound::Excluded(key) => self.lower_bound_handle(key),
            Bound::Unbounded => None,
        };
        Range::new(self, self.walk_between(start, stop))
    }

    // =========================================================================
    // Erasure
    // =========================================================================

    /// Erases the element at `cursor` and returns a cursor to its successor.
    ///
    /// Cursors to every other element stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PreconditionViolation`] at the end-sentinel and
    /// [`TreeError::InvalidIterator`] for a cursor that is not valid for this
    /// tree. The tree is unchanged on error.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub fn erase(&mut self, cursor: Cursor) -> Result<Cursor, TreeError> {
        let target = self.resolve_erasable(cursor, "erase")?;
        let successor = self.successor(target);
        self.remove_node(target);
        Ok(self.cursor(successor))
    }

    /// Erases the element at `cursor` and returns its key.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`erase`](Self::erase).
    pub fn remove(&mut self, cursor: Cursor) -> Result<K, TreeError> {
        let target = self.resolve_erasable(cursor, "remove")?;
        self.remove_node(target)
            .ok_or(TreeError::InvalidIterator { operation: "remove" })
    }

    /// Erases the half-open range `[first, last)` and returns `last`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] if either cursor is not valid
    /// for this tree, and [`TreeError::PreconditionViolation`] if `last` is
    /// not reachable from `first`. Nothing is erased on error.
    ///
    /// # Complexity
    ///
    /// O(k log N) where k is the number of erased elements
    pub fn erase_range(&mut self, first: Cursor, last: Cursor) -> Result<Cursor, TreeError> {
        let start = self.resolve(first, "erase_range")?;
        let stop = self.resolve(last, "erase_range")?;
        if stop.is_none() && start == self.first_handle() {
            self.clear();
            return Ok(self.end());
        }

        let mut doomed = Vec::new();
        let mut current = start;
        while current != stop {
            let Some(handle) = current else {
                return Err(TreeError::PreconditionViolation {
                    operation: "erase_range",
                    reason: "last is not reachable from first",
                });
            };
            doomed.push(handle);
            current = self.successor(handle);
        }
        for handle in doomed {
            self.remove_node(handle);
        }
        Ok(self.cursor(stop))
    }

    /// Erases every element equivalent to `key` and returns how many were
    /// erased.
    ///
    /// # Complexity
    ///
    /// O(log N + k log N) where k is the returned count
    pub fn erase_key<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let stop = self.upper_bound_handle(key);
        let mut current = self.lower_bound_handle(key);
        let mut erased = 0;
        while current != stop {
            let Some(handle) = current else { break };
            current = self.successor(handle);
            self.remove_node(handle);
            erased += 1;
        }
        erased
    }

    /// Removes and returns the smallest key.
    pub fn pop_first(&mut self) -> Option<K> {
        let first = self.first_handle()?;
        self.remove_node(first)
    }

    /// Removes and returns the largest key.
    pub fn pop_last(&mut self) -> Option<K> {
        let last = self.last_handle()?;
        self.remove_node(last)
    }

    /// Keeps only the keys for which `keep` returns `true`, visiting them in
    /// order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        let mut current = self.first_handle();
        while let Some(handle) = current {
            current = self.successor(handle);
            if !keep(self.key_at(handle)) {
                self.remove_node(handle);
            }
        }
    }

    /// Erases every element, releasing each node to the allocator.
    ///
    /// Every cursor except the end-sentinel becomes invalid.
    ///
    /// # Complexity
    ///
    /// O(N)
    pub fn clear(&mut self) {
        let released = self.length;
        let mut pending: SmallVec<[NodeHandle; STACK_INLINE]> = SmallVec::new();
        pending.extend(self.root.take());
        while let Some(handle) = pending.pop() {
            if let Some(node) = self.allocator.deallocate(handle) {
                pending.extend(node.left());
                pending.extend(node.right());
            }
        }
        self.length = 0;
        log::debug!("cleared {released} nodes");
    }

    // =========================================================================
    // Whole-Tree Operations
    // =========================================================================

    /// Exchanges the contents of two trees. Cursors follow their elements.
    ///
    /// # Complexity
    ///
    /// O(1)
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Moves every element into a new tree and leaves `self` empty with a
    /// fresh allocator. Cursors follow their elements into the returned tree.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        C: Clone,
        A: Default,
    {
        let empty = Self::with_compare_and_allocator(self.compare.clone(), A::default());
        std::mem::replace(self, empty)
    }

    /// Copies the tree node by node into `allocator`, keeping shape and
    /// colors.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailure`] if `allocator` cannot hold
    /// every node. `self` is never modified.
    ///
    /// # Complexity
    ///
    /// O(N)
    pub fn try_clone_in<B>(&self, allocator: B) -> Result<RedBlackTree<K, C, B>, TreeError>
    where
        K: Clone,
        C: Clone,
        B: NodeAllocator<K>,
    {
        let mut copy = RedBlackTree::with_compare_and_allocator(self.compare.clone(), allocator);
        let mut pending: SmallVec<[(NodeHandle, Option<NodeHandle>, Side); STACK_INLINE]> =
            SmallVec::new();
        pending.extend(self.root.map(|root| (root, None, Side::Left)));

        while let Some((source, parent, side)) = pending.pop() {
            let original = self.node(source);
            let mut node = Node::new_red(original.key().clone());
            node.set_color(original.color());
            node.set_parent(parent);
            let handle = copy.allocator.allocate(node)?;
            match parent {
                Some(parent) => copy.node_mut(parent).set_child(side, Some(handle)),
                None => copy.root = Some(handle),
            }
            pending.extend(original.left().map(|child| (child, Some(handle), Side::Left)));
            pending.extend(original.right().map(|child| (child, Some(handle), Side::Right)));
        }

        copy.length = self.length;
        log::debug!("copied {} nodes into a new allocator", self.length);
        Ok(copy)
    }

    // =========================================================================
    // Internal: Navigation
    // =========================================================================

    #[inline]
    fn node(&self, handle: NodeHandle) -> &Node<K> {
        &self.allocator[handle]
    }

    #[inline]
    fn node_mut(&mut self, handle: NodeHandle) -> &mut Node<K> {
        &mut self.allocator[handle]
    }

    #[inline]
    pub(crate) fn key_at(&self, handle: NodeHandle) -> &K {
        self.node(handle).key()
    }

    #[inline]
    fn parent_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.node(handle).parent()
    }

    #[inline]
    fn child_of(&self, handle: NodeHandle, side: Side) -> Option<NodeHandle> {
        self.node(handle).child(side)
    }

    #[inline]
    fn is_red(&self, link: Option<NodeHandle>) -> bool {
        link.is_some_and(|handle| self.node(handle).is_red())
    }

    #[inline]
    fn paint(&mut self, handle: NodeHandle, color: Color) {
        self.node_mut(handle).set_color(color);
    }

    fn side_of(&self, parent: NodeHandle, child: NodeHandle) -> Side {
        if self.child_of(parent, Side::Left) == Some(child) {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Follows `side` links from `handle` as far as they go.
    fn extreme(&self, mut handle: NodeHandle, side: Side) -> NodeHandle {
        while let Some(child) = self.child_of(handle, side) {
            handle = child;
        }
        handle
    }

    fn first_handle(&self) -> Option<NodeHandle> {
        self.root.map(|root| self.extreme(root, Side::Left))
    }

    fn last_handle(&self) -> Option<NodeHandle> {
        self.root.map(|root| self.extreme(root, Side::Right))
    }

    /// In-order neighbour of `handle` in direction `side`.
    fn step(&self, handle: NodeHandle, side: Side) -> Option<NodeHandle> {
        if let Some(child) = self.child_of(handle, side) {
            return Some(self.extreme(child, side.opposite()));
        }
        let mut current = handle;
        while let Some(parent) = self.parent_of(current) {
            if self.child_of(parent, side) != Some(current) {
                return Some(parent);
            }
            current = parent;
        }
        None
    }

    #[inline]
    pub(crate) fn successor(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.step(handle, Side::Right)
    }

    #[inline]
    pub(crate) fn predecessor(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.step(handle, Side::Left)
    }

    /// Sides taken on the way from the root down to `handle`.
    fn path_from_root(&self, handle: NodeHandle) -> SmallVec<[Side; STACK_INLINE]> {
        let mut path: SmallVec<[Side; STACK_INLINE]> = SmallVec::new();
        let mut current = handle;
        while let Some(parent) = self.parent_of(current) {
            path.push(self.side_of(parent, current));
            current = parent;
        }
        path.reverse();
        path
    }

    /// In-order position of `lhs` relative to `rhs`, decided by their root
    /// paths alone, so runs of equal keys are told apart.
    fn position_order(&self, lhs: NodeHandle, rhs: NodeHandle) -> Ordering {
        if lhs == rhs {
            return Ordering::Equal;
        }
        let lhs_path = self.path_from_root(lhs);
        let rhs_path = self.path_from_root(rhs);
        for depth in 0.. {
            match (lhs_path.get(depth), rhs_path.get(depth)) {
                (Some(left), Some(right)) if left == right => {}
                (Some(Side::Left), _) | (None, Some(Side::Right)) => return Ordering::Less,
                (Some(Side::Right), _) | (None, Some(Side::Left)) => return Ordering::Greater,
                (None, None) => break,
            }
        }
        Ordering::Equal
    }

    /// `true` if advancing from `start` eventually arrives at `stop`.
    fn reaches(&self, start: Option<NodeHandle>, stop: Option<NodeHandle>) -> bool {
        match (start, stop) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(start), Some(stop)) => self.position_order(start, stop) != Ordering::Greater,
        }
    }

    fn walk_between(&self, start: Option<NodeHandle>, stop: Option<NodeHandle>) -> Walk {
        if start == stop {
            return Walk::empty();
        }
        let back = match stop {
            Some(stop) => self.predecessor(stop),
            None => self.last_handle(),
        };
        match (start, back) {
            (Some(front), Some(back)) => Walk::new(front, back),
            _ => Walk::empty(),
        }
    }

    fn lower_bound_handle<Q>(&self, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let mut bound = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            let stored: &Q = node.key().borrow();
            if self.compare.less(stored, key) {
                current = node.right();
            } else {
                bound = Some(handle);
                current = node.left();
            }
        }
        bound
    }

    fn upper_bound_handle<Q>(&self, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let mut bound = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            let stored: &Q = node.key().borrow();
            if self.compare.less(key, stored) {
                bound = Some(handle);
                current = node.left();
            } else {
                current = node.right();
            }
        }
        bound
    }

    fn find_handle<Q>(&self, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.lower_bound_handle(key).filter(|&handle| {
            let stored: &Q = self.key_at(handle).borrow();
            !self.compare.less(key, stored)
        })
    }

    // =========================================================================
    // Internal: Cursor Validation
    // =========================================================================

    #[inline]
    const fn cursor(&self, position: Option<NodeHandle>) -> Cursor {
        Cursor::new(self.identity, position)
    }

    /// Checks that `cursor` belongs to this tree and, unless it is the
    /// end-sentinel, names a live node.
    fn resolve(&self, cursor: Cursor, operation: &'static str) -> Result<Option<NodeHandle>, TreeError> {
        if cursor.tree() != self.identity {
            return Err(TreeError::InvalidIterator { operation });
        }
        match cursor.handle() {
            Some(handle) if self.allocator.get(handle).is_none() => {
                Err(TreeError::InvalidIterator { operation })
            }
            position => Ok(position),
        }
    }

    fn resolve_node(&self, cursor: Cursor, operation: &'static str) -> Result<NodeHandle, TreeError> {
        self.resolve(cursor, operation)?
            .ok_or(TreeError::InvalidIterator { operation })
    }

    fn resolve_erasable(&self, cursor: Cursor, operation: &'static str) -> Result<NodeHandle, TreeError> {
        self.resolve(cursor, operation)?
            .ok_or(TreeError::PreconditionViolation {
                operation,
                reason: "cannot erase the end-sentinel",
            })
    }

    // =========================================================================
    // Internal: Rebalancing
    // =========================================================================

    /// Rotates around `pivot` in `direction`: for [`Side::Left`] the right
    /// child of `pivot` takes its place and `pivot` becomes that child's left
    /// child. The in-order sequence is unchanged.
    fn rotate(&mut self, pivot: NodeHandle, direction: Side) {
        let rising_side = direction.opposite();
        let Some(rising) = self.child_of(pivot, rising_side) else {
            return;
        };

        let inner = self.child_of(rising, direction);
        self.node_mut(pivot).set_child(rising_side, inner);
        if let Some(inner) = inner {
            self.node_mut(inner).set_parent(Some(pivot));
        }

        let parent = self.parent_of(pivot);
        self.node_mut(rising).set_parent(parent);
        self.replace_child(parent, pivot, Some(rising));

        self.node_mut(rising).set_child(direction, Some(pivot));
        self.node_mut(pivot).set_parent(Some(rising));
    }

    /// Points the link that held `old` (a child of `parent`, or the root) at
    /// `new`.
    fn replace_child(&mut self, parent: Option<NodeHandle>, old: NodeHandle, new: Option<NodeHandle>) {
        match parent {
            Some(parent) => {
                let side = self.side_of(parent, old);
                self.node_mut(parent).set_child(side, new);
            }
            None => self.root = new,
        }
    }

    /// Puts the subtree `new` where the subtree `old` hangs.
    fn transplant(&mut self, old: NodeHandle, new: Option<NodeHandle>) {
        let parent = self.parent_of(old);
        self.replace_child(parent, old, new);
        if let Some(new) = new {
            self.node_mut(new).set_parent(parent);
        }
    }

    fn rebalance_after_insert(&mut self, mut node: NodeHandle) {
        while let Some(mut parent) = self.parent_of(node)
            && self.node(parent).is_red()
        {
            // A red parent is never the root.
            let Some(grandparent) = self.parent_of(parent) else {
                break;
            };
            let parent_side = self.side_of(grandparent, parent);

            if let Some(uncle) = self.child_of(grandparent, parent_side.opposite())
                && self.node(uncle).is_red()
            {
                self.paint(parent, Color::Black);
                self.paint(uncle, Color::Black);
                self.paint(grandparent, Color::Red);
                node = grandparent;
                continue;
            }

            if self.child_of(parent, parent_side.opposite()) == Some(node) {
                self.rotate(parent, parent_side);
                parent = node;
            }
            self.paint(parent, Color::Black);
            self.paint(grandparent, Color::Red);
            self.rotate(grandparent, parent_side.opposite());
            break;
        }

        if let Some(root) = self.root {
            self.paint(root, Color::Black);
        }
    }

    fn rebalance_after_erase(&mut self, mut node: Option<NodeHandle>, mut parent: Option<NodeHandle>) {
        while node != self.root && !self.is_red(node) {
            let Some(current_parent) = parent else {
                break;
            };
            let side = if self.child_of(current_parent, Side::Left) == node {
                Side::Left
            } else {
                Side::Right
            };
            let far_side = side.opposite();
            // The sibling of a doubly black link always exists.
            let Some(mut sibling) = self.child_of(current_parent, far_side) else {
                break;
            };

            if self.node(sibling).is_red() {
                self.paint(sibling, Color::Black);
                self.paint(current_parent, Color::Red);
                self.rotate(current_parent, side);
                let Some(next) = self.child_of(current_parent, far_side) else {
                    break;
                };
                sibling = next;
            }

            let near = self.child_of(sibling, side);
            let far = self.child_of(sibling, far_side);
            if !self.is_red(near) && !self.is_red(far) {
                self.paint(sibling, Color::Red);
                node = Some(current_parent);
                parent = self.parent_of(current_parent);
                continue;
            }

            if !self.is_red(far) {
                if let Some(near) = near {
                    self.paint(near, Color::Black);
                }
                self.paint(sibling, Color::Red);
                self.rotate(sibling, far_side);
                let Some(next) = self.child_of(current_parent, far_side) else {
                    break;
                };
                sibling = next;
            }

            let parent_color = self.node(current_parent).color();
            self.paint(sibling, parent_color);
            self.paint(current_parent, Color::Black);
            if let Some(far) = self.child_of(sibling, far_side) {
                self.paint(far, Color::Black);
            }
            self.rotate(current_parent, side);
            node = self.root;
            break;
        }

        if let Some(node) = node {
            self.paint(node, Color::Black);
        }
    }

    // =========================================================================
    // Internal: Structural Mutation
    // =========================================================================

    /// Allocates a red node for `key`, links it below `parent` on `side` and
    /// rebalances. Nothing changes if the allocation fails.
    fn attach(
        &mut self,
        parent: Option<NodeHandle>,
        side: Side,
        key: K,
    ) -> Result<NodeHandle, AllocationError<Node<K>>> {
        let mut node = Node::new_red(key);
        node.set_parent(parent);
        let handle = self.allocator.allocate(node)?;
        match parent {
            Some(parent) => self.node_mut(parent).set_child(side, Some(handle)),
            None => self.root = Some(handle),
        }
        self.length += 1;
        self.rebalance_after_insert(handle);
        Ok(handle)
    }

    /// Unlinks `target` from the tree and rebalances. A node with two
    /// children is replaced by its in-order successor node, so no key ever
    /// moves between nodes.
    fn detach(&mut self, target: NodeHandle) {
        let left = self.child_of(target, Side::Left);
        let right = self.child_of(target, Side::Right);

        let (removed_color, replacement, replacement_parent) = match (left, right) {
            (Some(left), Some(right)) => {
                let successor = self.extreme(right, Side::Left);
                let successor_color = self.node(successor).color();
                let successor_right = self.child_of(successor, Side::Right);
                let successor_parent = self.parent_of(successor);

                let replacement_parent = if successor_parent == Some(target) {
                    Some(successor)
                } else {
                    self.transplant(successor, successor_right);
                    self.node_mut(successor).set_child(Side::Right, Some(right));
                    self.node_mut(right).set_parent(Some(successor));
                    successor_parent
                };

                self.transplant(target, Some(successor));
                self.node_mut(successor).set_child(Side::Left, Some(left));
                self.node_mut(left).set_parent(Some(successor));
                let target_color = self.node(target).color();
                self.paint(successor, target_color);

                (successor_color, successor_right, replacement_parent)
            }
            (child, None) | (None, child) => {
                let parent = self.parent_of(target);
                self.transplant(target, child);
                (self.node(target).color(), child, parent)
            }
        };

        self.length -= 1;
        if removed_color == Color::Black {
            self.rebalance_after_erase(replacement, replacement_parent);
        }
    }

    fn remove_node(&mut self, target: NodeHandle) -> Option<K> {
        self.detach(target);
        self.allocator.deallocate(target).map(Node::into_key)
    }

    fn into_sorted_keys(mut self) -> Vec<K> {
        let mut order = Vec::with_capacity(self.length);
        let mut current = self.first_handle();
        while let Some(handle) = current {
            order.push(handle);
            current = self.successor(handle);
        }
        order
            .into_iter()
            .filter_map(|handle| self.allocator.deallocate(handle))
            .map(Node::into_key)
            .collect()
    }
}

// =============================================================================
// Ordered Insertion
// =============================================================================

impl<K, C: Compare<K>, A: NodeAllocator<K>> RedBlackTree<K, C, A> {
    /// Inserts `key` after every element equivalent to it and returns a
    /// cursor to the new element.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailure`] if the allocator refuses the
    /// node. The tree is unchanged in that case.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// let cursor = tree.insert(4).unwrap();
    /// assert_eq!(tree.get(cursor), Ok(&4));
    /// ```
    pub fn insert(&mut self, key: K) -> Result<Cursor, TreeError> {
        let (parent, side) = self.insertion_point(&key);
        let handle = self.attach(parent, side, key)?;
        Ok(self.cursor(Some(handle)))
    }

    /// Inserts `key` using `hint` as a guess for its position.
    ///
    /// If `key` belongs directly before `hint` (after every element
    /// equivalent to it), the insertion takes amortized constant time.
    /// Otherwise it falls back to [`insert`](Self::insert). Both paths build
    /// exactly the same tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] if `hint` is not a valid cursor
    /// of this tree and [`TreeError::AllocationFailure`] if the allocator
    /// refuses the node.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// for key in 0..100 {
    ///     tree.insert_with_hint(tree.end(), key).unwrap();
    /// }
    /// assert!(tree.iter().copied().eq(0..100));
    /// ```
    pub fn insert_with_hint(&mut self, hint: Cursor, key: K) -> Result<Cursor, TreeError> {
        let hint = self.resolve(hint, "insert_with_hint")?;
        let (parent, side) = self
            .hinted_point(hint, &key)
            .unwrap_or_else(|| self.insertion_point(&key));
        let handle = self.attach(parent, side, key)?;
        Ok(self.cursor(Some(handle)))
    }

    /// Inserts every key of `keys` in order and returns how many were
    /// inserted.
    ///
    /// # Errors
    ///
    /// Stops at the first refused allocation and returns
    /// [`TreeError::AllocationFailure`]. Keys inserted before the failure
    /// stay in the tree.
    pub fn try_extend<I>(&mut self, keys: I) -> Result<usize, TreeError>
    where
        I: IntoIterator<Item = K>,
    {
        let mut inserted = 0;
        for key in keys {
            let (parent, side) = self
                .hinted_point(None, &key)
                .unwrap_or_else(|| self.insertion_point(&key));
            self.attach(parent, side, key)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Moves every key of `other` into `self`, leaving `other` empty.
    ///
    /// Keys equivalent to keys already in `self` land after them, in the
    /// order they had in `other`. Cursors into `other` are invalidated for
    /// the keys that move.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailure`] once `self` has no room for
    /// another node. Keys moved so far stay in `self`; every later key stays
    /// in `other` and its cursors remain valid.
    ///
    /// # Panics
    ///
    /// Panics if an allocator refuses a node while reporting free capacity
    /// and `other` then refuses to take the key back.
    pub fn append(&mut self, other: &mut Self) -> Result<(), TreeError> {
        let moving = other.length;
        while let Some(first) = other.first_handle() {
            if self.allocator.len() >= self.allocator.max_nodes() {
                return Err(TreeError::AllocationFailure {
                    limit: self.allocator.max_nodes(),
                });
            }
            let Some(key) = other.remove_node(first) else {
                break;
            };
            let (parent, side) = self
                .hinted_point(None, &key)
                .unwrap_or_else(|| self.insertion_point(&key));
            if let Err(error) = self.attach(parent, side, key) {
                let limit = error.limit();
                other.restore_first(error.into_inner().into_key());
                return Err(TreeError::AllocationFailure { limit });
            }
        }
        log::trace!("appended {moving} keys");
        Ok(())
    }

    /// Puts back a key that was just taken from the front of the tree.
    fn restore_first(&mut self, key: K) {
        let front = self.first_handle();
        if let Err(error) = self.attach(front, Side::Left, key) {
            panic!("{}", TreeError::from(error));
        }
        log::warn!("allocator refused a node below its reported capacity");
    }

    /// Verifies every structural invariant and returns the black-height of
    /// the root: the number of black nodes on any path below it, not counting
    /// the root itself. An empty tree or a lone root has black-height 0.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    ///
    /// # Complexity
    ///
    /// O(N)
    pub fn check_invariants(&self) -> Result<usize, InvariantViolation> {
        let Some(root) = self.root else {
            return if self.length == 0 {
                Ok(0)
            } else {
                Err(InvariantViolation::LengthMismatch {
                    recorded: self.length,
                    counted: 0,
                })
            };
        };
        let root_node = self
            .allocator
            .get(root)
            .ok_or(InvariantViolation::BrokenParentLink { node: root })?;
        if root_node.is_red() {
            return Err(InvariantViolation::RedRoot);
        }
        if root_node.parent().is_some() {
            return Err(InvariantViolation::RootHasParent);
        }
        let black_height = self.subtree_black_height(root)?;

        let mut counted = 0;
        let mut previous: Option<NodeHandle> = None;
        let mut current = self.first_handle();
        while let Some(handle) = current {
            if let Some(previous) = previous
                && self.compare.less(self.key_at(handle), self.key_at(previous))
            {
                return Err(InvariantViolation::OrderViolation { node: handle });
            }
            counted += 1;
            if counted > self.length {
                break;
            }
            previous = Some(handle);
            current = self.successor(handle);
        }
        if counted != self.length {
            return Err(InvariantViolation::LengthMismatch {
                recorded: self.length,
                counted,
            });
        }
        Ok(black_height - 1)
    }

    /// Black nodes on any path from `handle` down to an absent child,
    /// counting `handle` itself.
    fn subtree_black_height(&self, handle: NodeHandle) -> Result<usize, InvariantViolation> {
        let node = self.node(handle);
        let mut heights = [0_usize; 2];
        for (height, side) in heights.iter_mut().zip([Side::Left, Side::Right]) {
            let Some(child) = node.child(side) else {
                continue;
            };
            let child_node = self
                .allocator
                .get(child)
                .ok_or(InvariantViolation::BrokenParentLink { node: child })?;
            if child_node.parent() != Some(handle) {
                return Err(InvariantViolation::BrokenParentLink { node: child });
            }
            if node.is_red() && child_node.is_red() {
                return Err(InvariantViolation::RedChildOfRed { node: child });
            }
            *height = self.subtree_black_height(child)?;
        }
        if heights[0] != heights[1] {
            return Err(InvariantViolation::BlackHeightMismatch { node: handle });
        }
        Ok(heights[0] + usize::from(!node.is_red()))
    }

    /// Full descent: left iff `key` is ordered before the node, so equal
    /// keys go right.
    fn insertion_point(&self, key: &K) -> (Option<NodeHandle>, Side) {
        let mut parent = None;
        let mut side = Side::Left;
        let mut current = self.root;
        while let Some(handle) = current {
            parent = Some(handle);
            side = if self.compare.less(key, self.key_at(handle)) {
                Side::Left
            } else {
                Side::Right
            };
            current = self.child_of(handle, side);
        }
        (parent, side)
    }

    /// The empty slot between `hint` and its predecessor, if `key` belongs
    /// there. The gap between two in-order neighbours has exactly one empty
    /// child slot, which is the one a full descent would reach.
    fn hinted_point(&self, hint: Option<NodeHandle>, key: &K) -> Option<(Option<NodeHandle>, Side)> {
        if let Some(hint) = hint
            && !self.compare.less(key, self.key_at(hint))
        {
            return None;
        }
        let previous = match hint {
            Some(hint) => self.predecessor(hint),
            None => self.last_handle(),
        };
        if let Some(previous) = previous
            && self.compare.less(key, self.key_at(previous))
        {
            return None;
        }

        match (hint, previous) {
            (Some(hint), _) if self.child_of(hint, Side::Left).is_none() => {
                Some((Some(hint), Side::Left))
            }
            (_, Some(previous)) => Some((Some(previous), Side::Right)),
            (None, None) => Some((None, Side::Left)),
            (Some(_), None) => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, C: Default, A: NodeAllocator<K> + Default> Default for RedBlackTree<K, C, A> {
    fn default() -> Self {
        Self::with_compare_and_allocator(C::default(), A::default())
    }
}

impl<K, C: Clone, A: NodeAllocator<K> + Clone> Clone for RedBlackTree<K, C, A> {
    /// Clones the allocator storage wholesale. The clone has the same shape
    /// and colors but its own identity, so cursors of `self` are rejected by
    /// it.
    fn clone(&self) -> Self {
        log::debug!("cloning a tree of {} nodes", self.length);
        Self {
            root: self.root,
            length: self.length,
            compare: self.compare.clone(),
            allocator: self.allocator.clone(),
            identity: TreeId::fresh(),
            marker: PhantomData,
        }
    }
}

impl<K: fmt::Debug, C, A: NodeAllocator<K>> fmt::Debug for RedBlackTree<K, C, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<K, C, A: NodeAllocator<K>> Index<Cursor> for RedBlackTree<K, C, A> {
    type Output = K;

    /// # Panics
    ///
    /// Panics if `cursor` is the end-sentinel or not a valid cursor of this
    /// tree.
    fn index(&self, cursor: Cursor) -> &Self::Output {
        match self.get(cursor) {
            Ok(key) => key,
            Err(error) => panic!("{error}"),
        }
    }
}

impl<K, C, A> FromIterator<K> for RedBlackTree<K, C, A>
where
    C: Compare<K> + Default,
    A: NodeAllocator<K> + Default,
{
    /// # Panics
    ///
    /// Panics if the allocator refuses a node.
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut tree = Self::default();
        tree.extend(iter);
        tree
    }
}

impl<K, C: Compare<K>, A: NodeAllocator<K>> Extend<K> for RedBlackTree<K, C, A> {
    /// # Panics
    ///
    /// Panics if the allocator refuses a node.
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        if let Err(error) = self.try_extend(iter) {
            panic!("{error}");
        }
    }
}

impl<K, C, A: NodeAllocator<K>> IntoIterator for RedBlackTree<K, C, A> {
    type Item = K;
    type IntoIter = IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.into_sorted_keys())
    }
}

impl<'a, K, C, A: NodeAllocator<K>> IntoIterator for &'a RedBlackTree<K, C, A> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K, C, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
