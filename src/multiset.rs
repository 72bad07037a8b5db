//! Ordered multiset built on the red-black tree engine.
//!
//! This module provides [`OrderedMultiset`], a sorted collection that keeps
//! every inserted key, including duplicates. Each element is its own key, so
//! elements are read-only once stored.
//!
//! # Overview
//!
//! | Operation                       | Complexity          |
//! |---------------------------------|---------------------|
//! | `insert`                        | O(log N)            |
//! | `insert_with_hint` (exact gap)  | amortized O(1)      |
//! | `erase` at a cursor             | O(log N)            |
//! | `remove` by key                 | O(log N + k log N)  |
//! | `find` / `contains`             | O(log N)            |
//! | `lower_bound` / `upper_bound`   | O(log N)            |
//! | `count` / `equal_range`         | O(log N + k)        |
//! | `len` / `is_empty` / `swap`     | O(1)                |
//!
//! Equal keys are kept in insertion order: a new key is placed after every
//! element equivalent to it.
//!
//! # Examples
//!
//! ```rust
//! use ordtree::multiset::OrderedMultiset;
//!
//! let mut bag = OrderedMultiset::from([5, 1, 3, 3, 7]);
//! assert_eq!(bag.len(), 5);
//! assert_eq!(bag.count(&3), 2);
//!
//! // Bounds
//! assert_eq!(bag.get(bag.lower_bound(&3)), Ok(&3));
//! assert_eq!(bag.get(bag.upper_bound(&3)), Ok(&5));
//! assert!(bag.upper_bound(&7).is_end());
//!
//! // Removing by key removes every copy
//! assert_eq!(bag.remove(&3), 2);
//! assert_eq!(bag.to_string(), "{1, 5, 7}");
//! ```

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Index, RangeBounds};

use crate::compare::{Compare, Less};
use crate::error::{InvariantViolation, TreeError};
use crate::tree::{Arena, Cursor, IntoIter, Iter, NodeAllocator, Range, RedBlackTree};

/// A sorted collection of keys that allows duplicates.
///
/// # Type Parameters
///
/// - `K`: The element type
/// - `C`: The comparator, [`Less`] by default
/// - `A`: The node allocator, [`Arena`] by default
///
/// # Examples
///
/// ```rust
/// use ordtree::multiset::OrderedMultiset;
///
/// let mut bag = OrderedMultiset::new();
/// bag.insert("pear").unwrap();
/// bag.insert("apple").unwrap();
/// bag.insert("pear").unwrap();
///
/// let sorted: Vec<&&str> = bag.iter().collect();
/// assert_eq!(sorted, vec![&"apple", &"pear", &"pear"]);
/// ```
pub struct OrderedMultiset<K, C = Less, A = Arena<K>> {
    tree: RedBlackTree<K, C, A>,
}

impl<K> OrderedMultiset<K, Less, Arena<K>> {
    /// Creates an empty multiset ordered by [`Ord`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RedBlackTree::new(),
        }
    }
}

impl<K, C> OrderedMultiset<K, C, Arena<K>> {
    /// Creates an empty multiset ordered by `compare`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::compare::Greater;
    /// use ordtree::multiset::OrderedMultiset;
    ///
    /// let mut bag = OrderedMultiset::with_compare(Greater);
    /// bag.insert_iter([1, 3, 2]).unwrap();
    /// assert_eq!(bag.first(), Some(&3));
    /// ```
    #[must_use]
    pub fn with_compare(compare: C) -> Self {
        Self {
            tree: RedBlackTree::with_compare(compare),
        }
    }
}

impl<K, A: NodeAllocator<K>> OrderedMultiset<K, Less, A> {
    /// Creates an empty multiset ordered by [`Ord`] that stores its nodes in
    /// `allocator`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::multiset::OrderedMultiset;
    /// use ordtree::tree::Arena;
    ///
    /// let mut bag = OrderedMultiset::with_allocator(Arena::bounded(1));
    /// bag.insert(1).unwrap();
    /// assert!(bag.insert(1).is_err());
    /// assert_eq!(bag.max_len(), 1);
    /// ```
    #[must_use]
    pub fn with_allocator(allocator: A) -> Self {
        Self {
            tree: RedBlackTree::with_allocator(allocator),
        }
    }
}

impl<K, C, A: NodeAllocator<K>> OrderedMultiset<K, C, A> {
    /// Creates an empty multiset from a comparator and an allocator.
    #[must_use]
    pub fn with_compare_and_allocator(compare: C, allocator: A) -> Self {
        Self {
            tree: RedBlackTree::with_compare_and_allocator(compare, allocator),
        }
    }

    /// Returns the number of elements, counting every duplicate.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the multiset has no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the largest number of elements the allocator can ever hold.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.tree.max_len()
    }

    /// Returns the key ordering.
    #[inline]
    #[must_use]
    pub const fn key_comp(&self) -> &C {
        self.tree.compare()
    }

    /// Returns the element ordering, which is the key ordering.
    #[inline]
    #[must_use]
    pub const fn value_comp(&self) -> &C {
        self.tree.compare()
    }

    /// Returns the underlying tree.
    #[inline]
    #[must_use]
    pub const fn as_tree(&self) -> &RedBlackTree<K, C, A> {
        &self.tree
    }

    // =========================================================================
    // Cursors
    // =========================================================================

    /// Returns a cursor to the smallest element, or the end-sentinel.
    #[must_use]
    pub fn begin(&self) -> Cursor {
        self.tree.begin()
    }

    /// Returns the end-sentinel.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Cursor {
        self.tree.end()
    }

    /// Returns a cursor to the largest element, or the end-sentinel.
    #[must_use]
    pub fn rbegin(&self) -> Cursor {
        self.tree.rbegin()
    }

    /// Returns the end-sentinel, the position before the smallest element.
    #[inline]
    #[must_use]
    pub const fn rend(&self) -> Cursor {
        self.tree.rend()
    }

    /// Returns the element at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidIterator`] for the end-sentinel, an erased
    /// element, or a cursor of another multiset.
    pub fn get(&self, cursor: Cursor) -> Result<&K, TreeError> {
        self.tree.get(cursor)
    }

    /// Advances `cursor` to the next element.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::next`].
    pub fn next(&self, cursor: Cursor) -> Result<Cursor, TreeError> {
        self.tree.next(cursor)
    }

    /// Retreats `cursor` to the previous element.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::prev`].
    pub fn prev(&self, cursor: Cursor) -> Result<Cursor, TreeError> {
        self.tree.prev(cursor)
    }

    // =========================================================================
    // Element Access
    // =========================================================================

    /// Returns the smallest element.
    #[must_use]
    pub fn first(&self) -> Option<&K> {
        self.tree.first()
    }

    /// Returns the largest element.
    #[must_use]
    pub fn last(&self) -> Option<&K> {
        self.tree.last()
    }

    /// Returns an in-order iterator.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, C, A> {
        self.tree.iter()
    }

    /// Returns an iterator over the elements within `range`.
    pub fn range<Q, R>(&self, range: R) -> Range<'_, K, C, A>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
        R: RangeBounds<Q>,
    {
        self.tree.range(range)
    }

    /// Returns an iterator over the cursor range `[first, last)`.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::iter_between`].
    pub fn iter_between(&self, first: Cursor, last: Cursor) -> Result<Range<'_, K, C, A>, TreeError> {
        self.tree.iter_between(first, last)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns a cursor to the first element equivalent to `key`, or the
    /// end-sentinel.
    pub fn find<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.find(key)
    }

    /// Returns the number of elements equivalent to `key`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.count(key)
    }

    /// Returns `true` if an element equivalent to `key` exists.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.contains(key)
    }

    /// Returns a cursor to the first element not ordered before `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.lower_bound(key)
    }

    /// Returns a cursor to the first element ordered after `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.upper_bound(key)
    }

    /// Returns the cursor range of elements equivalent to `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordtree::multiset::OrderedMultiset;
    ///
    /// let bag = OrderedMultiset::from([1, 3, 3, 5]);
    /// let (first, last) = bag.equal_range(&3);
    /// assert_eq!(bag.iter_between(first, last).unwrap().count(), 2);
    /// ```
    pub fn equal_range<Q>(&self, key: &Q) -> (Cursor, Cursor)
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.equal_range(key)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Erases the element at `cursor` and returns a cursor to the next one.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::erase`].
    pub fn erase(&mut self, cursor: Cursor) -> Result<Cursor, TreeError> {
        self.tree.erase(cursor)
    }

    /// Erases `[first, last)` and returns `last`.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::erase_range`].
    pub fn erase_range(&mut self, first: Cursor, last: Cursor) -> Result<Cursor, TreeError> {
        self.tree.erase_range(first, last)
    }

    /// Removes the element at `cursor` and returns it.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::remove`].
    pub fn take_at(&mut self, cursor: Cursor) -> Result<K, TreeError> {
        self.tree.remove(cursor)
    }

    /// Removes every element equivalent to `key` and returns how many were
    /// removed.
    pub fn remove<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_key(key)
    }

    /// Removes and returns the smallest element.
    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first()
    }

    /// Removes and returns the largest element.
    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last()
    }

    /// Keeps only the elements for which `keep` returns `true`.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.tree.retain(keep);
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Exchanges the contents of two multisets.
    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }

    /// Moves every element into a new multiset, leaving `self` empty.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        C: Clone,
        A: Default,
    {
        Self {
            tree: self.tree.take(),
        }
    }
}

impl<K, C: Compare<K>, A: NodeAllocator<K>> OrderedMultiset<K, C, A> {
    /// Inserts `key` after every element equivalent to it.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailure`] if the allocator refuses the
    /// node; the multiset is unchanged.
    pub fn insert(&mut self, key: K) -> Result<Cursor, TreeError> {
        self.tree.insert(key)
    }

    /// Inserts `key` using `hint` as a guess for its position.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::insert_with_hint`].
    pub fn insert_with_hint(&mut self, hint: Cursor, key: K) -> Result<Cursor, TreeError> {
        self.tree.insert_with_hint(hint, key)
    }

    /// Inserts a value built in place. Equivalent to [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// See [`insert`](Self::insert).
    pub fn emplace(&mut self, key: K) -> Result<Cursor, TreeError> {
        self.tree.insert(key)
    }

    /// Inserts a value built in place near `hint`. Equivalent to
    /// [`insert_with_hint`](Self::insert_with_hint).
    ///
    /// # Errors
    ///
    /// See [`insert_with_hint`](Self::insert_with_hint).
    pub fn emplace_hint(&mut self, hint: Cursor, key: K) -> Result<Cursor, TreeError> {
        self.tree.insert_with_hint(hint, key)
    }

    /// Inserts every key of `keys` and returns how many were inserted.
    ///
    /// # Errors
    ///
    /// Stops at the first refused allocation. Keys inserted before it stay.
    pub fn insert_iter<I>(&mut self, keys: I) -> Result<usize, TreeError>
    where
        I: IntoIterator<Item = K>,
    {
        self.tree.try_extend(keys)
    }

    /// Moves every element of `other` into `self`.
    ///
    /// # Errors
    ///
    /// See [`RedBlackTree::append`].
    pub fn append(&mut self, other: &mut Self) -> Result<(), TreeError> {
        self.tree.append(&mut other.tree)
    }

    /// Verifies the structural invariants of the underlying tree.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<usize, InvariantViolation> {
        self.tree.check_invariants()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, C: Default, A: NodeAllocator<K> + Default> Default for OrderedMultiset<K, C, A> {
    fn default() -> Self {
        Self {
            tree: RedBlackTree::default(),
        }
    }
}

impl<K, C: Clone, A: NodeAllocator<K> + Clone> Clone for OrderedMultiset<K, C, A> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, C, A: NodeAllocator<K>> fmt::Debug for OrderedMultiset<K, C, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, C, A: NodeAllocator<K>> fmt::Display for OrderedMultiset<K, C, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for key in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}")?;
        }
        write!(formatter, "}}")
    }
}

impl<K: PartialEq, C, A: NodeAllocator<K>> PartialEq for OrderedMultiset<K, C, A> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, C, A: NodeAllocator<K>> Eq for OrderedMultiset<K, C, A> {}

impl<K: PartialOrd, C, A: NodeAllocator<K>> PartialOrd for OrderedMultiset<K, C, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, C, A: NodeAllocator<K>> Ord for OrderedMultiset<K, C, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

/// Hashes the length, then every element in order, so that equal multisets
/// hash equally.
impl<K: Hash, C, A: NodeAllocator<K>> Hash for OrderedMultiset<K, C, A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for key in self {
            key.hash(state);
        }
    }
}

impl<K, C, A: NodeAllocator<K>> Index<Cursor> for OrderedMultiset<K, C, A> {
    type Output = K;

    fn index(&self, cursor: Cursor) -> &Self::Output {
        &self.tree[cursor]
    }
}

impl<K, C, A> FromIterator<K> for OrderedMultiset<K, C, A>
where
    C: Compare<K> + Default,
    A: NodeAllocator<K> + Default,
{
    /// # Panics
    ///
    /// Panics if the allocator refuses a node.
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            tree: RedBlackTree::from_iter(iter),
        }
    }
}

impl<K, C: Compare<K>, A: NodeAllocator<K>> Extend<K> for OrderedMultiset<K, C, A> {
    /// # Panics
    ///
    /// Panics if the allocator refuses a node.
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.tree.extend(iter);
    }
}

impl<K: Ord, const N: usize> From<[K; N]> for OrderedMultiset<K> {
    fn from(keys: [K; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl<K, C, A: NodeAllocator<K>> IntoIterator for OrderedMultiset<K, C, A> {
    type Item = K;
    type IntoIter = IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

impl<'a, K, C, A: NodeAllocator<K>> IntoIterator for &'a OrderedMultiset<K, C, A> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K, C, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Greater;
    use rstest::rstest;
    use std::hash::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[rstest]
    fn test_insert_keeps_duplicates() {
        let mut bag = OrderedMultiset::new();
        for key in [2, 2, 1, 2] {
            bag.insert(key).unwrap();
        }
        assert_eq!(bag.len(), 4);
        assert_eq!(bag.count(&2), 3);
        assert_eq!(bag.to_string(), "{1, 2, 2, 2}");
    }

    #[rstest]
    fn test_emplace_matches_insert() {
        let mut bag = OrderedMultiset::new();
        let cursor = bag.emplace(String::from("b")).unwrap();
        let hinted = bag.emplace_hint(cursor, String::from("a")).unwrap();
        assert_eq!(bag.get(hinted).map(String::as_str), Ok("a"));
        assert_eq!(bag.next(hinted), Ok(cursor));
    }

    #[rstest]
    fn test_remove_by_key_and_position() {
        let mut bag = OrderedMultiset::from([4, 1, 4, 9]);
        let nine = bag.find(&9);
        assert_eq!(bag.take_at(nine), Ok(9));
        assert_eq!(bag.remove(&4), 2);
        assert_eq!(bag.remove(&4), 0);
        assert_eq!(bag.iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[rstest]
    #[case::equal(vec![1, 2, 2], vec![2, 1, 2], Ordering::Equal)]
    #[case::shorter_prefix(vec![1, 2], vec![1, 2, 2], Ordering::Less)]
    #[case::larger_element(vec![1, 3], vec![1, 2, 9], Ordering::Greater)]
    #[case::empty(vec![], vec![0], Ordering::Less)]
    fn test_lexicographic_comparison(
        #[case] lhs: Vec<i32>,
        #[case] rhs: Vec<i32>,
        #[case] expected: Ordering,
    ) {
        let lhs: OrderedMultiset<i32> = lhs.into_iter().collect();
        let rhs: OrderedMultiset<i32> = rhs.into_iter().collect();
        assert_eq!(lhs.cmp(&rhs), expected);
        assert_eq!(lhs == rhs, expected == Ordering::Equal);
        assert_eq!(lhs < rhs, expected == Ordering::Less);
    }

    #[rstest]
    fn test_equal_multisets_hash_equally() {
        let lhs = OrderedMultiset::from([3, 1, 3]);
        let rhs = OrderedMultiset::from([3, 3, 1]);
        assert_eq!(lhs, rhs);
        assert_eq!(hash_of(&lhs), hash_of(&rhs));
    }

    #[rstest]
    fn test_formatting() {
        let bag = OrderedMultiset::from([2, 1]);
        assert_eq!(format!("{bag:?}"), "{1, 2}");
        assert_eq!(format!("{bag}"), "{1, 2}");
        let empty: OrderedMultiset<i32> = OrderedMultiset::new();
        assert_eq!(format!("{empty}"), "{}");
    }

    #[rstest]
    fn test_key_comp_is_value_comp() {
        let bag: OrderedMultiset<i32, Greater> = OrderedMultiset::with_compare(Greater);
        assert!(bag.key_comp().less(&2, &1));
        assert!(bag.value_comp().less(&2, &1));
    }

    #[rstest]
    fn test_swap_and_take() {
        let mut left = OrderedMultiset::from([1]);
        let mut right = OrderedMultiset::from([2, 2]);
        left.swap(&mut right);
        assert_eq!(left.len(), 2);
        let taken = left.take();
        assert!(left.is_empty());
        assert_eq!(taken.count(&2), 2);
        assert_eq!(right.first(), Some(&1));
    }

    #[rstest]
    fn test_index_by_cursor() {
        let bag = OrderedMultiset::from([7, 8]);
        assert_eq!(bag[bag.begin()], 7);
        assert_eq!(bag[bag.rbegin()], 8);
    }

    #[rstest]
    fn test_extend_and_owned_iteration() {
        let mut bag = OrderedMultiset::new();
        bag.extend([3, 1]);
        bag.extend(vec![2]);
        let keys: Vec<i32> = bag.into_iter().collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }
}
