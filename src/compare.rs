//! Ordering relations consumed by the tree engine.
//!
//! A comparator answers a single question: is `lhs` ordered strictly before
//! `rhs`? Two keys for which neither is ordered before the other are
//! *equivalent* and form an equal-key run inside a multiset.
//!
//! The relation must be a strict weak ordering (irreflexive, transitive, with
//! transitive equivalence) and must not change for the lifetime of a tree.
//!
//! # Examples
//!
//! ```rust
//! use ordtree::compare::{Compare, Greater, Less, Reversed};
//!
//! assert!(Less.less(&1, &2));
//! assert!(Greater.less(&2, &1));
//! assert!(Reversed(Less).less(&2, &1));
//!
//! // Any `Fn(&T, &T) -> bool` is a comparator too.
//! let by_length = |lhs: &&str, rhs: &&str| lhs.len() < rhs.len();
//! assert!(by_length.less(&"ab", &"abc"));
//! ```

/// A strict weak ordering over `T`.
pub trait Compare<T: ?Sized> {
    /// Returns `true` if `lhs` is ordered strictly before `rhs`.
    fn less(&self, lhs: &T, rhs: &T) -> bool;

    /// Returns `true` if neither argument is ordered before the other.
    #[inline]
    fn equivalent(&self, lhs: &T, rhs: &T) -> bool {
        !self.less(lhs, rhs) && !self.less(rhs, lhs)
    }
}

impl<T, F> Compare<T> for F
where
    T: ?Sized,
    F: Fn(&T, &T) -> bool,
{
    #[inline]
    fn less(&self, lhs: &T, rhs: &T) -> bool {
        self(lhs, rhs)
    }
}

/// Ascending order through [`Ord`]. This is the default comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Less;

impl<T: Ord + ?Sized> Compare<T> for Less {
    #[inline]
    fn less(&self, lhs: &T, rhs: &T) -> bool {
        lhs < rhs
    }
}

/// Descending order through [`Ord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Greater;

impl<T: Ord + ?Sized> Compare<T> for Greater {
    #[inline]
    fn less(&self, lhs: &T, rhs: &T) -> bool {
        lhs > rhs
    }
}

/// Flips the direction of another comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Reversed<C>(pub C);

impl<T: ?Sized, C: Compare<T>> Compare<T> for Reversed<C> {
    #[inline]
    fn less(&self, lhs: &T, rhs: &T) -> bool {
        self.0.less(rhs, lhs)
    }
}
