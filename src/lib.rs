//! # ordtree
//!
//! A mutable red-black tree that keeps duplicate keys, with checked cursors,
//! and an ordered multiset built on top of it.
//!
//! ## Overview
//!
//! - **Tree Engine**: [`tree::RedBlackTree`], balanced insertion and erasure
//!   with equal keys kept in insertion order
//! - **Cursors**: [`tree::Cursor`], positions that survive rebalancing and
//!   are rejected once their element is erased
//! - **Allocation**: [`tree::NodeAllocator`] and the default
//!   [`tree::Arena`], optionally bounded
//! - **Ordering**: [`compare::Compare`] comparators, [`Ord`] by default
//! - **Ordered Multiset**: [`multiset::OrderedMultiset`], the sorted-bag
//!   interface over the engine
//!
//! ## Feature Flags
//!
//! - `multiset`: The ordered multiset adapter (enabled by default)
//!
//! ## Example
//!
//! ```rust
//! use ordtree::prelude::*;
//!
//! let mut bag = OrderedMultiset::new();
//! for key in [5, 5, 5] {
//!     bag.insert(key).unwrap();
//! }
//! assert_eq!(bag.count(&5), 3);
//! assert!(bag.check_invariants().is_ok());
//! ```
//!
//! ## Logging
//!
//! The crate reports allocator refusals and whole-tree operations through
//! the [`log`] facade. Install any logger to see them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use ordtree::prelude::*;
/// ```
pub mod prelude {
    pub use crate::compare::{Compare, Greater, Less, Reversed};
    pub use crate::error::{AllocationError, InvariantViolation, TreeError};
    pub use crate::tree::{Arena, Cursor, NodeAllocator, RedBlackTree};

    #[cfg(feature = "multiset")]
    pub use crate::multiset::OrderedMultiset;
}

pub mod compare;
pub mod error;
pub mod tree;

#[cfg(feature = "multiset")]
pub mod multiset;
