//! The red-black tree engine.
//!
//! This module provides the building blocks shared by the ordered containers
//! of this crate:
//!
//! - [`RedBlackTree`]: the balanced tree with duplicate keys
//! - [`Cursor`]: a checked position inside a tree
//! - [`Iter`], [`Range`], [`IntoIter`]: in-order iterators
//! - [`NodeAllocator`] and [`Arena`]: where nodes live
//! - [`Node`], [`NodeHandle`], [`Color`]: the node layout
//!
//! # Examples
//!
//! ```rust
//! use ordtree::tree::RedBlackTree;
//!
//! let mut tree: RedBlackTree<i32> = [2, 4, 6].into_iter().collect();
//! let four = tree.find(&4);
//! let six = tree.erase(four).unwrap();
//! assert_eq!(tree[six], 6);
//!
//! tree.insert(4).unwrap();
//! assert!(tree.iter().copied().eq([2, 4, 6]));
//! assert!(tree.check_invariants().is_ok());
//! ```

mod allocator;
mod cursor;
mod engine;
mod node;

pub use allocator::{Arena, NodeAllocator};
pub use cursor::{Cursor, IntoIter, Iter, Range};
pub use engine::RedBlackTree;
pub use node::{Color, Node, NodeHandle};
