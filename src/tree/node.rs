//! Node layout of the red-black tree.

use std::fmt;

use static_assertions::{assert_eq_size, assert_impl_all};

// =============================================================================
// Color Definition
// =============================================================================

/// The color of a red-black tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Color {
    /// A red node. Its children are always black.
    Red,
    /// A black node. Absent children count as black.
    Black,
}

// =============================================================================
// Side Definition
// =============================================================================

/// Which child slot of a node is meant.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub(crate) const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

// =============================================================================
// Handle Definition
// =============================================================================

/// A stable, non-owning reference to a node stored in a
/// [`NodeAllocator`](super::NodeAllocator).
///
/// Handles carry the generation of the slot they were issued for, so a
/// handle to an erased node never aliases a node allocated later in the same
/// slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

assert_eq_size!(NodeHandle, u64);
assert_impl_all!(NodeHandle: Copy, Send, Sync);

impl NodeHandle {
    /// Creates a handle for slot `index` at `generation`.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index this handle points at.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the slot generation this handle was issued for.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "node #{}@{}", self.index, self.generation)
    }
}

// =============================================================================
// Node Definition
// =============================================================================

/// A single tree element: a key, a color, and links to its neighbours.
///
/// Only the child links express ownership; the parent link is a navigational
/// back-reference. Nodes are created by the tree and handed to the allocator,
/// which stores them until the tree deallocates them again.
#[derive(Clone, Debug)]
pub struct Node<K> {
    key: K,
    color: Color,
    parent: Option<NodeHandle>,
    left: Option<NodeHandle>,
    right: Option<NodeHandle>,
}

impl<K> Node<K> {
    /// Creates a detached red node.
    #[inline]
    pub(crate) const fn new_red(key: K) -> Self {
        Self {
            key,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        }
    }

    /// Returns the stored key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Consumes the node and returns its key.
    #[inline]
    pub fn into_key(self) -> K {
        self.key
    }

    /// Returns the node color.
    #[inline]
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Returns `true` if the node is red.
    #[inline]
    #[must_use]
    pub const fn is_red(&self) -> bool {
        matches!(self.color, Color::Red)
    }

    /// Returns the parent link.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns the left child link.
    #[inline]
    #[must_use]
    pub const fn left(&self) -> Option<NodeHandle> {
        self.left
    }

    /// Returns the right child link.
    #[inline]
    #[must_use]
    pub const fn right(&self) -> Option<NodeHandle> {
        self.right
    }

    #[inline]
    pub(crate) const fn child(&self, side: Side) -> Option<NodeHandle> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[inline]
    pub(crate) const fn set_child(&mut self, side: Side, child: Option<NodeHandle>) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }

    #[inline]
    pub(crate) const fn set_parent(&mut self, parent: Option<NodeHandle>) {
        self.parent = parent;
    }

    #[inline]
    pub(crate) const fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_new_node_is_red_and_detached() {
        let node = Node::new_red(7);
        assert_eq!(*node.key(), 7);
        assert!(node.is_red());
        assert_eq!(node.parent(), None);
        assert_eq!(node.left(), None);
        assert_eq!(node.right(), None);
    }

    #[rstest]
    fn test_set_child_by_side() {
        let mut node = Node::new_red("key");
        let left = NodeHandle::new(1, 0);
        let right = NodeHandle::new(2, 0);
        node.set_child(Side::Left, Some(left));
        node.set_child(Side::Right, Some(right));
        assert_eq!(node.child(Side::Left), Some(left));
        assert_eq!(node.child(Side::Right), Some(right));
        assert_eq!(node.child(Side::Left.opposite()), Some(right));
    }

    #[rstest]
    fn test_recolor() {
        let mut node = Node::new_red(1);
        node.set_color(Color::Black);
        assert_eq!(node.color(), Color::Black);
        assert!(!node.is_red());
    }

    #[rstest]
    fn test_handle_display() {
        assert_eq!(format!("{}", NodeHandle::new(4, 2)), "node #4@2");
    }

    #[rstest]
    fn test_into_key() {
        let node = Node::new_red(String::from("owned"));
        assert_eq!(node.into_key(), "owned");
    }
}
