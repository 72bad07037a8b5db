//! Error types for the tree engine and its adapters.
//!
//! Every fallible operation in this crate reports one of the types defined
//! here. Mutating operations are all-or-nothing: when one of them returns an
//! error, the tree is exactly as it was before the call.

use crate::tree::NodeHandle;

/// Represents a node allocation that the allocator refused.
///
/// The rejected item is handed back so that the caller keeps ownership of
/// it, in the same spirit as `Vec::push_within_capacity`.
///
/// # Examples
///
/// ```rust
/// use ordtree::error::AllocationError;
///
/// let error = AllocationError::new("payload", 16);
/// assert_eq!(error.limit(), 16);
/// assert_eq!(
///     format!("{error}"),
///     "node allocation failed: the allocator is limited to 16 nodes"
/// );
/// assert_eq!(error.into_inner(), "payload");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AllocationError<T> {
    item: T,
    limit: usize,
}

impl<T> AllocationError<T> {
    /// Creates an allocation error carrying the rejected item.
    #[inline]
    #[must_use]
    pub const fn new(item: T, limit: usize) -> Self {
        Self { item, limit }
    }

    /// Returns the maximum number of nodes the allocator can hold.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the item whose allocation was refused.
    #[inline]
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Replaces the carried item, keeping the reported limit.
    #[inline]
    pub fn map<U, F>(self, function: F) -> AllocationError<U>
    where
        F: FnOnce(T) -> U,
    {
        AllocationError {
            item: function(self.item),
            limit: self.limit,
        }
    }
}

impl<T> std::fmt::Debug for AllocationError<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AllocationError")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Display for AllocationError<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "node allocation failed: the allocator is limited to {} nodes",
            self.limit
        )
    }
}

impl<T> std::error::Error for AllocationError<T> {}

/// Represents errors reported by tree and multiset operations.
///
/// # Examples
///
/// ```rust
/// use ordtree::error::TreeError;
///
/// let error = TreeError::InvalidIterator { operation: "next" };
/// assert_eq!(
///     format!("{error}"),
///     "next: cursor does not refer to a valid position in this tree"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeError {
    /// A cursor was stepped past the end-sentinel, dereferenced at the
    /// end-sentinel, refers to an erased node, or belongs to another tree.
    InvalidIterator {
        /// The operation that received the cursor.
        operation: &'static str,
    },
    /// The allocator could not produce a node.
    AllocationFailure {
        /// The maximum number of nodes the allocator can hold.
        limit: usize,
    },
    /// An argument broke the operation's contract, for example erasing at
    /// the end-sentinel.
    PreconditionViolation {
        /// The operation whose precondition was broken.
        operation: &'static str,
        /// A short description of the broken precondition.
        reason: &'static str,
    },
}

impl TreeError {
    /// Returns `true` if this is an [`TreeError::InvalidIterator`].
    #[inline]
    #[must_use]
    pub const fn is_invalid_iterator(&self) -> bool {
        matches!(self, Self::InvalidIterator { .. })
    }

    /// Returns `true` if this is an [`TreeError::AllocationFailure`].
    #[inline]
    #[must_use]
    pub const fn is_allocation_failure(&self) -> bool {
        matches!(self, Self::AllocationFailure { .. })
    }

    /// Returns `true` if this is a [`TreeError::PreconditionViolation`].
    #[inline]
    #[must_use]
    pub const fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::PreconditionViolation { .. })
    }
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIterator { operation } => write!(
                formatter,
                "{operation}: cursor does not refer to a valid position in this tree"
            ),
            Self::AllocationFailure { limit } => write!(
                formatter,
                "node allocation failed: the allocator is limited to {limit} nodes"
            ),
            Self::PreconditionViolation { operation, reason } => {
                write!(formatter, "{operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for TreeError {}

impl<T> From<AllocationError<T>> for TreeError {
    fn from(error: AllocationError<T>) -> Self {
        Self::AllocationFailure {
            limit: error.limit(),
        }
    }
}

/// Describes the first broken structural invariant found by
/// [`RedBlackTree::check_invariants`](crate::tree::RedBlackTree::check_invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantViolation {
    /// The root node is red.
    RedRoot,
    /// The root node has a parent link.
    RootHasParent,
    /// A red node has a red child.
    RedChildOfRed {
        /// The red child.
        node: NodeHandle,
    },
    /// The two subtrees of a node have different black-heights.
    BlackHeightMismatch {
        /// The node whose subtrees disagree.
        node: NodeHandle,
    },
    /// A child's parent link does not point back at its parent.
    BrokenParentLink {
        /// The child with the wrong parent link.
        node: NodeHandle,
    },
    /// An in-order neighbour compares before its predecessor.
    OrderViolation {
        /// The node that is out of order.
        node: NodeHandle,
    },
    /// The recorded length disagrees with the number of reachable nodes.
    LengthMismatch {
        /// The length the tree recorded.
        recorded: usize,
        /// The number of nodes a full traversal found.
        counted: usize,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RedRoot => write!(formatter, "the root node is red"),
            Self::RootHasParent => write!(formatter, "the root node has a parent"),
            Self::RedChildOfRed { node } => {
                write!(formatter, "red node {node} has a red parent")
            }
            Self::BlackHeightMismatch { node } => {
                write!(formatter, "subtrees of {node} have different black-heights")
            }
            Self::BrokenParentLink { node } => {
                write!(formatter, "parent link of {node} is broken")
            }
            Self::OrderViolation { node } => {
                write!(formatter, "{node} is ordered before its predecessor")
            }
            Self::LengthMismatch { recorded, counted } => write!(
                formatter,
                "tree records {recorded} elements but {counted} are reachable"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_allocation_error_keeps_item() {
        let error = AllocationError::new(vec![1, 2, 3], 4);
        assert_eq!(error.limit(), 4);
        assert_eq!(error.into_inner(), vec![1, 2, 3]);
    }

    #[rstest]
    fn test_allocation_error_map_keeps_limit() {
        let error = AllocationError::new(7, 2).map(|value| value * 6);
        assert_eq!(error.limit(), 2);
        assert_eq!(error.into_inner(), 42);
    }

    #[rstest]
    fn test_allocation_error_converts_into_tree_error() {
        let error: TreeError = AllocationError::new((), 8).into();
        assert_eq!(error, TreeError::AllocationFailure { limit: 8 });
        assert!(error.is_allocation_failure());
    }

    #[rstest]
    #[case::invalid_iterator(
        TreeError::InvalidIterator { operation: "get" },
        "get: cursor does not refer to a valid position in this tree"
    )]
    #[case::allocation_failure(
        TreeError::AllocationFailure { limit: 3 },
        "node allocation failed: the allocator is limited to 3 nodes"
    )]
    #[case::precondition_violation(
        TreeError::PreconditionViolation { operation: "erase", reason: "cannot erase the end-sentinel" },
        "erase: cannot erase the end-sentinel"
    )]
    fn test_tree_error_display(#[case] error: TreeError, #[case] expected: &str) {
        assert_eq!(format!("{error}"), expected);
    }

    #[rstest]
    fn test_tree_error_predicates() {
        let error = TreeError::PreconditionViolation {
            operation: "erase",
            reason: "cannot erase the end-sentinel",
        };
        assert!(error.is_precondition_violation());
        assert!(!error.is_invalid_iterator());
        assert!(!error.is_allocation_failure());
    }

    #[rstest]
    fn test_length_mismatch_display() {
        let violation = InvariantViolation::LengthMismatch {
            recorded: 3,
            counted: 2,
        };
        assert_eq!(
            format!("{violation}"),
            "tree records 3 elements but 2 are reachable"
        );
    }
}
