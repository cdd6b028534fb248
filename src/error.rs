//! Error types for ensemble construction and inference.

use thiserror::Error;

/// Error raised while building an [`Ensemble`] from operator attributes.
///
/// All variants are fatal: no partially-built ensemble is ever observable.
///
/// [`Ensemble`]: crate::ensemble::Ensemble
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A `nodes_modes` entry is not one of the six branch modes or `LEAF`.
    #[error("unknown node mode {0:?}")]
    UnknownMode(String),

    /// The `post_transform` attribute names no known transform.
    #[error("unknown post transform {0:?}")]
    UnknownPostTransform(String),

    /// The `aggregate_function` attribute names no known aggregate.
    #[error("unknown aggregate function {0:?}")]
    UnknownAggregate(String),

    /// `classlabels_strings` is non-empty; only integer labels are handled.
    #[error("string class labels are not supported, use classlabels_int64s")]
    StringLabelsUnsupported,

    /// A node attribute array disagrees with `nodes_treeids` on length.
    #[error("attribute {attribute} has {got} entries, expected {expected}")]
    NodeArrayMismatch {
        attribute: &'static str,
        got: usize,
        expected: usize,
    },

    /// The same `(tree_id, node_id)` pair appears twice.
    #[error("node {node_id} in tree {tree_id} is already there")]
    DuplicateNode { tree_id: i32, node_id: i32 },

    /// A branch node links to a `(tree_id, node_id)` that does not exist.
    #[error("unable to find {link} child {child_id} of node {node_id} in tree {tree_id}")]
    DanglingChild {
        tree_id: i32,
        node_id: i32,
        child_id: i32,
        link: &'static str,
    },

    /// A branch node links to itself.
    #[error("{link} child of node {node_id} in tree {tree_id} points to itself")]
    SelfLoop {
        tree_id: i32,
        node_id: i32,
        link: &'static str,
    },

    /// A branch node links into a different tree.
    #[error(
        "{link} child of node {node_id} in tree {tree_id} points into tree {child_tree_id}"
    )]
    CrossTree {
        tree_id: i32,
        node_id: i32,
        child_tree_id: i32,
        link: &'static str,
    },

    /// A leaf weight references a `(tree_id, node_id)` that does not exist.
    #[error("leaf weight {index} references missing node {node_id} in tree {tree_id}")]
    BadWeightTarget {
        index: usize,
        tree_id: i32,
        node_id: i32,
    },

    /// `base_values` has a length other than 0, 1 or the target/class count.
    #[error("base_values has {got} entries, expected 0, 1 or {expected}")]
    BadBaseValues { got: usize, expected: usize },
}

/// Error raised when a compute-time input is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    /// The input tensor is not two-dimensional.
    #[error("input must have 2 dimensions, got {ndim}")]
    BadShape { ndim: usize },

    /// The input storage length disagrees with the declared shape.
    #[error("input of length {len} does not match shape ({num_rows}, {num_features})")]
    SizeMismatch {
        len: usize,
        num_rows: usize,
        num_features: usize,
    },
}
