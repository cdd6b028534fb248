//! In-memory tree ensemble representation.
//!
//! An [`Ensemble`] owns one contiguous array of [`TreeNode`]s plus the root
//! index of every tree. Child links are indices into the node array, so the
//! whole structure is movable and can be shared read-only across worker
//! threads. Ensembles are immutable once built; all inference borrows them.

mod attributes;
pub(crate) mod builder;
mod node;

pub use attributes::{ClassifierAttributes, RegressorAttributes};
pub use node::{MissingTrack, NodeId, NodeMode, SparseWeight, TreeNode};

use crate::data::ElementType;
use crate::inference::aggregator::AggregateFunction;
use crate::inference::transform::PostTransform;

/// A built tree ensemble: contiguous nodes, root indices and the aggregation
/// policy shared by the classifier and regressor kernels.
#[derive(Debug, Clone)]
pub struct Ensemble<F> {
    pub(crate) nodes: Box<[TreeNode<F>]>,
    pub(crate) roots: Box<[u32]>,
    pub(crate) n_targets_or_classes: usize,
    pub(crate) base_values: Vec<F>,
    pub(crate) post_transform: PostTransform,
    pub(crate) aggregate: AggregateFunction,
    pub(crate) same_mode: bool,
    pub(crate) has_missing_tracks: bool,
    pub(crate) max_tree_depth: i64,
}

impl<F: ElementType> Ensemble<F> {
    /// Number of nodes across all trees.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.roots.len()
    }

    /// Number of regression targets or classifier classes.
    #[inline]
    pub fn n_targets_or_classes(&self) -> usize {
        self.n_targets_or_classes
    }

    /// Get a node by index.
    #[inline]
    pub fn node(&self, idx: u32) -> &TreeNode<F> {
        &self.nodes[idx as usize]
    }

    /// All nodes, in attribute storage order.
    #[inline]
    pub fn nodes(&self) -> &[TreeNode<F>] {
        &self.nodes
    }

    /// Root node indices, one per tree, in first-appearance order.
    #[inline]
    pub fn roots(&self) -> &[u32] {
        &self.roots
    }

    /// Per-target constants added to the aggregated scores.
    #[inline]
    pub fn base_values(&self) -> &[F] {
        &self.base_values
    }

    /// The final score transform.
    #[inline]
    pub fn post_transform(&self) -> PostTransform {
        self.post_transform
    }

    /// How per-tree contributions combine.
    #[inline]
    pub fn aggregate_function(&self) -> AggregateFunction {
        self.aggregate
    }

    /// Whether every branch node applies the same comparison rule.
    #[inline]
    pub fn same_mode(&self) -> bool {
        self.same_mode
    }

    /// Whether any node tracks missing values to the true branch.
    #[inline]
    pub fn has_missing_tracks(&self) -> bool {
        self.has_missing_tracks
    }

    /// Bound on descent steps per tree.
    #[inline]
    pub fn max_tree_depth(&self) -> i64 {
        self.max_tree_depth
    }

    /// Comparison mode of every node, in storage order.
    pub fn node_modes(&self) -> Vec<NodeMode> {
        self.nodes.iter().map(|n| n.mode()).collect()
    }
}
