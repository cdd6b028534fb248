//! Decision node value types.

use crate::data::ElementType;
use crate::error::BuildError;

/// Sentinel child index used by leaves.
pub(crate) const NO_CHILD: u32 = u32::MAX;

/// Identifier of a node inside an ensemble: the owning tree plus the node's
/// id within that tree, as supplied by the `nodes_treeids` / `nodes_nodeids`
/// attribute arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub tree_id: i32,
    pub node_id: i32,
}

/// One leaf contribution: a target (or class) index and its weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseWeight<F> {
    pub target_id: i64,
    pub value: F,
}

/// Comparison rule applied at a branch node, or `Leaf`.
///
/// The string forms are the `nodes_modes` attribute values of the ONNX-ML
/// operators and must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    BranchLeq,
    BranchLt,
    BranchGte,
    BranchGt,
    BranchEq,
    BranchNeq,
    Leaf,
}

impl NodeMode {
    /// Parse a `nodes_modes` attribute entry.
    pub fn parse(value: &str) -> Result<Self, BuildError> {
        match value {
            "BRANCH_LEQ" => Ok(NodeMode::BranchLeq),
            "BRANCH_LT" => Ok(NodeMode::BranchLt),
            "BRANCH_GTE" => Ok(NodeMode::BranchGte),
            "BRANCH_GT" => Ok(NodeMode::BranchGt),
            "BRANCH_EQ" => Ok(NodeMode::BranchEq),
            "BRANCH_NEQ" => Ok(NodeMode::BranchNeq),
            "LEAF" => Ok(NodeMode::Leaf),
            _ => Err(BuildError::UnknownMode(value.to_owned())),
        }
    }

    /// The operator-schema spelling of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeMode::BranchLeq => "BRANCH_LEQ",
            NodeMode::BranchLt => "BRANCH_LT",
            NodeMode::BranchGte => "BRANCH_GTE",
            NodeMode::BranchGt => "BRANCH_GT",
            NodeMode::BranchEq => "BRANCH_EQ",
            NodeMode::BranchNeq => "BRANCH_NEQ",
            NodeMode::Leaf => "LEAF",
        }
    }

    /// Whether this is a branch (non-leaf) mode.
    #[inline]
    pub fn is_branch(self) -> bool {
        self != NodeMode::Leaf
    }
}

/// Missing-value handling at a branch node.
///
/// `True` forces the true branch when the split feature is NaN. `False` and
/// `None` leave the comparison result untouched; the distinction only records
/// whether the `nodes_missing_value_tracks_true` array was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingTrack {
    None,
    True,
    False,
}

/// One decision node of an ensemble.
///
/// Children are indices into the ensemble's contiguous node array, which
/// keeps the ensemble movable and safe to share across threads. Leaves carry
/// `NO_CHILD` in both slots and their sparse weight list; branch nodes carry
/// resolved child indices and an empty weight list.
#[derive(Debug, Clone)]
pub struct TreeNode<F> {
    pub(crate) id: NodeId,
    pub(crate) feature_id: i32,
    pub(crate) value: F,
    pub(crate) hitrate: F,
    pub(crate) mode: NodeMode,
    pub(crate) true_child: u32,
    pub(crate) false_child: u32,
    pub(crate) missing_track: MissingTrack,
    pub(crate) weights: Vec<SparseWeight<F>>,
}

impl<F: ElementType> TreeNode<F> {
    /// Identifier of this node.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Split feature index (meaningless on leaves).
    #[inline]
    pub fn feature_id(&self) -> i32 {
        self.feature_id
    }

    /// Split threshold (meaningless on leaves).
    #[inline]
    pub fn threshold(&self) -> F {
        self.value
    }

    /// Training hit rate, or -1 when the attribute was not supplied.
    #[inline]
    pub fn hitrate(&self) -> F {
        self.hitrate
    }

    /// Comparison mode.
    #[inline]
    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    /// Missing-value track for this node.
    #[inline]
    pub fn missing_track(&self) -> MissingTrack {
        self.missing_track
    }

    /// Whether this node is a leaf.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.mode == NodeMode::Leaf
    }

    /// Leaf weights, in attribute order. Empty on branch nodes.
    #[inline]
    pub fn weights(&self) -> &[SparseWeight<F>] {
        &self.weights
    }
}
