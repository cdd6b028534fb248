//! Tree descent from a root to a leaf.
//!
//! When every branch node of the ensemble shares one comparison rule and no
//! node tracks missing values, the comparator is hoisted out of the inner
//! loop by monomorphizing [`descend`] per rule. This specialization is the
//! dominant speedup over the mode-switching fallback.

use crate::data::ElementType;
use crate::ensemble::{Ensemble, MissingTrack, NodeMode, TreeNode};

/// Read the split feature, treating out-of-range indices as missing.
#[inline]
fn feature_value<F: ElementType>(row: &[F], feature_id: i32) -> F {
    row.get(feature_id as usize).copied().unwrap_or_else(F::nan)
}

/// Descend from `root` to the leaf selected by `row`.
///
/// Descent is bounded by the ensemble's `max_tree_depth`; on pathological
/// inputs the walk stops at the current node, which then contributes no
/// weights.
#[inline]
pub(crate) fn walk_to_leaf<'e, F: ElementType>(
    ensemble: &'e Ensemble<F>,
    root: u32,
    row: &[F],
) -> &'e TreeNode<F> {
    let nodes = ensemble.nodes();
    let max_depth = ensemble.max_tree_depth();
    let tracks = ensemble.has_missing_tracks();
    let leaf = if ensemble.same_mode() {
        match nodes[root as usize].mode() {
            NodeMode::Leaf => root,
            NodeMode::BranchLeq => descend(nodes, root, row, max_depth, tracks, |v, t| v <= t),
            NodeMode::BranchLt => descend(nodes, root, row, max_depth, tracks, |v, t| v < t),
            NodeMode::BranchGte => descend(nodes, root, row, max_depth, tracks, |v, t| v >= t),
            NodeMode::BranchGt => descend(nodes, root, row, max_depth, tracks, |v, t| v > t),
            NodeMode::BranchEq => descend(nodes, root, row, max_depth, tracks, |v, t| v == t),
            NodeMode::BranchNeq => descend(nodes, root, row, max_depth, tracks, |v, t| v != t),
        }
    } else {
        descend_mixed(nodes, root, row, max_depth)
    };
    &nodes[leaf as usize]
}

/// Specialized descent for a single comparison rule.
#[inline]
fn descend<F: ElementType, C: Fn(F, F) -> bool>(
    nodes: &[TreeNode<F>],
    mut idx: u32,
    row: &[F],
    max_depth: i64,
    track_missing: bool,
    cmp: C,
) -> u32 {
    let mut remaining = max_depth;
    if track_missing {
        loop {
            let node = &nodes[idx as usize];
            if node.is_leaf() || remaining < 0 {
                return idx;
            }
            let value = feature_value(row, node.feature_id);
            let take_true = cmp(value, node.value)
                || (node.missing_track == MissingTrack::True && value.is_nan());
            idx = if take_true { node.true_child } else { node.false_child };
            remaining -= 1;
        }
    } else {
        loop {
            let node = &nodes[idx as usize];
            if node.is_leaf() || remaining < 0 {
                return idx;
            }
            let value = feature_value(row, node.feature_id);
            idx = if cmp(value, node.value) {
                node.true_child
            } else {
                node.false_child
            };
            remaining -= 1;
        }
    }
}

/// Fallback descent switching on the comparison rule at every node.
fn descend_mixed<F: ElementType>(
    nodes: &[TreeNode<F>],
    mut idx: u32,
    row: &[F],
    max_depth: i64,
) -> u32 {
    let mut steps = 0i64;
    while steps <= max_depth {
        let node = &nodes[idx as usize];
        let value = feature_value(row, node.feature_id);
        let track_true = node.missing_track == MissingTrack::True && value.is_nan();
        let threshold = node.value;
        let take_true = match node.mode {
            NodeMode::Leaf => return idx,
            NodeMode::BranchLeq => value <= threshold || track_true,
            NodeMode::BranchLt => value < threshold || track_true,
            NodeMode::BranchGte => value >= threshold || track_true,
            NodeMode::BranchGt => value > threshold || track_true,
            NodeMode::BranchEq => value == threshold || track_true,
            NodeMode::BranchNeq => value != threshold || track_true,
        };
        idx = if take_true { node.true_child } else { node.false_child };
        steps += 1;
    }
    idx
}
