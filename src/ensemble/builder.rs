//! Construction of an [`Ensemble`] from the flat operator attribute arrays.
//!
//! The builder allocates one contiguous node array, resolves the
//! `(tree_id, node_id)` child links into indices, derives the tree roots from
//! the storage order, and attaches the sparse leaf weights. Construction is
//! all-or-nothing: any malformed attribute fails with a [`BuildError`] and no
//! ensemble is produced.

use std::collections::HashMap;

use crate::data::ElementType;
use crate::error::BuildError;
use crate::inference::aggregator::AggregateFunction;
use crate::inference::transform::PostTransform;

use super::node::{MissingTrack, NodeId, NodeMode, SparseWeight, TreeNode, NO_CHILD};
use super::Ensemble;

/// Default bound on tree descent, matching the reference runtimes.
pub(crate) const MAX_TREE_DEPTH: i64 = 1000;

/// Borrowed views over the `nodes_*` attribute arrays.
///
/// `hitrates` may be shorter than the node count (missing entries default to
/// -1) and `missing_value_tracks_true` only takes effect when it covers every
/// node, both per the operator schema's optionality rules.
pub(crate) struct NodeArrays<'a, F> {
    pub treeids: &'a [i64],
    pub nodeids: &'a [i64],
    pub featureids: &'a [i64],
    pub values: &'a [F],
    pub hitrates: &'a [F],
    pub modes: &'a [String],
    pub truenodeids: &'a [i64],
    pub falsenodeids: &'a [i64],
    pub missing_value_tracks_true: &'a [i64],
}

/// Attribute names for one family of leaf descriptor arrays.
pub(crate) struct LeafNames {
    pub treeids: &'static str,
    pub ids: &'static str,
    pub weights: &'static str,
}

pub(crate) const TARGET_NAMES: LeafNames = LeafNames {
    treeids: "target_treeids",
    ids: "target_ids",
    weights: "target_weights",
};

pub(crate) const CLASS_NAMES: LeafNames = LeafNames {
    treeids: "class_treeids",
    ids: "class_ids",
    weights: "class_weights",
};

/// Borrowed views over the leaf descriptor arrays
/// (`target_*` or `class_*`).
pub(crate) struct LeafArrays<'a, F> {
    pub treeids: &'a [i64],
    pub nodeids: &'a [i64],
    pub ids: &'a [i64],
    pub weights: &'a [F],
    pub names: LeafNames,
}

/// Converts the flat attribute arrays into a pointer-free [`Ensemble`].
pub(crate) struct EnsembleBuilder<'a, F> {
    nodes: NodeArrays<'a, F>,
    leaves: LeafArrays<'a, F>,
    n_targets_or_classes: usize,
    base_values: &'a [F],
    post_transform: PostTransform,
    aggregate: AggregateFunction,
}

impl<'a, F: ElementType> EnsembleBuilder<'a, F> {
    pub fn new(
        nodes: NodeArrays<'a, F>,
        leaves: LeafArrays<'a, F>,
        n_targets_or_classes: usize,
        base_values: &'a [F],
        post_transform: PostTransform,
        aggregate: AggregateFunction,
    ) -> Self {
        Self {
            nodes,
            leaves,
            n_targets_or_classes,
            base_values,
            post_transform,
            aggregate,
        }
    }

    pub fn build(self) -> Result<Ensemble<F>, BuildError> {
        self.check_lengths()?;

        if self.base_values.len() > 1 && self.base_values.len() != self.n_targets_or_classes {
            return Err(BuildError::BadBaseValues {
                got: self.base_values.len(),
                expected: self.n_targets_or_classes,
            });
        }

        let arrays = &self.nodes;
        let n_nodes = arrays.treeids.len();
        let modes = arrays
            .modes
            .iter()
            .map(|m| NodeMode::parse(m))
            .collect::<Result<Vec<_>, _>>()?;

        // All branch nodes sharing one comparison rule unlocks the
        // specialized traversal loop.
        let mut same_mode = true;
        let mut first_branch_mode = None;
        for &mode in &modes {
            if !mode.is_branch() {
                continue;
            }
            match first_branch_mode {
                None => first_branch_mode = Some(mode),
                Some(first) if mode != first => {
                    same_mode = false;
                    break;
                }
                Some(_) => {}
            }
        }

        let tracks_supplied = arrays.missing_value_tracks_true.len() == n_nodes;
        let has_missing_tracks =
            tracks_supplied && arrays.missing_value_tracks_true.iter().any(|&t| t != 0);

        let mut nodes: Vec<TreeNode<F>> = Vec::with_capacity(n_nodes);
        let mut index: HashMap<NodeId, u32> = HashMap::with_capacity(n_nodes);
        for i in 0..n_nodes {
            let id = NodeId {
                tree_id: arrays.treeids[i] as i32,
                node_id: arrays.nodeids[i] as i32,
            };
            let missing_track = if tracks_supplied {
                if arrays.missing_value_tracks_true[i] == 1 {
                    MissingTrack::True
                } else {
                    MissingTrack::False
                }
            } else {
                MissingTrack::None
            };
            let node = TreeNode {
                id,
                feature_id: arrays.featureids[i] as i32,
                value: arrays.values[i],
                hitrate: arrays
                    .hitrates
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| F::from_f64(-1.0)),
                mode: modes[i],
                true_child: NO_CHILD,
                false_child: NO_CHILD,
                missing_track,
                weights: Vec::new(),
            };
            if index.insert(id, i as u32).is_some() {
                return Err(BuildError::DuplicateNode {
                    tree_id: id.tree_id,
                    node_id: id.node_id,
                });
            }
            nodes.push(node);
        }

        for i in 0..n_nodes {
            if !nodes[i].mode.is_branch() {
                continue;
            }
            let id = nodes[i].id;
            let true_child = resolve_child(&index, &nodes, id, arrays.truenodeids[i], "true")?;
            let false_child = resolve_child(&index, &nodes, id, arrays.falsenodeids[i], "false")?;
            nodes[i].true_child = true_child;
            nodes[i].false_child = false_child;
        }

        // One root per run of tree ids, in storage order.
        let mut roots = Vec::new();
        let mut previous = None;
        for (i, node) in nodes.iter().enumerate() {
            if previous != Some(node.id.tree_id) {
                roots.push(i as u32);
            }
            previous = Some(node.id.tree_id);
        }

        let leaves = &self.leaves;
        for i in 0..leaves.nodeids.len() {
            let id = NodeId {
                tree_id: leaves.treeids[i] as i32,
                node_id: leaves.nodeids[i] as i32,
            };
            let &node_idx = index.get(&id).ok_or(BuildError::BadWeightTarget {
                index: i,
                tree_id: id.tree_id,
                node_id: id.node_id,
            })?;
            nodes[node_idx as usize].weights.push(SparseWeight {
                target_id: leaves.ids[i],
                value: leaves.weights[i],
            });
        }

        Ok(Ensemble {
            nodes: nodes.into_boxed_slice(),
            roots: roots.into_boxed_slice(),
            n_targets_or_classes: self.n_targets_or_classes,
            base_values: self.base_values.to_vec(),
            post_transform: self.post_transform,
            aggregate: self.aggregate,
            same_mode,
            has_missing_tracks,
            max_tree_depth: MAX_TREE_DEPTH,
        })
    }

    fn check_lengths(&self) -> Result<(), BuildError> {
        let n = self.nodes.treeids.len();
        let node_arrays = [
            ("nodes_nodeids", self.nodes.nodeids.len()),
            ("nodes_featureids", self.nodes.featureids.len()),
            ("nodes_values", self.nodes.values.len()),
            ("nodes_modes", self.nodes.modes.len()),
            ("nodes_truenodeids", self.nodes.truenodeids.len()),
            ("nodes_falsenodeids", self.nodes.falsenodeids.len()),
        ];
        for (attribute, got) in node_arrays {
            if got != n {
                return Err(BuildError::NodeArrayMismatch {
                    attribute,
                    got,
                    expected: n,
                });
            }
        }

        let m = self.leaves.nodeids.len();
        let leaf_arrays = [
            (self.leaves.names.treeids, self.leaves.treeids.len()),
            (self.leaves.names.ids, self.leaves.ids.len()),
            (self.leaves.names.weights, self.leaves.weights.len()),
        ];
        for (attribute, got) in leaf_arrays {
            if got != m {
                return Err(BuildError::NodeArrayMismatch {
                    attribute,
                    got,
                    expected: m,
                });
            }
        }
        Ok(())
    }
}

fn resolve_child<F: ElementType>(
    index: &HashMap<NodeId, u32>,
    nodes: &[TreeNode<F>],
    parent: NodeId,
    child_node_id: i64,
    link: &'static str,
) -> Result<u32, BuildError> {
    let key = NodeId {
        tree_id: parent.tree_id,
        node_id: child_node_id as i32,
    };
    let &child_idx = index.get(&key).ok_or(BuildError::DanglingChild {
        tree_id: parent.tree_id,
        node_id: parent.node_id,
        child_id: key.node_id,
        link,
    })?;
    let child = &nodes[child_idx as usize];
    if child.id.node_id == parent.node_id {
        return Err(BuildError::SelfLoop {
            tree_id: parent.tree_id,
            node_id: parent.node_id,
            link,
        });
    }
    if child.id.tree_id != parent.tree_id {
        return Err(BuildError::CrossTree {
            tree_id: parent.tree_id,
            node_id: parent.node_id,
            child_tree_id: child.id.tree_id,
            link,
        });
    }
    Ok(child_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump_nodes() -> (Vec<i64>, Vec<i64>, Vec<i64>, Vec<f32>, Vec<String>, Vec<i64>, Vec<i64>) {
        // One tree: root 0 splits feature 0 at 0.5, leaves 1 and 2.
        (
            vec![0, 0, 0],                  // treeids
            vec![0, 1, 2],                  // nodeids
            vec![0, 0, 0],                  // featureids
            vec![0.5, 0.0, 0.0],            // values
            vec!["BRANCH_LEQ".to_owned(), "LEAF".to_owned(), "LEAF".to_owned()],
            vec![1, 0, 0],                  // truenodeids
            vec![2, 0, 0],                  // falsenodeids
        )
    }

    fn build_stump(
        truenodeids: Vec<i64>,
        falsenodeids: Vec<i64>,
        nodeids: Vec<i64>,
    ) -> Result<Ensemble<f32>, BuildError> {
        let (treeids, _, featureids, values, modes, _, _) = stump_nodes();
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &truenodeids,
                falsenodeids: &falsenodeids,
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[0, 0],
                nodeids: &[1, 2],
                ids: &[0, 0],
                weights: &[1.0, 2.0],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        builder.build()
    }

    #[test]
    fn builds_single_stump() {
        let ensemble = build_stump(vec![1, 0, 0], vec![2, 0, 0], vec![0, 1, 2]).unwrap();
        assert_eq!(ensemble.n_nodes(), 3);
        assert_eq!(ensemble.n_trees(), 1);
        assert!(ensemble.same_mode());
        assert!(!ensemble.has_missing_tracks());

        let root = ensemble.node(ensemble.roots()[0]);
        assert!(!root.is_leaf());
        assert_eq!(root.threshold(), 0.5);
        assert_eq!(root.hitrate(), -1.0); // hitrates attribute absent
        assert_eq!(root.feature_id(), 0);
        assert_eq!(root.missing_track(), crate::ensemble::MissingTrack::None);
        assert_eq!(ensemble.node(root.true_child).weights()[0].value, 1.0);
        assert_eq!(ensemble.node(root.false_child).weights()[0].value, 2.0);
    }

    #[test]
    fn rejects_duplicate_node() {
        let err = build_stump(vec![1, 0, 0], vec![2, 0, 0], vec![0, 1, 1]).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateNode { tree_id: 0, node_id: 1 }));
    }

    #[test]
    fn rejects_dangling_child() {
        let err = build_stump(vec![7, 0, 0], vec![2, 0, 0], vec![0, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::DanglingChild { child_id: 7, link: "true", .. }
        ));
    }

    #[test]
    fn rejects_self_loop() {
        let err = build_stump(vec![0, 0, 0], vec![2, 0, 0], vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, BuildError::SelfLoop { node_id: 0, link: "true", .. }));
    }

    #[test]
    fn cross_tree_link_fails_same_tree_lookup() {
        // Two trees, where tree 0's root names tree 1's leaf as a child.
        let treeids = vec![0i64, 0, 1];
        let nodeids = vec![0i64, 1, 2];
        let featureids = vec![0i64, 0, 0];
        let values = vec![0.5f32, 0.0, 0.0];
        let modes = vec!["BRANCH_LEQ".to_owned(), "LEAF".to_owned(), "LEAF".to_owned()];
        // The true child id 2 only exists in tree 1, so the same-tree lookup
        // fails before any cross-tree link can be formed.
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &[2, 0, 0],
                falsenodeids: &[1, 0, 0],
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[],
                nodeids: &[],
                ids: &[],
                weights: &[],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        let err = builder.build().unwrap_err();
        assert!(matches!(err, BuildError::DanglingChild { child_id: 2, .. }));
    }

    #[test]
    fn rejects_bad_weight_target() {
        let (treeids, nodeids, featureids, values, modes, truenodeids, falsenodeids) =
            stump_nodes();
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &truenodeids,
                falsenodeids: &falsenodeids,
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[0],
                nodeids: &[9],
                ids: &[0],
                weights: &[1.0f32],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        let err = builder.build().unwrap_err();
        assert!(matches!(err, BuildError::BadWeightTarget { index: 0, node_id: 9, .. }));
    }

    #[test]
    fn rejects_unknown_mode() {
        let (treeids, nodeids, featureids, values, _, truenodeids, falsenodeids) = stump_nodes();
        let modes = vec!["SPLIT".to_owned(), "LEAF".to_owned(), "LEAF".to_owned()];
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &truenodeids,
                falsenodeids: &falsenodeids,
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[],
                nodeids: &[],
                ids: &[],
                weights: &[],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        assert!(matches!(builder.build(), Err(BuildError::UnknownMode(_))));
    }

    #[test]
    fn rejects_bad_base_values() {
        let (treeids, nodeids, featureids, values, modes, truenodeids, falsenodeids) =
            stump_nodes();
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &truenodeids,
                falsenodeids: &falsenodeids,
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[],
                nodeids: &[],
                ids: &[],
                weights: &[],
                names: TARGET_NAMES,
            },
            2,
            &[0.1, 0.2, 0.3],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        let err = builder.build().unwrap_err();
        assert!(matches!(err, BuildError::BadBaseValues { got: 3, expected: 2 }));
    }

    #[test]
    fn rejects_node_array_length_mismatch() {
        let (treeids, nodeids, featureids, values, modes, truenodeids, _) = stump_nodes();
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &truenodeids,
                falsenodeids: &[2, 0],
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[],
                nodeids: &[],
                ids: &[],
                weights: &[],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            BuildError::NodeArrayMismatch { attribute: "nodes_falsenodeids", got: 2, expected: 3 }
        ));
    }

    #[test]
    fn same_mode_false_for_mixed_rules() {
        // Root LEQ with a GT branch below it.
        let treeids = vec![0i64; 5];
        let nodeids = vec![0i64, 1, 2, 3, 4];
        let featureids = vec![0i64; 5];
        let values = vec![0.5f32, 0.3, 0.0, 0.0, 0.0];
        let modes = vec![
            "BRANCH_LEQ".to_owned(),
            "BRANCH_GT".to_owned(),
            "LEAF".to_owned(),
            "LEAF".to_owned(),
            "LEAF".to_owned(),
        ];
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &[1, 3, 0, 0, 0],
                falsenodeids: &[2, 4, 0, 0, 0],
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[],
                nodeids: &[],
                ids: &[],
                weights: &[],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        let ensemble = builder.build().unwrap();
        assert!(!ensemble.same_mode());
    }

    #[test]
    fn missing_tracks_detected_only_when_full_and_nonzero() {
        let (treeids, nodeids, featureids, values, modes, truenodeids, falsenodeids) =
            stump_nodes();
        for (tracks, expected) in [
            (vec![], false),
            (vec![0i64, 0, 0], false),
            (vec![1i64, 0, 0], true),
        ] {
            let builder = EnsembleBuilder::new(
                NodeArrays {
                    treeids: &treeids,
                    nodeids: &nodeids,
                    featureids: &featureids,
                    values: &values,
                    hitrates: &[],
                    modes: &modes,
                    truenodeids: &truenodeids,
                    falsenodeids: &falsenodeids,
                    missing_value_tracks_true: &tracks,
                },
                LeafArrays {
                    treeids: &[],
                    nodeids: &[],
                    ids: &[],
                    weights: &[],
                    names: TARGET_NAMES,
                },
                1,
                &[],
                PostTransform::None,
                AggregateFunction::Sum,
            );
            let ensemble = builder.build().unwrap();
            assert_eq!(ensemble.has_missing_tracks(), expected);
        }
    }

    #[test]
    fn roots_follow_tree_id_runs() {
        // Three trees interleaved as runs: 0, 0, 5, 5, 2.
        let treeids = vec![0i64, 0, 5, 5, 2];
        let nodeids = vec![0i64, 1, 0, 1, 0];
        let featureids = vec![0i64; 5];
        let values = vec![0.0f32; 5];
        let modes = vec!["LEAF".to_owned(); 5];
        let builder = EnsembleBuilder::new(
            NodeArrays {
                treeids: &treeids,
                nodeids: &nodeids,
                featureids: &featureids,
                values: &values,
                hitrates: &[],
                modes: &modes,
                truenodeids: &[0; 5],
                falsenodeids: &[0; 5],
                missing_value_tracks_true: &[],
            },
            LeafArrays {
                treeids: &[],
                nodeids: &[],
                ids: &[],
                weights: &[],
                names: TARGET_NAMES,
            },
            1,
            &[],
            PostTransform::None,
            AggregateFunction::Sum,
        );
        let ensemble = builder.build().unwrap();
        assert_eq!(ensemble.roots(), &[0, 2, 4]);
        assert_eq!(ensemble.n_trees(), 3);
    }
}
