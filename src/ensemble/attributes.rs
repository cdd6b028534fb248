//! Flat attribute arrays of the ONNX-ML tree ensemble operators.
//!
//! Field names match the operator schemas verbatim so the structs can be
//! populated directly from decoded node protos or from JSON fixtures.
//! Arrays are indexed by node position; nodes of a tree are stored
//! contiguously, with every tree's nodes appearing as one run.

use serde::{Deserialize, Serialize};

/// Attributes of `TreeEnsembleRegressor`.
///
/// `nodes_hitrates` and `nodes_missing_value_tracks_true` are optional in the
/// schema; an empty vector stands for an absent attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressorAttributes<F> {
    pub aggregate_function: String,
    pub base_values: Vec<F>,
    pub n_targets: i64,
    pub nodes_falsenodeids: Vec<i64>,
    pub nodes_featureids: Vec<i64>,
    pub nodes_hitrates: Vec<F>,
    pub nodes_missing_value_tracks_true: Vec<i64>,
    pub nodes_modes: Vec<String>,
    pub nodes_nodeids: Vec<i64>,
    pub nodes_treeids: Vec<i64>,
    pub nodes_truenodeids: Vec<i64>,
    pub nodes_values: Vec<F>,
    pub post_transform: String,
    pub target_ids: Vec<i64>,
    pub target_nodeids: Vec<i64>,
    pub target_treeids: Vec<i64>,
    pub target_weights: Vec<F>,
}

impl<F> Default for RegressorAttributes<F> {
    /// Empty ensemble with the schema's default `aggregate_function`
    /// (`"SUM"`), `post_transform` (`"NONE"`) and a single target.
    fn default() -> Self {
        Self {
            aggregate_function: "SUM".to_owned(),
            base_values: Vec::new(),
            n_targets: 1,
            nodes_falsenodeids: Vec::new(),
            nodes_featureids: Vec::new(),
            nodes_hitrates: Vec::new(),
            nodes_missing_value_tracks_true: Vec::new(),
            nodes_modes: Vec::new(),
            nodes_nodeids: Vec::new(),
            nodes_treeids: Vec::new(),
            nodes_truenodeids: Vec::new(),
            nodes_values: Vec::new(),
            post_transform: "NONE".to_owned(),
            target_ids: Vec::new(),
            target_nodeids: Vec::new(),
            target_treeids: Vec::new(),
            target_weights: Vec::new(),
        }
    }
}

/// Attributes of `TreeEnsembleClassifier`.
///
/// Only integer labels are handled; `classlabels_strings` must be empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierAttributes<F> {
    pub base_values: Vec<F>,
    pub class_ids: Vec<i64>,
    pub class_nodeids: Vec<i64>,
    pub class_treeids: Vec<i64>,
    pub class_weights: Vec<F>,
    pub classlabels_int64s: Vec<i64>,
    pub classlabels_strings: Vec<String>,
    pub nodes_falsenodeids: Vec<i64>,
    pub nodes_featureids: Vec<i64>,
    pub nodes_hitrates: Vec<F>,
    pub nodes_missing_value_tracks_true: Vec<i64>,
    pub nodes_modes: Vec<String>,
    pub nodes_nodeids: Vec<i64>,
    pub nodes_treeids: Vec<i64>,
    pub nodes_truenodeids: Vec<i64>,
    pub nodes_values: Vec<F>,
    pub post_transform: String,
}

impl<F> Default for ClassifierAttributes<F> {
    /// Empty ensemble with the schema's default `post_transform` (`"NONE"`).
    fn default() -> Self {
        Self {
            base_values: Vec::new(),
            class_ids: Vec::new(),
            class_nodeids: Vec::new(),
            class_treeids: Vec::new(),
            class_weights: Vec::new(),
            classlabels_int64s: Vec::new(),
            classlabels_strings: Vec::new(),
            nodes_falsenodeids: Vec::new(),
            nodes_featureids: Vec::new(),
            nodes_hitrates: Vec::new(),
            nodes_missing_value_tracks_true: Vec::new(),
            nodes_modes: Vec::new(),
            nodes_nodeids: Vec::new(),
            nodes_treeids: Vec::new(),
            nodes_truenodeids: Vec::new(),
            nodes_values: Vec::new(),
            post_transform: "NONE".to_owned(),
        }
    }
}
