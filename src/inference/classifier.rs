//! The `TreeEnsembleClassifier` kernel.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::data::{DataMatrix, ElementType};
use crate::ensemble::builder::{EnsembleBuilder, LeafArrays, NodeArrays, CLASS_NAMES};
use crate::ensemble::{ClassifierAttributes, Ensemble};
use crate::error::BuildError;

use super::aggregator::{
    finalize_classifier_row, Accumulate, AggregateFunction, ClassifierContext, SumAccumulate,
};
use super::output::PredictionOutput;
use super::transform::PostTransform;
use super::traversal::walk_to_leaf;

/// Labels and class scores produced by a classifier batch.
#[derive(Debug, Clone)]
pub struct ClassifierOutput<F = f32> {
    labels: Vec<i64>,
    scores: PredictionOutput<F>,
}

impl<F: ElementType> ClassifierOutput<F> {
    /// Predicted label per row.
    #[inline]
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Per-class scores, shaped `(num_rows, n_classes)`.
    #[inline]
    pub fn scores(&self) -> &PredictionOutput<F> {
        &self.scores
    }

    /// Consume into the label vector and score matrix.
    pub fn into_parts(self) -> (Vec<i64>, PredictionOutput<F>) {
        (self.labels, self.scores)
    }
}

/// CPU kernel for the ONNX-ML `TreeEnsembleClassifier` operator.
///
/// Leaf votes always sum; the classifier's aggregation policy lives entirely
/// in its finalization (argmax, binary shaping, base values). Only integer
/// class labels are supported.
#[derive(Debug, Clone)]
pub struct TreeEnsembleClassifier<F> {
    ensemble: Ensemble<F>,
    class_labels: Vec<i64>,
    classes_seen: BTreeSet<i64>,
    weights_are_all_positive: bool,
}

impl<F: ElementType> TreeEnsembleClassifier<F> {
    /// Build the kernel from operator attributes.
    ///
    /// Fails on any malformed attribute; no partially-built kernel is ever
    /// observable.
    pub fn new(attrs: &ClassifierAttributes<F>) -> Result<Self, BuildError> {
        if !attrs.classlabels_strings.is_empty() {
            return Err(BuildError::StringLabelsUnsupported);
        }
        let post_transform = PostTransform::parse(&attrs.post_transform)?;
        let n_classes = attrs.classlabels_int64s.len();
        let ensemble = EnsembleBuilder::new(
            NodeArrays {
                treeids: &attrs.nodes_treeids,
                nodeids: &attrs.nodes_nodeids,
                featureids: &attrs.nodes_featureids,
                values: &attrs.nodes_values,
                hitrates: &attrs.nodes_hitrates,
                modes: &attrs.nodes_modes,
                truenodeids: &attrs.nodes_truenodeids,
                falsenodeids: &attrs.nodes_falsenodeids,
                missing_value_tracks_true: &attrs.nodes_missing_value_tracks_true,
            },
            LeafArrays {
                treeids: &attrs.class_treeids,
                nodeids: &attrs.class_nodeids,
                ids: &attrs.class_ids,
                weights: &attrs.class_weights,
                names: CLASS_NAMES,
            },
            n_classes,
            &attrs.base_values,
            post_transform,
            AggregateFunction::Sum,
        )
        .build()?;

        let classes_seen: BTreeSet<i64> = attrs.class_ids.iter().copied().collect();
        let weights_are_all_positive =
            !attrs.class_weights.iter().any(|w| *w < F::zero());

        Ok(Self {
            ensemble,
            class_labels: attrs.classlabels_int64s.clone(),
            classes_seen,
            weights_are_all_positive,
        })
    }

    /// Number of classes.
    #[inline]
    pub fn n_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// Class labels, in attribute order.
    #[inline]
    pub fn class_labels(&self) -> &[i64] {
        &self.class_labels
    }

    /// Distinct class indices that appear in any leaf.
    #[inline]
    pub fn classes_seen(&self) -> &BTreeSet<i64> {
        &self.classes_seen
    }

    /// Whether every supplied class weight was non-negative.
    #[inline]
    pub fn weights_are_all_positive(&self) -> bool {
        self.weights_are_all_positive
    }

    /// The built ensemble.
    #[inline]
    pub fn ensemble(&self) -> &Ensemble<F> {
        &self.ensemble
    }

    fn context(&self) -> ClassifierContext<'_, F> {
        let n_classes = self.class_labels.len();
        ClassifierContext {
            class_labels: &self.class_labels,
            base_values: self.ensemble.base_values(),
            post_transform: self.ensemble.post_transform(),
            weights_are_all_positive: self.weights_are_all_positive,
            binary_case: n_classes == 2 && self.classes_seen.len() == 1,
            all_classes_seen: self.classes_seen.len() == n_classes,
        }
    }

    /// Predict a batch, one worker.
    ///
    /// Returns a label per row and a `(num_rows, n_classes)` score matrix.
    pub fn predict<M: DataMatrix<Element = F>>(&self, features: &M) -> ClassifierOutput<F> {
        let num_rows = features.num_rows();
        let n_classes = self.class_labels.len();
        let mut labels = vec![0i64; num_rows];
        let mut scores_out = PredictionOutput::zeros(num_rows, n_classes);
        if num_rows == 0 || n_classes == 0 {
            return ClassifierOutput {
                labels,
                scores: scores_out,
            };
        }

        // Two slots minimum so the binary shaping can always address the
        // positive class.
        let width = n_classes.max(2);
        let ctx = self.context();
        let num_features = features.num_features();
        let mut row_buf = vec![F::nan(); num_features];
        let mut scores = vec![F::zero(); width];
        let mut has = vec![false; width];
        let mut scratch = Vec::with_capacity(width);

        for i in 0..num_rows {
            features.copy_row(i, &mut row_buf);
            self.accumulate_row(&row_buf, &mut scores, &mut has);
            labels[i] = finalize_classifier_row(
                &ctx,
                &mut scores,
                &mut has,
                scores_out.row_mut(i),
                &mut scratch,
            );
        }
        ClassifierOutput {
            labels,
            scores: scores_out,
        }
    }

    /// Predict a batch in parallel across rows.
    ///
    /// Single-row batches parallelize across trees instead; their partial
    /// sums reduce in nondeterministic order, so results may differ from
    /// [`predict`](Self::predict) in the final ulp.
    pub fn par_predict<M: DataMatrix<Element = F> + Sync>(
        &self,
        features: &M,
    ) -> ClassifierOutput<F> {
        let num_rows = features.num_rows();
        let n_classes = self.class_labels.len();
        if num_rows == 0 || n_classes == 0 {
            return ClassifierOutput {
                labels: vec![0i64; num_rows],
                scores: PredictionOutput::zeros(num_rows, n_classes),
            };
        }
        if num_rows == 1 {
            return self.predict_row_tree_parallel(features);
        }

        let width = n_classes.max(2);
        let ctx = self.context();
        let num_features = features.num_features();
        let mut labels = vec![0i64; num_rows];
        let mut scores_out = PredictionOutput::zeros(num_rows, n_classes);
        labels
            .par_iter_mut()
            .zip(scores_out.as_mut_slice().par_chunks_mut(n_classes))
            .enumerate()
            .for_each_init(
                || {
                    (
                        vec![F::nan(); num_features],
                        vec![F::zero(); width],
                        vec![false; width],
                        Vec::with_capacity(width),
                    )
                },
                |(row_buf, scores, has, scratch), (i, (label, out_row))| {
                    features.copy_row(i, row_buf);
                    self.accumulate_row(row_buf, scores, has);
                    *label = finalize_classifier_row(&ctx, scores, has, out_row, scratch);
                },
            );
        ClassifierOutput {
            labels,
            scores: scores_out,
        }
    }

    /// Single-row dialect: walk trees in parallel and merge the partials.
    fn predict_row_tree_parallel<M: DataMatrix<Element = F>>(
        &self,
        features: &M,
    ) -> ClassifierOutput<F> {
        let n_classes = self.class_labels.len();
        let width = n_classes.max(2);
        let mut row_buf = vec![F::nan(); features.num_features()];
        features.copy_row(0, &mut row_buf);

        let (mut scores, mut has) = self
            .ensemble
            .roots()
            .par_iter()
            .fold(
                || (vec![F::zero(); width], vec![false; width]),
                |(mut scores, mut has), &root| {
                    let leaf = walk_to_leaf(&self.ensemble, root, &row_buf);
                    SumAccumulate::accumulate(&mut scores, &mut has, leaf.weights());
                    (scores, has)
                },
            )
            .reduce(
                || (vec![F::zero(); width], vec![false; width]),
                |(mut scores, mut has), (other_scores, other_has)| {
                    SumAccumulate::merge(&mut scores, &mut has, &other_scores, &other_has);
                    (scores, has)
                },
            );

        let ctx = self.context();
        let mut scores_out = PredictionOutput::zeros(1, n_classes);
        let mut scratch = Vec::with_capacity(width);
        let label = finalize_classifier_row(
            &ctx,
            &mut scores,
            &mut has,
            scores_out.row_mut(0),
            &mut scratch,
        );
        ClassifierOutput {
            labels: vec![label],
            scores: scores_out,
        }
    }

    #[inline]
    fn accumulate_row(&self, row: &[F], scores: &mut [F], has: &mut [bool]) {
        for s in scores.iter_mut() {
            *s = F::zero();
        }
        for h in has.iter_mut() {
            *h = false;
        }
        for &root in self.ensemble.roots() {
            let leaf = walk_to_leaf(&self.ensemble, root, row);
            SumAccumulate::accumulate(scores, has, leaf.weights());
        }
    }
}
