//! The `TreeEnsembleRegressor` kernel.

use rayon::prelude::*;

use crate::data::{DataMatrix, ElementType};
use crate::ensemble::builder::{EnsembleBuilder, LeafArrays, NodeArrays, TARGET_NAMES};
use crate::ensemble::{Ensemble, RegressorAttributes};
use crate::error::BuildError;

use super::aggregator::{
    finalize_regressor_row, Accumulate, AggregateFunction, MaxAccumulate, MinAccumulate,
    SumAccumulate,
};
use super::output::PredictionOutput;
use super::transform::PostTransform;
use super::traversal::walk_to_leaf;

/// CPU kernel for the ONNX-ML `TreeEnsembleRegressor` operator.
///
/// Built once from the operator's attribute arrays, then shared read-only
/// across any number of prediction calls.
///
/// # Example
///
/// ```
/// use tree_ensemble::data::DenseMatrix;
/// use tree_ensemble::ensemble::RegressorAttributes;
/// use tree_ensemble::inference::TreeEnsembleRegressor;
///
/// // A single stump: x[0] <= 0.5 ? 1.0 : 2.0
/// let attrs = RegressorAttributes::<f32> {
///     nodes_treeids: vec![0, 0, 0],
///     nodes_nodeids: vec![0, 1, 2],
///     nodes_featureids: vec![0, 0, 0],
///     nodes_values: vec![0.5, 0.0, 0.0],
///     nodes_modes: vec!["BRANCH_LEQ".into(), "LEAF".into(), "LEAF".into()],
///     nodes_truenodeids: vec![1, 0, 0],
///     nodes_falsenodeids: vec![2, 0, 0],
///     target_treeids: vec![0, 0],
///     target_nodeids: vec![1, 2],
///     target_ids: vec![0, 0],
///     target_weights: vec![1.0, 2.0],
///     ..Default::default()
/// };
/// let regressor = TreeEnsembleRegressor::new(&attrs).unwrap();
///
/// let x = DenseMatrix::from_vec(vec![0.2, 0.8], 2, 1);
/// let output = regressor.predict(&x);
/// assert_eq!(output.row(0), &[1.0]);
/// assert_eq!(output.row(1), &[2.0]);
/// ```
#[derive(Debug, Clone)]
pub struct TreeEnsembleRegressor<F> {
    ensemble: Ensemble<F>,
}

impl<F: ElementType> TreeEnsembleRegressor<F> {
    /// Build the kernel from operator attributes.
    ///
    /// Fails on any malformed attribute; no partially-built kernel is ever
    /// observable.
    pub fn new(attrs: &RegressorAttributes<F>) -> Result<Self, BuildError> {
        let post_transform = PostTransform::parse(&attrs.post_transform)?;
        let aggregate = AggregateFunction::parse(&attrs.aggregate_function)?;
        let n_targets = attrs.n_targets.max(0) as usize;
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
                treeids: &attrs.target_treeids,
                nodeids: &attrs.target_nodeids,
                ids: &attrs.target_ids,
                weights: &attrs.target_weights,
                names: TARGET_NAMES,
            },
            n_targets,
            &attrs.base_values,
            post_transform,
            aggregate,
        )
        .build()?;
        Ok(Self { ensemble })
    }

    /// Number of regression targets per row.
    #[inline]
    pub fn n_targets(&self) -> usize {
        self.ensemble.n_targets_or_classes()
    }

    /// The built ensemble.
    #[inline]
    pub fn ensemble(&self) -> &Ensemble<F> {
        &self.ensemble
    }

    /// Predict a batch, one worker.
    ///
    /// Returns a `(num_rows, n_targets)` output.
    pub fn predict<M: DataMatrix<Element = F>>(&self, features: &M) -> PredictionOutput<F> {
        match self.ensemble.aggregate_function() {
            AggregateFunction::Sum | AggregateFunction::Average => {
                self.predict_with::<SumAccumulate, M>(features)
            }
            AggregateFunction::Min => self.predict_with::<MinAccumulate, M>(features),
            AggregateFunction::Max => self.predict_with::<MaxAccumulate, M>(features),
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
    ) -> PredictionOutput<F> {
        match self.ensemble.aggregate_function() {
            AggregateFunction::Sum | AggregateFunction::Average => {
                self.par_predict_with::<SumAccumulate, M>(features)
            }
            AggregateFunction::Min => self.par_predict_with::<MinAccumulate, M>(features),
            AggregateFunction::Max => self.par_predict_with::<MaxAccumulate, M>(features),
        }
    }

    /// Per-tree first-target contributions, shaped `(num_rows, n_trees)`.
    ///
    /// Entry `(i, j)` is what tree `j` alone contributes to target 0 for row
    /// `i`, before base values and the post-transform.
    pub fn tree_outputs<M: DataMatrix<Element = F>>(&self, features: &M) -> PredictionOutput<F> {
        match self.ensemble.aggregate_function() {
            AggregateFunction::Sum | AggregateFunction::Average => {
                self.tree_outputs_with::<SumAccumulate, M>(features)
            }
            AggregateFunction::Min => self.tree_outputs_with::<MinAccumulate, M>(features),
            AggregateFunction::Max => self.tree_outputs_with::<MaxAccumulate, M>(features),
        }
    }

    fn predict_with<A: Accumulate<F>, M: DataMatrix<Element = F>>(
        &self,
        features: &M,
    ) -> PredictionOutput<F> {
        let num_rows = features.num_rows();
        let n_targets = self.ensemble.n_targets_or_classes();
        let mut output = PredictionOutput::zeros(num_rows, n_targets);
        if num_rows == 0 || n_targets == 0 {
            return output;
        }

        let num_features = features.num_features();
        let mut row_buf = vec![F::nan(); num_features];
        let mut scores = vec![F::zero(); n_targets];
        let mut has = vec![false; n_targets];
        let mut scratch = Vec::with_capacity(n_targets);

        for i in 0..num_rows {
            features.copy_row(i, &mut row_buf);
            self.accumulate_row::<A>(&row_buf, &mut scores, &mut has);
            finalize_regressor_row(
                &scores,
                &has,
                self.ensemble.base_values(),
                self.ensemble.n_trees(),
                self.ensemble.aggregate_function(),
                self.ensemble.post_transform(),
                output.row_mut(i),
                &mut scratch,
            );
        }
        output
    }

    fn par_predict_with<A: Accumulate<F>, M: DataMatrix<Element = F> + Sync>(
        &self,
        features: &M,
    ) -> PredictionOutput<F> {
        let num_rows = features.num_rows();
        let n_targets = self.ensemble.n_targets_or_classes();
        if num_rows == 0 || n_targets == 0 {
            return PredictionOutput::zeros(num_rows, n_targets);
        }
        if num_rows == 1 {
            return self.predict_row_tree_parallel::<A, M>(features);
        }

        let num_features = features.num_features();
        let mut output = PredictionOutput::zeros(num_rows, n_targets);
        output
            .as_mut_slice()
            .par_chunks_mut(n_targets)
            .enumerate()
            .for_each_init(
                || {
                    (
                        vec![F::nan(); num_features],
                        vec![F::zero(); n_targets],
                        vec![false; n_targets],
                        Vec::with_capacity(n_targets),
                    )
                },
                |(row_buf, scores, has, scratch), (i, out_row)| {
                    features.copy_row(i, row_buf);
                    self.accumulate_row::<A>(row_buf, scores, has);
                    finalize_regressor_row(
                        scores,
                        has,
                        self.ensemble.base_values(),
                        self.ensemble.n_trees(),
                        self.ensemble.aggregate_function(),
                        self.ensemble.post_transform(),
                        out_row,
                        scratch,
                    );
                },
            );
        output
    }

    /// Single-row dialect: walk trees in parallel and merge the partials.
    fn predict_row_tree_parallel<A: Accumulate<F>, M: DataMatrix<Element = F>>(
        &self,
        features: &M,
    ) -> PredictionOutput<F> {
        let n_targets = self.ensemble.n_targets_or_classes();
        let mut row_buf = vec![F::nan(); features.num_features()];
        features.copy_row(0, &mut row_buf);

        let (scores, has) = self
            .ensemble
            .roots()
            .par_iter()
            .fold(
                || (vec![F::zero(); n_targets], vec![false; n_targets]),
                |(mut scores, mut has), &root| {
                    let leaf = walk_to_leaf(&self.ensemble, root, &row_buf);
                    A::accumulate(&mut scores, &mut has, leaf.weights());
                    (scores, has)
                },
            )
            .reduce(
                || (vec![F::zero(); n_targets], vec![false; n_targets]),
                |(mut scores, mut has), (other_scores, other_has)| {
                    A::merge(&mut scores, &mut has, &other_scores, &other_has);
                    (scores, has)
                },
            );

        let mut output = PredictionOutput::zeros(1, n_targets);
        let mut scratch = Vec::with_capacity(n_targets);
        finalize_regressor_row(
            &scores,
            &has,
            self.ensemble.base_values(),
            self.ensemble.n_trees(),
            self.ensemble.aggregate_function(),
            self.ensemble.post_transform(),
            output.row_mut(0),
            &mut scratch,
        );
        output
    }

    fn tree_outputs_with<A: Accumulate<F>, M: DataMatrix<Element = F>>(
        &self,
        features: &M,
    ) -> PredictionOutput<F> {
        let num_rows = features.num_rows();
        let n_trees = self.ensemble.n_trees();
        let n_targets = self.ensemble.n_targets_or_classes();
        let mut output = PredictionOutput::zeros(num_rows, n_trees);
        if num_rows == 0 || n_trees == 0 || n_targets == 0 {
            return output;
        }

        let mut row_buf = vec![F::nan(); features.num_features()];
        let mut scores = vec![F::zero(); n_targets];
        let mut has = vec![false; n_targets];
        for i in 0..num_rows {
            features.copy_row(i, &mut row_buf);
            for (j, &root) in self.ensemble.roots().iter().enumerate() {
                scores.fill(F::zero());
                has.fill(false);
                let leaf = walk_to_leaf(&self.ensemble, root, &row_buf);
                A::accumulate(&mut scores, &mut has, leaf.weights());
                output.row_mut(i)[j] = scores[0];
            }
        }
        output
    }

    #[inline]
    fn accumulate_row<A: Accumulate<F>>(&self, row: &[F], scores: &mut [F], has: &mut [bool]) {
        for s in scores.iter_mut() {
            *s = F::zero();
        }
        for h in has.iter_mut() {
            *h = false;
        }
        for &root in self.ensemble.roots() {
            let leaf = walk_to_leaf(&self.ensemble, root, row);
            A::accumulate(scores, has, leaf.weights());
        }
    }
}
