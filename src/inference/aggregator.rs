//! Aggregation of per-tree leaf contributions.
//!
//! Accumulation strategies are zero-sized types selected once per batch, so
//! the row loop monomorphizes without per-leaf dispatch. Finalization turns
//! the accumulated `(scores, has_scores)` pair into the output row: the
//! regressor applies base values and the post-transform, the classifier
//! additionally picks a label and shapes binary outputs.

use crate::data::ElementType;
use crate::ensemble::SparseWeight;
use crate::error::BuildError;

use super::transform::{write_scores, PostTransform};

/// How per-tree leaf contributions combine into one score vector.
///
/// The string forms are the `aggregate_function` attribute values and must
/// match exactly. The classifier always sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Average,
    Min,
    Max,
}

impl AggregateFunction {
    /// Parse an `aggregate_function` attribute value.
    pub fn parse(value: &str) -> Result<Self, BuildError> {
        match value {
            "SUM" => Ok(AggregateFunction::Sum),
            "AVERAGE" => Ok(AggregateFunction::Average),
            "MIN" => Ok(AggregateFunction::Min),
            "MAX" => Ok(AggregateFunction::Max),
            _ => Err(BuildError::UnknownAggregate(value.to_owned())),
        }
    }

    /// The operator-schema spelling of this aggregate.
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Average => "AVERAGE",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// Accumulation strategy applied at each visited leaf.
///
/// `merge` folds one partial accumulation into another and is what makes
/// tree-parallel execution possible: workers accumulate privately, then
/// their partials are merged in reduction order.
pub(crate) trait Accumulate<F: ElementType>: Send + Sync {
    fn accumulate(pred: &mut [F], has: &mut [bool], weights: &[SparseWeight<F>]);
    fn merge(pred: &mut [F], has: &mut [bool], other_pred: &[F], other_has: &[bool]);
}

/// SUM / AVERAGE accumulation (AVERAGE divides at finalization).
pub(crate) struct SumAccumulate;

impl<F: ElementType> Accumulate<F> for SumAccumulate {
    #[inline]
    fn accumulate(pred: &mut [F], has: &mut [bool], weights: &[SparseWeight<F>]) {
        for w in weights {
            let i = w.target_id as usize;
            pred[i] += w.value;
            has[i] = true;
        }
    }

    fn merge(pred: &mut [F], has: &mut [bool], other_pred: &[F], other_has: &[bool]) {
        for i in 0..pred.len() {
            if other_has[i] {
                pred[i] += other_pred[i];
                has[i] = true;
            }
        }
    }
}

/// MIN accumulation.
pub(crate) struct MinAccumulate;

impl<F: ElementType> Accumulate<F> for MinAccumulate {
    #[inline]
    fn accumulate(pred: &mut [F], has: &mut [bool], weights: &[SparseWeight<F>]) {
        for w in weights {
            let i = w.target_id as usize;
            pred[i] = if !has[i] || w.value < pred[i] {
                w.value
            } else {
                pred[i]
            };
            has[i] = true;
        }
    }

    fn merge(pred: &mut [F], has: &mut [bool], other_pred: &[F], other_has: &[bool]) {
        for i in 0..pred.len() {
            if other_has[i] {
                pred[i] = if has[i] && pred[i] < other_pred[i] {
                    pred[i]
                } else {
                    other_pred[i]
                };
                has[i] = true;
            }
        }
    }
}

/// MAX accumulation.
pub(crate) struct MaxAccumulate;

impl<F: ElementType> Accumulate<F> for MaxAccumulate {
    #[inline]
    fn accumulate(pred: &mut [F], has: &mut [bool], weights: &[SparseWeight<F>]) {
        for w in weights {
            let i = w.target_id as usize;
            pred[i] = if !has[i] || w.value > pred[i] {
                w.value
            } else {
                pred[i]
            };
            has[i] = true;
        }
    }

    fn merge(pred: &mut [F], has: &mut [bool], other_pred: &[F], other_has: &[bool]) {
        for i in 0..pred.len() {
            if other_has[i] {
                pred[i] = if has[i] && pred[i] > other_pred[i] {
                    pred[i]
                } else {
                    other_pred[i]
                };
                has[i] = true;
            }
        }
    }
}

/// Finalize one regressor row: fold in base values, divide for AVERAGE and
/// run the score vector through the post-transform into `out`.
pub(crate) fn finalize_regressor_row<F: ElementType>(
    scores: &[F],
    has: &[bool],
    base_values: &[F],
    n_trees: usize,
    aggregate: AggregateFunction,
    post_transform: PostTransform,
    out: &mut [F],
    scratch: &mut Vec<F>,
) {
    let n_targets = out.len();
    let use_base_values = base_values.len() == n_targets;
    scratch.clear();
    for j in 0..n_targets {
        let mut val = if use_base_values {
            base_values[j]
        } else {
            F::zero()
        };
        if has[j] {
            let mut s = scores[j];
            if aggregate == AggregateFunction::Average {
                s = s / F::from_usize(n_trees);
            }
            val += s;
        }
        scratch.push(val);
    }
    write_scores(scratch, post_transform, out, -1);
}

/// Classifier state shared by every row's finalization.
pub(crate) struct ClassifierContext<'a, F> {
    pub class_labels: &'a [i64],
    pub base_values: &'a [F],
    pub post_transform: PostTransform,
    /// Every supplied class weight was non-negative.
    pub weights_are_all_positive: bool,
    /// Two labels but only one class ever appears in the leaves.
    pub binary_case: bool,
    /// Every class appears in some leaf, so score rows densify fully.
    pub all_classes_seen: bool,
}

impl<F: ElementType> ClassifierContext<'_, F> {
    fn label_at(&self, index: usize) -> i64 {
        self.class_labels.get(index).copied().unwrap_or_default()
    }
}

/// Finalize one classifier row: apply base values, pick the label and shape
/// the score vector into `out`. Returns the label.
///
/// `scores` and `has` must hold at least two entries even for single-class
/// ensembles; only the first `n_classes` carry votes.
pub(crate) fn finalize_classifier_row<F: ElementType>(
    ctx: &ClassifierContext<'_, F>,
    scores: &mut [F],
    has: &mut [bool],
    out: &mut [F],
    scratch: &mut Vec<F>,
) -> i64 {
    let n_classes = ctx.class_labels.len();
    scratch.clear();

    if n_classes > 2 {
        for k in 0..ctx.base_values.len() {
            if has[k] {
                scores[k] += ctx.base_values[k];
            } else {
                scores[k] = ctx.base_values[k];
                has[k] = true;
            }
        }

        // First maximum wins: strict comparison against the running best.
        let mut max_class = -1i64;
        let mut max_weight = F::zero();
        for k in 0..n_classes {
            if has[k] && (max_class == -1 || scores[k] > max_weight) {
                max_class = k as i64;
                max_weight = scores[k];
            }
        }
        let label = ctx.label_at(max_class.max(0) as usize);

        if ctx.all_classes_seen {
            for k in 0..n_classes {
                scratch.push(if has[k] { scores[k] } else { F::zero() });
            }
        } else {
            for k in 0..n_classes {
                if has[k] {
                    scratch.push(scores[k]);
                }
            }
        }
        write_scores(scratch, ctx.post_transform, out, -1);
        return label;
    }

    // Binary case.
    match ctx.base_values.len() {
        2 => {
            if has[1] {
                let s1 = ctx.base_values[1] + scores[1];
                scores[0] = -s1;
                scores[1] = s1;
            } else {
                scores[0] += ctx.base_values[0];
                scores[1] += ctx.base_values[1];
            }
        }
        // A single base value is silently dropped in the binary case; the
        // reference runtime overwrites it and downstream models rely on
        // that output.
        _ => {}
    }

    let pos_weight = if has[1] {
        scores[1]
    } else if has[0] {
        scores[0]
    } else {
        F::zero()
    };

    let (label, add_second_class) = if ctx.binary_case {
        if ctx.weights_are_all_positive {
            if pos_weight > F::from_f64(0.5) {
                (ctx.label_at(1), 0)
            } else {
                (ctx.label_at(0), 1)
            }
        } else if pos_weight > F::zero() {
            (ctx.label_at(1), 2)
        } else {
            (ctx.label_at(0), 3)
        }
    } else {
        let winner = usize::from(pos_weight > F::zero());
        (ctx.label_at(winner), -1)
    };

    scratch.push(scores[0]);
    if has[1] || ctx.base_values.len() == 2 {
        scratch.push(scores[1]);
    }
    write_scores(scratch, ctx.post_transform, out, add_second_class);
    label
}
