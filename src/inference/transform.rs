//! Post-evaluation score transforms.
//!
//! These are the final nonlinear mappings the ONNX-ML tree ensemble
//! operators apply to aggregated scores, plus [`write_scores`], the helper
//! that also handles the binary-classifier "add second class" output
//! shaping.

use crate::data::ElementType;
use crate::error::BuildError;

/// Final transform applied to a score vector.
///
/// The string forms are the `post_transform` attribute values and must match
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostTransform {
    None,
    Logistic,
    Softmax,
    SoftmaxZero,
    Probit,
}

impl PostTransform {
    /// Parse a `post_transform` attribute value.
    pub fn parse(value: &str) -> Result<Self, BuildError> {
        match value {
            "NONE" => Ok(PostTransform::None),
            "LOGISTIC" => Ok(PostTransform::Logistic),
            "SOFTMAX" => Ok(PostTransform::Softmax),
            "SOFTMAX_ZERO" => Ok(PostTransform::SoftmaxZero),
            "PROBIT" => Ok(PostTransform::Probit),
            _ => Err(BuildError::UnknownPostTransform(value.to_owned())),
        }
    }

    /// The operator-schema spelling of this transform.
    pub fn as_str(self) -> &'static str {
        match self {
            PostTransform::None => "NONE",
            PostTransform::Logistic => "LOGISTIC",
            PostTransform::Softmax => "SOFTMAX",
            PostTransform::SoftmaxZero => "SOFTMAX_ZERO",
            PostTransform::Probit => "PROBIT",
        }
    }
}

/// Numerically stable logistic function.
///
/// Computes `1 / (1 + exp(-|x|))` and mirrors the result for negative
/// inputs, so large magnitudes never feed `exp` a positive argument.
#[inline]
pub fn logistic<F: ElementType>(value: F) -> F {
    let v = F::one() / (F::one() + (-value.abs()).exp());
    if value < F::zero() {
        F::one() - v
    } else {
        v
    }
}

/// Inverse error function, rational approximation (Winitzki, `a = 0.147`).
#[inline]
fn erf_inv<F: ElementType>(x: F) -> F {
    let sgn = if x < F::zero() { -F::one() } else { F::one() };
    let x = (F::one() - x) * (F::one() + x);
    let log = x.ln();
    let v = F::from_f64(2.0 / (3.14159 * 0.147)) + F::from_f64(0.5) * log;
    let v2 = F::from_f64(1.0 / 0.147) * log;
    let v3 = -v + (v * v - v2).sqrt();
    sgn * v3.sqrt()
}

/// Probit transform: `sqrt(2) * erf_inv(2x - 1)`.
#[inline]
pub fn probit<F: ElementType>(value: F) -> F {
    F::from_f64(std::f64::consts::SQRT_2) * erf_inv(F::from_f64(2.0) * value - F::one())
}

/// Softmax in-place, subtracting the maximum before exponentiation.
pub fn softmax_inplace<F: ElementType>(values: &mut [F]) {
    if values.is_empty() {
        return;
    }
    let mut v_max = F::neg_infinity();
    for &value in values.iter() {
        if value > v_max {
            v_max = value;
        }
    }
    let mut sum = F::zero();
    for value in values.iter_mut() {
        *value = (*value - v_max).exp();
        sum += *value;
    }
    for value in values.iter_mut() {
        *value = *value / sum;
    }
}

/// Softmax that treats near-zero entries as absent classes.
///
/// Entries with magnitude below 1e-7 contribute `v * exp(-max)` to the
/// numerator and nothing to the denominator, so a class that received no
/// votes does not inflate the partition function.
pub fn softmax_zero_inplace<F: ElementType>(values: &mut [F]) {
    if values.is_empty() {
        return;
    }
    let threshold = F::from_f64(1e-7);
    let mut v_max = F::neg_infinity();
    for &value in values.iter() {
        if value > v_max {
            v_max = value;
        }
    }
    let exp_neg_v_max = (-v_max).exp();
    let mut sum = F::zero();
    for value in values.iter_mut() {
        if *value > threshold || *value < -threshold {
            *value = (*value - v_max).exp();
            sum += *value;
        } else {
            *value = *value * exp_neg_v_max;
        }
    }
    for value in values.iter_mut() {
        *value = *value / sum;
    }
}

/// Transform a score vector and copy it into the output row.
///
/// Vectors of two or more scores get the post-transform applied in place.
/// A single score is the binary-classifier case and is shaped according to
/// `add_second_class`:
///
/// - `-1`: emit the single score (PROBIT still applies).
/// - `0` / `1` (all-positive weights): emit `[1 - s, s]`.
/// - `2` (mixed weights, positive class won): `[logistic(-s), logistic(s)]`
///   under LOGISTIC, else `[-s, s]`.
/// - `3` (mixed weights, negative class won): as `2` under LOGISTIC, else
///   the single element `[-s]`, a historical quirk kept for parity.
///
/// Slots of `out` past the written scores are left untouched.
pub(crate) fn write_scores<F: ElementType>(
    scores: &mut Vec<F>,
    post_transform: PostTransform,
    out: &mut [F],
    add_second_class: i32,
) {
    if scores.len() >= 2 {
        match post_transform {
            PostTransform::None => {}
            PostTransform::Logistic => {
                for score in scores.iter_mut() {
                    *score = logistic(*score);
                }
            }
            PostTransform::Softmax => softmax_inplace(scores),
            PostTransform::SoftmaxZero => softmax_zero_inplace(scores),
            PostTransform::Probit => {
                for score in scores.iter_mut() {
                    *score = probit(*score);
                }
            }
        }
    } else if scores.len() == 1 {
        if post_transform == PostTransform::Probit {
            scores[0] = probit(scores[0]);
        } else {
            let s = scores[0];
            match add_second_class {
                0 | 1 => {
                    scores[0] = F::one() - s;
                    scores.push(s);
                }
                2 => {
                    if post_transform == PostTransform::Logistic {
                        scores[0] = logistic(-s);
                        scores.push(logistic(s));
                    } else {
                        scores[0] = -s;
                        scores.push(s);
                    }
                }
                3 => {
                    if post_transform == PostTransform::Logistic {
                        scores[0] = logistic(-s);
                        scores.push(logistic(s));
                    } else {
                        scores[0] = -s;
                    }
                }
                _ => {}
            }
        }
    }
    let n = scores.len().min(out.len());
    out[..n].copy_from_slice(&scores[..n]);
}
