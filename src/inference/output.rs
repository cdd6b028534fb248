//! Prediction output types.

use approx::{AbsDiffEq, RelativeEq};

use crate::data::ElementType;

/// Prediction output: flat storage with shape metadata.
///
/// Stores predictions in row-major layout. Each row contains `num_targets`
/// values (`n_targets` for the regressor, `n_classes` for the classifier).
///
/// # Memory Layout
///
/// ```text
/// data[row * num_targets + target] = prediction for (row, target)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutput<F = f32> {
    data: Vec<F>,
    num_rows: usize,
    num_targets: usize,
}

impl<F: ElementType> PredictionOutput<F> {
    /// Create a new prediction output.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != num_rows * num_targets`.
    pub fn new(data: Vec<F>, num_rows: usize, num_targets: usize) -> Self {
        assert_eq!(
            data.len(),
            num_rows * num_targets,
            "Data length {} does not match shape {}x{}",
            data.len(),
            num_rows,
            num_targets
        );
        Self {
            data,
            num_rows,
            num_targets,
        }
    }

    /// Create an output initialized to zeros.
    pub fn zeros(num_rows: usize, num_targets: usize) -> Self {
        Self {
            data: vec![F::zero(); num_rows * num_targets],
            num_rows,
            num_targets,
        }
    }

    /// Number of rows (samples).
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of targets (output columns).
    #[inline]
    pub fn num_targets(&self) -> usize {
        self.num_targets
    }

    /// Shape as (rows, targets).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_targets)
    }

    /// Get prediction for a single row.
    ///
    /// # Panics
    ///
    /// Panics if `row_idx >= num_rows`.
    #[inline]
    pub fn row(&self, row_idx: usize) -> &[F] {
        let start = row_idx * self.num_targets;
        &self.data[start..start + self.num_targets]
    }

    /// Get mutable prediction for a single row.
    ///
    /// # Panics
    ///
    /// Panics if `row_idx >= num_rows`.
    #[inline]
    pub fn row_mut(&mut self, row_idx: usize) -> &mut [F] {
        let start = row_idx * self.num_targets;
        &mut self.data[start..start + self.num_targets]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[F]> {
        self.data.chunks_exact(self.num_targets)
    }

    /// Get raw flat data.
    #[inline]
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }

    /// Get mutable raw flat data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [F] {
        &mut self.data
    }

    /// Consume and return raw data.
    pub fn into_vec(self) -> Vec<F> {
        self.data
    }
}

impl<F: ElementType + AbsDiffEq<Epsilon = F>> AbsDiffEq for PredictionOutput<F> {
    type Epsilon = F;

    fn default_epsilon() -> Self::Epsilon {
        F::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.num_rows == other.num_rows
            && self.num_targets == other.num_targets
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

impl<F: ElementType + RelativeEq<Epsilon = F>> RelativeEq for PredictionOutput<F> {
    fn default_max_relative() -> Self::Epsilon {
        F::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool {
        self.num_rows == other.num_rows
            && self.num_targets == other.num_targets
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.relative_eq(b, epsilon, max_relative))
    }
}
