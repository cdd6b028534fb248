//! Core traits for data matrix access and element types.

use std::fmt::Debug;
use std::ops::AddAssign;

use num_traits::Float;

/// Numeric element type the kernels are monomorphized over.
///
/// Implemented for `f32` and `f64`, matching the two precisions the ONNX-ML
/// tree ensemble operators are defined for. The extra [`from_f64`]
/// constructor exists so transform constants can be spelled once in `f64`
/// and narrowed without a fallible cast.
///
/// [`from_f64`]: ElementType::from_f64
pub trait ElementType: Float + AddAssign + Debug + Send + Sync + 'static {
    /// Convert an `f64` constant into this element type.
    fn from_f64(value: f64) -> Self;

    /// Convert a count into this element type.
    fn from_usize(value: usize) -> Self;
}

impl ElementType for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn from_usize(value: usize) -> Self {
        value as f32
    }
}

impl ElementType for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn from_usize(value: usize) -> Self {
        value as f64
    }
}

/// Core trait for feature matrix access.
///
/// Provides a uniform interface for accessing feature values during tree
/// traversal, regardless of the underlying storage. The batch drivers only
/// need row counts and the ability to copy a row into a contiguous scratch
/// buffer.
pub trait DataMatrix {
    /// Element type stored in the matrix.
    type Element: ElementType;

    /// Number of rows (samples) in the matrix.
    fn num_rows(&self) -> usize;

    /// Number of features (columns) in the matrix.
    fn num_features(&self) -> usize;

    /// Get element at (row, col), or None if out of bounds.
    fn get(&self, row: usize, col: usize) -> Option<Self::Element>;

    /// Copy row `i` into a dense buffer.
    ///
    /// Sparse implementations fill unstored positions with NaN.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() < num_features()` or `i >= num_rows()`.
    fn copy_row(&self, i: usize, buf: &mut [Self::Element]);

    /// Whether the matrix contains any missing (NaN) values.
    fn has_missing(&self) -> bool;
}
