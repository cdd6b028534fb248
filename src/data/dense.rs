//! Dense row-major matrix implementation.

use super::traits::{DataMatrix, ElementType};
use crate::error::PredictError;

/// Row-major dense matrix for feature storage.
///
/// Stores all elements contiguously in row-major order, the layout the ONNX
/// tree ensemble operators consume. Missing values are NaN.
///
/// # Generic Parameters
///
/// - `F`: Element type (`f32` or `f64`)
/// - `S`: Storage type implementing `AsRef<[F]>` (default `Box<[F]>`)
///
/// The storage generic allows zero-copy views over borrowed slices as well as
/// owned allocations.
///
/// # Example
///
/// ```
/// use tree_ensemble::data::{DataMatrix, DenseMatrix};
///
/// // 2 rows, 3 features
/// let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let matrix = DenseMatrix::from_vec(data, 2, 3);
///
/// assert_eq!(matrix.num_rows(), 2);
/// assert_eq!(matrix.num_features(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct DenseMatrix<F = f32, S: AsRef<[F]> = Box<[F]>> {
    data: S,
    num_rows: usize,
    num_features: usize,
    _marker: std::marker::PhantomData<F>,
}

impl<F: ElementType> DenseMatrix<F, Box<[F]>> {
    /// Create a dense matrix from a Vec, taking ownership.
    ///
    /// Data must be in row-major order:
    /// `[row0_feat0, row0_feat1, ..., row1_feat0, ...]`
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != num_rows * num_features`.
    pub fn from_vec(data: Vec<F>, num_rows: usize, num_features: usize) -> Self {
        assert_eq!(
            data.len(),
            num_rows * num_features,
            "Data length {} does not match dimensions {}x{}",
            data.len(),
            num_rows,
            num_features
        );
        Self {
            data: data.into_boxed_slice(),
            num_rows,
            num_features,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, F: ElementType> DenseMatrix<F, &'a [F]> {
    /// Create a borrowed view of a dense matrix from a slice.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != num_rows * num_features`.
    pub fn from_slice(data: &'a [F], num_rows: usize, num_features: usize) -> Self {
        assert_eq!(
            data.len(),
            num_rows * num_features,
            "Data length {} does not match dimensions {}x{}",
            data.len(),
            num_rows,
            num_features
        );
        DenseMatrix {
            data,
            num_rows,
            num_features,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<F: ElementType, S: AsRef<[F]>> DenseMatrix<F, S> {
    /// Create a dense matrix from storage and a dynamically-ranked shape.
    ///
    /// This is the checked entry point for tensor-shaped inputs: any shape
    /// that is not two-dimensional is rejected with
    /// [`PredictError::BadShape`], and a storage length that disagrees with
    /// the shape is rejected with [`PredictError::SizeMismatch`].
    pub fn from_shape(storage: S, shape: &[usize]) -> Result<Self, PredictError> {
        if shape.len() != 2 {
            return Err(PredictError::BadShape { ndim: shape.len() });
        }
        let (num_rows, num_features) = (shape[0], shape[1]);
        let len = storage.as_ref().len();
        if len != num_rows * num_features {
            return Err(PredictError::SizeMismatch {
                len,
                num_rows,
                num_features,
            });
        }
        Ok(Self {
            data: storage,
            num_rows,
            num_features,
            _marker: std::marker::PhantomData,
        })
    }

    /// Get the underlying data as a flat slice.
    #[inline]
    pub fn as_slice(&self) -> &[F] {
        self.data.as_ref()
    }

    /// Get a row as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= num_rows`.
    #[inline]
    pub fn row_slice(&self, row: usize) -> &[F] {
        assert!(row < self.num_rows, "Row index {} out of bounds", row);
        let start = row * self.num_features;
        &self.data.as_ref()[start..start + self.num_features]
    }
}

impl<F: ElementType, S: AsRef<[F]>> DataMatrix for DenseMatrix<F, S> {
    type Element = F;

    #[inline]
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    fn num_features(&self) -> usize {
        self.num_features
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> Option<F> {
        if row >= self.num_rows || col >= self.num_features {
            return None;
        }
        Some(self.data.as_ref()[row * self.num_features + col])
    }

    fn copy_row(&self, i: usize, buf: &mut [F]) {
        assert!(
            buf.len() >= self.num_features,
            "Buffer too small: {} < {}",
            buf.len(),
            self.num_features
        );
        buf[..self.num_features].copy_from_slice(self.row_slice(i));
    }

    fn has_missing(&self) -> bool {
        self.data.as_ref().iter().any(|x| x.is_nan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_from_vec() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let matrix = DenseMatrix::from_vec(data, 2, 3);

        assert_eq!(matrix.num_rows(), 2);
        assert_eq!(matrix.num_features(), 3);
    }

    #[test]
    fn create_from_slice() {
        let data: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let matrix = DenseMatrix::from_slice(&data, 2, 3);

        assert_eq!(matrix.num_rows(), 2);
        assert_eq!(matrix.num_features(), 3);
    }

    #[test]
    #[should_panic(expected = "does not match dimensions")]
    fn create_wrong_size_panics() {
        let data = vec![1.0f32, 2.0, 3.0];
        DenseMatrix::from_vec(data, 2, 3); // 3 != 2*3
    }

    #[test]
    fn from_shape_accepts_2d() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        let matrix = DenseMatrix::from_shape(data, &[2, 2]).unwrap();
        assert_eq!(matrix.num_rows(), 2);
        assert_eq!(matrix.get(1, 1), Some(4.0));
    }

    #[test]
    fn from_shape_rejects_non_2d() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        let err = DenseMatrix::from_shape(data.clone(), &[4]).unwrap_err();
        assert!(matches!(err, PredictError::BadShape { ndim: 1 }));

        let err = DenseMatrix::from_shape(data, &[2, 2, 1]).unwrap_err();
        assert!(matches!(err, PredictError::BadShape { ndim: 3 }));
    }

    #[test]
    fn from_shape_rejects_size_mismatch() {
        let data = vec![1.0f32, 2.0, 3.0];
        let err = DenseMatrix::from_shape(data, &[2, 2]).unwrap_err();
        assert!(matches!(err, PredictError::SizeMismatch { len: 3, .. }));
    }

    #[test]
    fn get_element() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let matrix = DenseMatrix::from_vec(data, 2, 3);

        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.get(1, 2), Some(6.0));

        // Out of bounds
        assert_eq!(matrix.get(2, 0), None);
        assert_eq!(matrix.get(0, 3), None);
    }

    #[test]
    fn row_slice() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let matrix = DenseMatrix::from_vec(data, 2, 3);

        assert_eq!(matrix.row_slice(0), &[1.0, 2.0, 3.0]);
        assert_eq!(matrix.row_slice(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn copy_row() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let matrix = DenseMatrix::from_vec(data, 2, 3);

        let mut buf = [0.0f32; 5];
        matrix.copy_row(1, &mut buf);

        assert_eq!(&buf[..3], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn has_missing() {
        let matrix = DenseMatrix::from_vec(vec![1.0f32, 2.0, 3.0], 1, 3);
        assert!(!matrix.has_missing());

        let matrix = DenseMatrix::from_vec(vec![1.0f32, f32::NAN, 3.0], 1, 3);
        assert!(matrix.has_missing());
    }
}
