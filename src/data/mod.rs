//! Data input abstractions for feature matrices.
//!
//! This module provides the [`DataMatrix`] trait and the row-major
//! [`DenseMatrix`] used to feed feature rows to the tree walkers.
//!
//! # Missing Values
//!
//! Missing feature values are represented as NaN. Branch nodes consult their
//! missing-value track to decide which side a NaN row descends to.

mod dense;
mod traits;

pub use dense::DenseMatrix;
pub use traits::{DataMatrix, ElementType};
