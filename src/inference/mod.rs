//! Inference over built tree ensembles.
//!
//! # Module Structure
//!
//! - `transform`: post-evaluation score transforms and binary shaping
//! - `aggregator`: accumulation strategies and row finalization
//! - Kernels: [`TreeEnsembleRegressor`] and [`TreeEnsembleClassifier`],
//!   thin batch drivers over the shared walker and aggregators
//!
//! # Quick Start
//!
//! ```
//! use tree_ensemble::data::DenseMatrix;
//! use tree_ensemble::ensemble::RegressorAttributes;
//! use tree_ensemble::inference::TreeEnsembleRegressor;
//!
//! let attrs = RegressorAttributes::<f32>::default(); // empty ensemble
//! let regressor = TreeEnsembleRegressor::new(&attrs).unwrap();
//! let output = regressor.predict(&DenseMatrix::from_vec(vec![0.0], 1, 1));
//! assert_eq!(output.shape(), (1, 1));
//! ```

pub(crate) mod aggregator;
mod classifier;
mod output;
mod regressor;
pub(crate) mod transform;
mod traversal;

pub use aggregator::AggregateFunction;
pub use classifier::{ClassifierOutput, TreeEnsembleClassifier};
pub use output::PredictionOutput;
pub use regressor::TreeEnsembleRegressor;
pub use transform::{logistic, probit, softmax_inplace, softmax_zero_inplace, PostTransform};
