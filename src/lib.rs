//! tree-ensemble: CPU inference kernels for ONNX-ML tree ensembles.
//!
//! This crate implements the `TreeEnsembleClassifier` and `TreeEnsembleRegressor`
//! operators: it consumes the flat attribute arrays of a fitted gradient boosted
//! forest or random forest and evaluates it over batches of dense feature rows.

pub mod data;
pub mod ensemble;
pub mod error;
pub mod inference;
