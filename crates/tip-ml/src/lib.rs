//! Feature transformers, regression estimators and evaluation metrics.
//!
//! The estimators work on local [`dataset::Dataset`] values. Converting
//! session tables to datasets is the job of the session layer.

pub mod dataset;
pub mod estimator;
pub mod evaluation;
pub mod feature;
pub mod model;
mod solver;
pub mod tree;
