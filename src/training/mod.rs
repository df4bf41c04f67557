//! Training internals for tree construction.
//!
//! This module provides the three subsystems the classifier wires together:
//!
//! - [`Criterion`]: weighted class histograms and impurity accounting for
//!   one node, advanced incrementally along a threshold sweep
//! - [`Splitter`]: per-node split search over a random feature subsample,
//!   partitioning the shared sample-index permutation in place
//! - [`DepthFirstBuilder`]: the explicit-stack construction loop
//!
//! Shared infrastructure:
//!
//! - [`RandomState`]: seedable random source for feature sampling and the
//!   `random` split policy
//! - [`TrainingLogger`], [`Verbosity`]: structured logging

mod builder;
mod criterion;
mod logger;
mod rng;
mod splitter;

pub use builder::DepthFirstBuilder;
pub use criterion::{Criterion, Impurity};
pub use logger::{TrainingLogger, Verbosity};
pub use rng::RandomState;
pub use splitter::{SplitPolicy, SplitRecord, Splitter};
