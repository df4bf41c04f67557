//! cartree: decision tree classification for tabular data.
//!
//! This crate provides a CART-style decision tree classifier built around
//! three cooperating subsystems:
//!
//! - [`training::Criterion`]: incremental impurity accounting over weighted
//!   class histograms, with missing-value support
//! - [`training::Splitter`]: per-node threshold search over a random feature
//!   subsample, with `best` and `random` policies
//! - [`training::DepthFirstBuilder`]: stack-driven depth-first construction
//!   emitting nodes into an append-only [`tree::Tree`]
//!
//! The public entry point is [`DecisionTreeClassifier`], which validates
//! hyperparameters, derives class weights, and wires the subsystems together
//! for `fit` / `predict` / `predict_proba`.
//!
//! # Example
//!
//! ```ignore
//! use cartree::DecisionTreeClassifier;
//!
//! let mut clf = DecisionTreeClassifier::builder()
//!     .feature_names(vec!["sepal length".into(), "sepal width".into()])
//!     .class_labels(vec![vec!["setosa".into(), "versicolor".into()]])
//!     .max_depth(4usize)
//!     .build()
//!     .unwrap();
//!
//! clf.fit(&x, &y)?;
//! let proba = clf.predict_proba(&x_test)?;
//! ```

pub mod classifier;
pub mod error;
pub mod training;
pub mod tree;
pub mod utils;

pub use classifier::{DecisionTreeClassifier, DecisionTreeClassifierBuilder};
pub use error::TreeError;
pub use training::{Impurity, SplitPolicy, Verbosity};
pub use tree::{MissingBranch, Tree, TreeNode};

/// Comparison tolerance for feature values, impurities, and improvements.
///
/// Two feature values closer than this are treated as equal by the threshold
/// sweep, and a node whose impurity or best improvement falls below it is
/// emitted as a leaf.
pub const EPSILON: f64 = 1e-7;
