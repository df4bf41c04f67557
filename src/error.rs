//! Shared error types for training and prediction.

/// Errors surfaced by the classifier entry points.
///
/// All construction-time errors are raised synchronously from `fit` before
/// any state is mutated; degenerate conditions discovered inside the split
/// search (constant features, all-missing columns, non-finite improvements)
/// are not errors and collapse the affected node to a leaf instead.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
	#[error("invalid hyperparameter: {0}")]
	InvalidHyperparameter(String),

	#[error("shape mismatch: {0}")]
	ShapeMismatch(String),

	#[error("model has not been fitted")]
	NotFitted,
}
