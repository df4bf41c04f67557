//! Decision tree classifier façade.
//!
//! [`DecisionTreeClassifier`] validates hyperparameters, derives class
//! weights, assembles the training subsystems, and exposes prediction over
//! the fitted tree. Feature matrices are dense row-major `[n × F]` slices;
//! labels are `[n × O]` with `y[i·O + o] ∈ [0, K_o)`.

use derive_builder::Builder;

use crate::error::TreeError;
use crate::training::{
    Criterion, DepthFirstBuilder, Impurity, RandomState, SplitPolicy, Splitter, TrainingLogger,
    Verbosity,
};
use crate::tree::Tree;
use crate::utils::argmax;

/// Multi-output decision tree classifier.
///
/// Configure through [`DecisionTreeClassifier::builder`], then call
/// [`fit`](Self::fit) and the prediction methods. All prediction methods
/// return [`TreeError::NotFitted`] before a successful fit.
///
/// # Example
///
/// ```ignore
/// let mut clf = DecisionTreeClassifier::builder()
///     .feature_names(feature_names)
///     .class_labels(class_labels)
///     .max_depth(4usize)
///     .random_seed(42i64)
///     .build()
///     .unwrap();
/// clf.fit(&x, &y)?;
/// let labels = clf.predict(&x_test)?;
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DecisionTreeClassifier {
    /// Feature names; their count defines `F`.
    pub feature_names: Vec<String>,

    /// Class labels per output; the outer length defines `O`, each inner
    /// length defines `K_o`.
    pub class_labels: Vec<Vec<String>>,

    /// Seed for the random source; `-1` for non-deterministic seeding.
    #[builder(default = "0")]
    pub random_seed: i64,

    /// Maximum tree depth (root = 0).
    #[builder(default = "4")]
    pub max_depth: usize,

    /// Features sampled per split; `-1` means all features.
    #[builder(default = "-1")]
    pub max_num_features: i64,

    /// Minimum samples a node needs to be considered for splitting.
    #[builder(default = "2")]
    pub min_samples_split: usize,

    /// Minimum samples required on each side of a split.
    #[builder(default = "1")]
    pub min_samples_leaf: usize,

    /// Fraction of the total sample weight a node must retain.
    #[builder(default = "0.0")]
    pub min_weight_fraction_leaf: f64,

    /// Derive class weights as `(N / count_o(c)) / K_o`; otherwise
    /// `class_weight` must be supplied.
    #[builder(default = "true")]
    pub class_balanced: bool,

    /// Impurity function.
    #[builder(default)]
    pub criterion: Impurity,

    /// Threshold selection policy.
    #[builder(default)]
    pub split_policy: SplitPolicy,

    /// Explicit class weights `[O · K_max]`, used when `class_balanced` is
    /// false.
    #[builder(default)]
    pub class_weight: Option<Vec<f64>>,

    /// Logging verbosity.
    #[builder(default)]
    pub verbosity: Verbosity,

    #[builder(setter(skip), default)]
    tree: Option<Tree>,
}

impl DecisionTreeClassifier {
    pub fn builder() -> DecisionTreeClassifierBuilder {
        DecisionTreeClassifierBuilder::default()
    }

    #[inline]
    fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    #[inline]
    fn num_outputs(&self) -> usize {
        self.class_labels.len()
    }

    fn num_classes_list(&self) -> Vec<usize> {
        self.class_labels.iter().map(|labels| labels.len()).collect()
    }

    /// The fitted tree, if any.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// Fit the tree to a row-major `[n × F]` feature matrix and `[n × O]`
    /// labels. Validation happens before any state is mutated.
    pub fn fit(&mut self, x: &[f64], y: &[i64]) -> Result<(), TreeError> {
        let num_features = self.num_features();
        let num_outputs = self.num_outputs();
        let num_classes_list = self.num_classes_list();
        let max_num_classes = num_classes_list.iter().copied().max().unwrap_or(0);

        if num_features == 0 {
            return Err(TreeError::InvalidHyperparameter(
                "feature_names must not be empty".into(),
            ));
        }
        if num_outputs == 0 || num_classes_list.iter().any(|&k| k == 0) {
            return Err(TreeError::InvalidHyperparameter(
                "class_labels must define at least one class per output".into(),
            ));
        }

        if x.len() % num_features != 0 {
            return Err(TreeError::ShapeMismatch(format!(
                "feature matrix length {} is not a multiple of {num_features}",
                x.len()
            )));
        }
        if y.len() % num_outputs != 0 {
            return Err(TreeError::ShapeMismatch(format!(
                "label matrix length {} is not a multiple of {num_outputs}",
                y.len()
            )));
        }
        let num_samples = y.len() / num_outputs;
        if x.len() / num_features != num_samples {
            return Err(TreeError::ShapeMismatch(format!(
                "feature matrix has {} rows but label matrix has {num_samples}",
                x.len() / num_features
            )));
        }
        if num_samples == 0 {
            return Err(TreeError::ShapeMismatch("no training samples".into()));
        }
        for i in 0..num_samples {
            for o in 0..num_outputs {
                let label = y[i * num_outputs + o];
                if label < 0 || label as usize >= num_classes_list[o] {
                    return Err(TreeError::ShapeMismatch(format!(
                        "label {label} out of range for output {o} with {} classes",
                        num_classes_list[o]
                    )));
                }
            }
        }

        let max_num_features = match self.max_num_features {
            -1 => num_features,
            m if m > 0 => (m as usize).min(num_features),
            other => {
                return Err(TreeError::InvalidHyperparameter(format!(
                    "max_num_features must be positive or -1, got {other}"
                )));
            }
        };

        if self.min_weight_fraction_leaf < 0.0 {
            return Err(TreeError::InvalidHyperparameter(
                "min_weight_fraction_leaf must be non-negative".into(),
            ));
        }

        // a split must leave min_samples_leaf on both sides
        let min_samples_split = self.min_samples_split.max(2 * self.min_samples_leaf);

        let class_weight = self.derive_class_weight(y, num_samples, &num_classes_list)?;

        let min_weight_leaf = if self.class_balanced {
            self.min_weight_fraction_leaf * num_samples as f64
        } else {
            self.min_weight_fraction_leaf * class_weight.iter().sum::<f64>()
        };

        let criterion = Criterion::new(
            self.criterion,
            num_outputs,
            num_samples,
            max_num_classes,
            num_classes_list.clone(),
            class_weight,
        );
        let splitter = Splitter::new(
            num_features,
            num_samples,
            max_num_features,
            self.min_samples_leaf,
            self.split_policy,
            RandomState::new(self.random_seed),
        );
        let tree = Tree::new(num_outputs, num_features, num_classes_list);
        let logger = TrainingLogger::new(self.verbosity);
        logger.info(&format!(
            "fitting: {num_samples} samples, {num_features} features, {num_outputs} outputs"
        ));

        let mut builder = DepthFirstBuilder::new(
            self.max_depth,
            min_samples_split,
            self.min_samples_leaf,
            min_weight_leaf,
            criterion,
            splitter,
            tree,
            logger,
        );
        builder.build(x, y, num_samples);

        self.tree = Some(builder.into_tree());
        Ok(())
    }

    fn derive_class_weight(
        &self,
        y: &[i64],
        num_samples: usize,
        num_classes_list: &[usize],
    ) -> Result<Vec<f64>, TreeError> {
        let num_outputs = num_classes_list.len();
        let max_num_classes = num_classes_list.iter().copied().max().unwrap_or(0);

        if !self.class_balanced {
            let weights = self.class_weight.as_ref().ok_or_else(|| {
                TreeError::InvalidHyperparameter(
                    "class_weight is required when class_balanced is false".into(),
                )
            })?;
            if weights.len() != num_outputs * max_num_classes {
                return Err(TreeError::InvalidHyperparameter(format!(
                    "class_weight must have {} entries, got {}",
                    num_outputs * max_num_classes,
                    weights.len()
                )));
            }
            return Ok(weights.clone());
        }

        let mut class_weight = vec![1.0; num_outputs * max_num_classes];
        for (o, &num_classes) in num_classes_list.iter().enumerate() {
            let mut bincount = vec![0usize; num_classes];
            for i in 0..num_samples {
                bincount[y[i * num_outputs + o] as usize] += 1;
            }
            for (c, &count) in bincount.iter().enumerate() {
                // a declared but unobserved class contributes no weight
                class_weight[o * max_num_classes + c] = if count > 0 {
                    (num_samples as f64 / count as f64) / num_classes as f64
                } else {
                    0.0
                };
            }
        }
        Ok(class_weight)
    }

    /// Class probabilities, shaped `[n × O × K_max]` flattened.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, TreeError> {
        let tree = self.tree.as_ref().ok_or(TreeError::NotFitted)?;
        let num_features = self.num_features();
        if x.len() % num_features != 0 {
            return Err(TreeError::ShapeMismatch(format!(
                "feature matrix length {} is not a multiple of {num_features}",
                x.len()
            )));
        }
        Ok(tree.predict_proba(x, x.len() / num_features))
    }

    /// Predicted class per row and output, shaped `[n × O]` flattened.
    pub fn predict(&self, x: &[f64]) -> Result<Vec<i64>, TreeError> {
        let proba = self.predict_proba(x)?;
        let num_outputs = self.num_outputs();
        let num_classes_list = self.num_classes_list();
        let max_num_classes = num_classes_list.iter().copied().max().unwrap_or(0);
        let width = num_outputs * max_num_classes;
        let num_samples = proba.len() / width;

        let mut labels = vec![0i64; num_samples * num_outputs];
        for i in 0..num_samples {
            for o in 0..num_outputs {
                let scores = &proba[i * width + o * max_num_classes..][..num_classes_list[o]];
                labels[i * num_outputs + o] = argmax(scores) as i64;
            }
        }
        Ok(labels)
    }

    /// L1-normalized per-feature importance.
    pub fn feature_importances(&self) -> Result<Vec<f64>, TreeError> {
        let tree = self.tree.as_ref().ok_or(TreeError::NotFitted)?;
        Ok(tree.compute_feature_importance())
    }

    /// Dump the fitted tree's nodes to stdout. Diagnostic only.
    pub fn print_nodes(&self) -> Result<(), TreeError> {
        let tree = self.tree.as_ref().ok_or(TreeError::NotFitted)?;
        tree.print_nodes();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
