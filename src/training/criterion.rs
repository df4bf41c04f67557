//! Impurity accounting over weighted class histograms.
//!
//! A [`Criterion`] holds the histogram state for one node at a time: the
//! parent histogram (total, missing, and non-missing members), the left and
//! right child histograms for the current threshold position, and the
//! impurities derived from them. The splitter advances the threshold
//! position monotonically with [`Criterion::update_children_histogram`],
//! which moves weighted counts from the right child into the left child, so
//! `left + right` always equals the active parent histogram.
//!
//! All impurities are arithmetic means over outputs; multi-output targets
//! are accounted independently per output against a shared
//! `[num_outputs × max_num_classes]` class-weight table.

use std::str::FromStr;

use crate::error::TreeError;

// ============================================================================
// Impurity
// ============================================================================

/// Impurity function selector, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Impurity {
    /// Gini index: `1 - Σ (h_c / S)²`.
    #[default]
    Gini,
    /// Shannon entropy in bits: `-Σ (h_c / S) log₂(h_c / S)`.
    Entropy,
}

impl Impurity {
    /// Impurity of a single weighted class histogram. Returns 0 for an
    /// empty histogram.
    pub fn impurity(&self, histogram: &[f64]) -> f64 {
        match self {
            Impurity::Gini => gini(histogram),
            Impurity::Entropy => entropy(histogram),
        }
    }
}

impl FromStr for Impurity {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gini" => Ok(Impurity::Gini),
            "entropy" => Ok(Impurity::Entropy),
            other => Err(TreeError::InvalidHyperparameter(format!(
                "criterion must be 'gini' or 'entropy', got '{other}'"
            ))),
        }
    }
}

fn gini(histogram: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut sum_squared = 0.0;
    for &count in histogram {
        sum += count;
        sum_squared += count * count;
    }
    if sum > 0.0 {
        1.0 - sum_squared / (sum * sum)
    } else {
        0.0
    }
}

fn entropy(histogram: &[f64]) -> f64 {
    let sum: f64 = histogram.iter().sum();
    if sum <= 0.0 {
        return 0.0;
    }
    let mut value = 0.0;
    for &count in histogram {
        if count > 0.0 {
            let p = count / sum;
            value -= p * p.log2();
        }
    }
    value
}

// ============================================================================
// Criterion
// ============================================================================

/// Histogram and impurity state for the node currently being split.
#[derive(Debug, Clone)]
pub struct Criterion {
    impurity_fn: Impurity,
    num_outputs: usize,
    /// Total number of training samples, the `N` in the improvement formula.
    num_samples: usize,
    max_num_classes: usize,
    num_classes_list: Vec<usize>,
    /// Class weights, indexed `[o * max_num_classes + c]`.
    class_weight: Vec<f64>,

    // parent histograms: all samples, the missing-value prefix, and the rest
    node_histogram: Vec<Vec<f64>>,
    node_histogram_missing: Vec<Vec<f64>>,
    node_histogram_non_missing: Vec<Vec<f64>>,

    // child histograms for the current threshold position
    left_histogram: Vec<Vec<f64>>,
    right_histogram: Vec<Vec<f64>>,

    node_weighted_n: Vec<f64>,
    node_weighted_n_missing: Vec<f64>,
    node_weighted_n_non_missing: Vec<f64>,
    left_weighted_n: Vec<f64>,
    right_weighted_n: Vec<f64>,
    left_weighted_n_missing: Vec<f64>,
    right_weighted_n_missing: Vec<f64>,

    node_impurity: Vec<f64>,
    node_impurity_missing: Vec<f64>,
    node_impurity_non_missing: Vec<f64>,
    left_impurity: Vec<f64>,
    right_impurity: Vec<f64>,
    left_impurity_missing: Vec<f64>,
    right_impurity_missing: Vec<f64>,

    /// Sort position up to which `left`/`right` have been updated.
    threshold_index: usize,
    threshold_index_missing: usize,
}

impl Criterion {
    pub fn new(
        impurity_fn: Impurity,
        num_outputs: usize,
        num_samples: usize,
        max_num_classes: usize,
        num_classes_list: Vec<usize>,
        class_weight: Vec<f64>,
    ) -> Self {
        let histogram = vec![vec![0.0; max_num_classes]; num_outputs];
        let per_output = vec![0.0; num_outputs];
        Self {
            impurity_fn,
            num_outputs,
            num_samples,
            max_num_classes,
            num_classes_list,
            class_weight,
            node_histogram: histogram.clone(),
            node_histogram_missing: histogram.clone(),
            node_histogram_non_missing: histogram.clone(),
            left_histogram: histogram.clone(),
            right_histogram: histogram,
            node_weighted_n: per_output.clone(),
            node_weighted_n_missing: per_output.clone(),
            node_weighted_n_non_missing: per_output.clone(),
            left_weighted_n: per_output.clone(),
            right_weighted_n: per_output.clone(),
            left_weighted_n_missing: per_output.clone(),
            right_weighted_n_missing: per_output.clone(),
            node_impurity: per_output.clone(),
            node_impurity_missing: per_output.clone(),
            node_impurity_non_missing: per_output.clone(),
            left_impurity: per_output.clone(),
            right_impurity: per_output.clone(),
            left_impurity_missing: per_output.clone(),
            right_impurity_missing: per_output,
            threshold_index: 0,
            threshold_index_missing: 0,
        }
    }

    /// Build the parent histogram from `sample_indices[start..end]`.
    pub fn compute_node_histogram(
        &mut self,
        y: &[i64],
        sample_indices: &[usize],
        start: usize,
        end: usize,
    ) {
        for o in 0..self.num_outputs {
            let mut counts = vec![0usize; self.max_num_classes];
            for &sample in &sample_indices[start..end] {
                counts[y[sample * self.num_outputs + o] as usize] += 1;
            }

            self.node_weighted_n[o] = 0.0;
            for c in 0..self.num_classes_list[o] {
                let weighted = self.class_weight[o * self.max_num_classes + c] * counts[c] as f64;
                self.node_histogram[o][c] = weighted;
                self.node_weighted_n[o] += weighted;
            }
        }
    }

    /// Build the missing-value histogram from the node-local prefix
    /// `sample_indices[..missing_end]` and derive the non-missing remainder
    /// from the parent histogram.
    pub fn compute_node_histogram_missing(
        &mut self,
        y: &[i64],
        sample_indices: &[usize],
        missing_end: usize,
    ) {
        for o in 0..self.num_outputs {
            let mut counts = vec![0usize; self.max_num_classes];
            for &sample in &sample_indices[..missing_end] {
                counts[y[sample * self.num_outputs + o] as usize] += 1;
            }

            self.node_weighted_n_missing[o] = 0.0;
            for c in 0..self.num_classes_list[o] {
                let weighted = self.class_weight[o * self.max_num_classes + c] * counts[c] as f64;
                self.node_histogram_missing[o][c] = weighted;
                self.node_weighted_n_missing[o] += weighted;
            }

            for c in 0..self.num_classes_list[o] {
                self.node_histogram_non_missing[o][c] =
                    self.node_histogram[o][c] - self.node_histogram_missing[o][c];
            }
            self.node_weighted_n_non_missing[o] =
                self.node_weighted_n[o] - self.node_weighted_n_missing[o];
        }
        self.threshold_index_missing = missing_end;
    }

    pub fn compute_node_impurity(&mut self) {
        for o in 0..self.num_outputs {
            self.node_impurity[o] = self.impurity_fn.impurity(&self.node_histogram[o]);
        }
    }

    pub fn compute_node_impurity_missing(&mut self) {
        for o in 0..self.num_outputs {
            self.node_impurity_missing[o] =
                self.impurity_fn.impurity(&self.node_histogram_missing[o]);
            self.node_impurity_non_missing[o] =
                self.impurity_fn.impurity(&self.node_histogram_non_missing[o]);
        }
    }

    /// Reset the sweep: empty left child, full parent in the right child.
    pub fn init_children_histogram(&mut self) {
        for o in 0..self.num_outputs {
            for c in 0..self.num_classes_list[o] {
                self.left_histogram[o][c] = 0.0;
                self.right_histogram[o][c] = self.node_histogram[o][c];
            }
            self.left_weighted_n[o] = 0.0;
            self.right_weighted_n[o] = self.node_weighted_n[o];
        }
        self.threshold_index = 0;
    }

    /// Reset the sweep for a node with a missing-value prefix: the right
    /// child starts with only the observed samples, and the sweep starts
    /// just past the prefix.
    pub fn init_children_histogram_non_missing(&mut self) {
        for o in 0..self.num_outputs {
            for c in 0..self.num_classes_list[o] {
                self.left_histogram[o][c] = 0.0;
                self.right_histogram[o][c] = self.node_histogram_non_missing[o][c];
            }
            self.left_weighted_n[o] = 0.0;
            self.right_weighted_n[o] = self.node_weighted_n_non_missing[o];
        }
        self.threshold_index = self.threshold_index_missing;
    }

    /// Advance the sweep to `new_threshold_index`, moving the weighted
    /// counts of `sample_indices[threshold_index..new_threshold_index]`
    /// from the right child into the left child.
    pub fn update_children_histogram(
        &mut self,
        y: &[i64],
        sample_indices: &[usize],
        new_threshold_index: usize,
    ) {
        debug_assert!(new_threshold_index >= self.threshold_index);

        for o in 0..self.num_outputs {
            let mut counts = vec![0usize; self.max_num_classes];
            for &sample in &sample_indices[self.threshold_index..new_threshold_index] {
                counts[y[sample * self.num_outputs + o] as usize] += 1;
            }

            for c in 0..self.num_classes_list[o] {
                let weighted = self.class_weight[o * self.max_num_classes + c] * counts[c] as f64;
                self.left_histogram[o][c] += weighted;
                self.left_weighted_n[o] += weighted;
                self.right_histogram[o][c] -= weighted;
                self.right_weighted_n[o] -= weighted;
            }
        }
        self.threshold_index = new_threshold_index;
    }

    pub fn compute_children_impurity(&mut self) {
        for o in 0..self.num_outputs {
            self.left_impurity[o] = self.impurity_fn.impurity(&self.left_histogram[o]);
            self.right_impurity[o] = self.impurity_fn.impurity(&self.right_histogram[o]);
        }
    }

    /// Child impurities with the missing-value block folded into either
    /// side, for deciding where the block should be routed.
    pub fn compute_children_impurity_missing(&mut self) {
        let mut merged = vec![0.0; self.max_num_classes];
        for o in 0..self.num_outputs {
            for c in 0..self.num_classes_list[o] {
                merged[c] = self.node_histogram_missing[o][c] + self.left_histogram[o][c];
            }
            self.left_impurity_missing[o] = self.impurity_fn.impurity(&merged[..self.num_classes_list[o]]);
            self.left_weighted_n_missing[o] =
                self.node_weighted_n_missing[o] + self.left_weighted_n[o];

            for c in 0..self.num_classes_list[o] {
                merged[c] = self.node_histogram_missing[o][c] + self.right_histogram[o][c];
            }
            self.right_impurity_missing[o] = self.impurity_fn.impurity(&merged[..self.num_classes_list[o]]);
            self.right_weighted_n_missing[o] =
                self.node_weighted_n_missing[o] + self.right_weighted_n[o];
        }
    }

    /// Weighted impurity decrease of the current left/right partition:
    /// `(N_t / N) · (I_t − (N_L / N_t)·I_L − (N_R / N_t)·I_R)`, averaged
    /// over outputs.
    pub fn compute_impurity_improvement(&self) -> f64 {
        let mut total = 0.0;
        for o in 0..self.num_outputs {
            let n_node = self.node_weighted_n[o];
            total += (n_node / self.num_samples as f64)
                * (self.node_impurity[o]
                    - self.left_weighted_n[o] / n_node * self.left_impurity[o]
                    - self.right_weighted_n[o] / n_node * self.right_impurity[o]);
        }
        total / self.num_outputs as f64
    }

    /// Improvement of splitting purely on missingness: the missing prefix
    /// versus the observed remainder.
    pub fn compute_impurity_improvement_missing(&self) -> f64 {
        let mut total = 0.0;
        for o in 0..self.num_outputs {
            let n_node = self.node_weighted_n[o];
            total += (n_node / self.num_samples as f64)
                * (self.node_impurity[o]
                    - self.node_weighted_n_missing[o] / n_node * self.node_impurity_missing[o]
                    - self.node_weighted_n_non_missing[o] / n_node
                        * self.node_impurity_non_missing[o]);
        }
        total / self.num_outputs as f64
    }

    /// Improvement of the current partition measured over the observed
    /// samples only (the missing block is held out).
    pub fn compute_impurity_improvement_non_missing(&self) -> f64 {
        let mut total = 0.0;
        for o in 0..self.num_outputs {
            let n_non_missing = self.node_weighted_n_non_missing[o];
            total += (n_non_missing / self.num_samples as f64)
                * (self.node_impurity_non_missing[o]
                    - self.left_weighted_n[o] / n_non_missing * self.left_impurity[o]
                    - self.right_weighted_n[o] / n_non_missing * self.right_impurity[o]);
        }
        total / self.num_outputs as f64
    }

    /// Improvement of the current partition with the missing block routed
    /// into the left child.
    pub fn compute_left_impurity_improvement_missing(&self) -> f64 {
        let mut total = 0.0;
        for o in 0..self.num_outputs {
            let n_node = self.node_weighted_n[o];
            total += (n_node / self.num_samples as f64)
                * (self.node_impurity[o]
                    - self.left_weighted_n_missing[o] / n_node * self.left_impurity_missing[o]
                    - self.right_weighted_n[o] / n_node * self.right_impurity[o]);
        }
        total / self.num_outputs as f64
    }

    /// Improvement of the current partition with the missing block routed
    /// into the right child.
    pub fn compute_right_impurity_improvement_missing(&self) -> f64 {
        let mut total = 0.0;
        for o in 0..self.num_outputs {
            let n_node = self.node_weighted_n[o];
            total += (n_node / self.num_samples as f64)
                * (self.node_impurity[o]
                    - self.left_weighted_n[o] / n_node * self.left_impurity[o]
                    - self.right_weighted_n_missing[o] / n_node * self.right_impurity_missing[o]);
        }
        total / self.num_outputs as f64
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Parent weighted histogram `[num_outputs][max_num_classes]`.
    pub fn node_weighted_histogram(&self) -> &[Vec<f64>] {
        &self.node_histogram
    }

    /// Per-output weighted sample count of the node, averaged over outputs.
    pub fn node_weighted_n(&self) -> f64 {
        self.node_weighted_n.iter().sum::<f64>() / self.num_outputs as f64
    }

    pub fn node_impurity(&self) -> f64 {
        self.node_impurity.iter().sum::<f64>() / self.num_outputs as f64
    }

    pub fn node_impurity_non_missing(&self) -> f64 {
        self.node_impurity_non_missing.iter().sum::<f64>() / self.num_outputs as f64
    }

    pub fn right_impurity(&self) -> f64 {
        self.right_impurity.iter().sum::<f64>() / self.num_outputs as f64
    }

    #[cfg(test)]
    pub(crate) fn left_histogram(&self) -> &[Vec<f64>] {
        &self.left_histogram
    }

    #[cfg(test)]
    pub(crate) fn right_histogram(&self) -> &[Vec<f64>] {
        &self.right_histogram
    }
}

// ============================================================================
// Tests
// ============================================================================
