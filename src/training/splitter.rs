//! Best/random split search over a node's sample slice.
//!
//! The splitter owns the sample-index permutation shared by every node:
//! each node corresponds to a contiguous slice `[start, end)` of it, and a
//! split reorders exactly that slice so the children occupy adjacent
//! sub-slices. Feature candidates are drawn by an iterative partial
//! Fisher-Yates shuffle; drawing continues past `max_num_features` until
//! some feature has produced an improvement, so nodes where every sampled
//! feature is constant still terminate.
//!
//! Missing feature values (NaN) are swapped to the front of the working
//! slice before the threshold sweep. A node can then split purely on
//! missingness (NaN threshold, missing block left), or on a threshold with
//! the missing block routed to whichever child improves impurity more; a
//! block routed right is rotated to the end of the slice so the partition
//! index still separates the children.

use std::str::FromStr;

use crate::error::TreeError;
use crate::training::criterion::Criterion;
use crate::training::rng::RandomState;
use crate::tree::MissingBranch;
use crate::utils::sort_paired;
use crate::EPSILON;

// ============================================================================
// SplitPolicy
// ============================================================================

/// Threshold selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitPolicy {
    /// Evaluate every admissible threshold of each sampled feature.
    #[default]
    Best,
    /// Draw one uniform threshold per sampled feature.
    Random,
}

impl FromStr for SplitPolicy {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(SplitPolicy::Best),
            "random" => Ok(SplitPolicy::Random),
            other => Err(TreeError::InvalidHyperparameter(format!(
                "split policy must be 'best' or 'random', got '{other}'"
            ))),
        }
    }
}

// ============================================================================
// SplitRecord
// ============================================================================

/// Winning split for one node.
#[derive(Debug, Clone)]
pub struct SplitRecord {
    pub feature_index: usize,
    /// Absolute index into the permutation where the left child ends.
    pub partition_index: usize,
    /// NaN iff this is a pure missing-value split.
    pub threshold: f64,
    pub improvement: f64,
    pub missing: MissingBranch,
}

impl SplitRecord {
    /// A null split; the builder emits a leaf when no candidate beats it.
    pub fn none() -> Self {
        Self {
            feature_index: 0,
            partition_index: 0,
            threshold: f64::NAN,
            improvement: 0.0,
            missing: MissingBranch::None,
        }
    }
}

// ============================================================================
// Splitter
// ============================================================================

/// Split search over one node at a time, against a shared [`Criterion`].
#[derive(Debug, Clone)]
pub struct Splitter {
    num_features: usize,
    max_num_features: usize,
    min_samples_leaf: usize,
    policy: SplitPolicy,
    random_state: RandomState,

    start: usize,
    end: usize,
    /// The shared sample-index permutation; `[start, end)` is the current
    /// node's slice.
    sample_indices: Vec<usize>,
}

impl Splitter {
    pub fn new(
        num_features: usize,
        num_samples: usize,
        max_num_features: usize,
        min_samples_leaf: usize,
        policy: SplitPolicy,
        random_state: RandomState,
    ) -> Self {
        Self {
            num_features,
            max_num_features,
            min_samples_leaf,
            policy,
            random_state,
            start: 0,
            end: num_samples,
            sample_indices: (0..num_samples).collect(),
        }
    }

    /// Current permutation, for invariant checks.
    pub fn sample_indices(&self) -> &[usize] {
        &self.sample_indices
    }

    /// Point the splitter at `[start, end)` and refresh the criterion's
    /// parent histogram and impurity for that slice.
    pub fn init_node(&mut self, criterion: &mut Criterion, y: &[i64], start: usize, end: usize) {
        self.start = start;
        self.end = end;
        criterion.compute_node_histogram(y, &self.sample_indices, start, end);
        criterion.compute_node_impurity();
    }

    /// Search the sampled features for the best split of the current node.
    ///
    /// On success the winning sub-permutation is written back into the
    /// shared permutation so `[start, partition_index)` and
    /// `[partition_index, end)` are the children's slices. Returns
    /// [`SplitRecord::none`] when no feature admits an improving split.
    pub fn split_node(&mut self, criterion: &mut Criterion, x: &[f64], y: &[i64]) -> SplitRecord {
        let mut local: Vec<usize> = self.sample_indices[self.start..self.end].to_vec();
        let mut best = SplitRecord::none();

        // Iterative partial Fisher-Yates over feature indices. Keep drawing
        // beyond max_num_features while nothing has improved.
        let mut f_indices: Vec<usize> = (0..self.num_features).collect();
        let mut i = self.num_features;
        while i > self.num_features - self.max_num_features
            || (best.improvement < EPSILON && i > 0)
        {
            let j = if i > 0 {
                self.random_state.uniform_int(0, i)
            } else {
                0
            };
            i -= 1;
            f_indices.swap(i, j);
            let feature = f_indices[i];

            let candidate = match self.policy {
                SplitPolicy::Best => self.best_split_feature(criterion, x, y, &mut local, feature),
                SplitPolicy::Random => {
                    self.random_split_feature(criterion, x, y, &mut local, feature)
                }
            };

            if let Some(candidate) = candidate {
                // A NaN improvement never wins; the node degrades to a leaf
                // if nothing else improves.
                if candidate.improvement.is_finite() && candidate.improvement > best.improvement {
                    best = candidate;
                    self.sample_indices[self.start..self.end].copy_from_slice(&local);
                }
            }
        }

        best
    }

    /// Gather the node's column for `feature` and swap NaN entries (and
    /// their sample indices) to the front. Returns the column and the
    /// missing-prefix length.
    fn gather_feature(
        &self,
        x: &[f64],
        local: &mut [usize],
        feature: usize,
    ) -> (Vec<f64>, usize) {
        let mut f_x: Vec<f64> = local
            .iter()
            .map(|&sample| x[sample * self.num_features + feature])
            .collect();

        let mut missing_end = 0;
        for i in 0..f_x.len() {
            if f_x[i].is_nan() {
                f_x.swap(i, missing_end);
                local.swap(i, missing_end);
                missing_end += 1;
            }
        }
        (f_x, missing_end)
    }

    /// Tentative pure-missingness split: the NaN prefix goes left, every
    /// observed sample goes right. `None` if a child would be undersized.
    fn missingness_split(
        &self,
        criterion: &Criterion,
        feature: usize,
        missing_end: usize,
        num_samples: usize,
    ) -> Option<SplitRecord> {
        if missing_end < self.min_samples_leaf || num_samples - missing_end < self.min_samples_leaf
        {
            return None;
        }
        Some(SplitRecord {
            feature_index: feature,
            partition_index: self.start + missing_end,
            threshold: f64::NAN,
            improvement: criterion.compute_impurity_improvement_missing(),
            missing: MissingBranch::Left,
        })
    }

    /// Decide whether a threshold split with the missing block routed left
    /// or right beats the tentative missingness split, rotating the block
    /// to the end of the slice when it is routed right.
    #[allow(clippy::too_many_arguments)]
    fn route_missing_block(
        &self,
        criterion: &mut Criterion,
        local: &mut [usize],
        feature: usize,
        missing_end: usize,
        partition: usize,
        threshold: f64,
        tentative: Option<SplitRecord>,
    ) -> Option<SplitRecord> {
        let num_samples = local.len();
        criterion.compute_children_impurity_missing();
        let left_improvement = criterion.compute_left_impurity_improvement_missing();
        let right_improvement = criterion.compute_right_impurity_improvement_missing();

        let current = tentative.as_ref().map_or(0.0, |r| r.improvement);
        if left_improvement > right_improvement {
            let left_count = partition;
            let right_count = num_samples - partition;
            if left_improvement > current
                && left_count >= self.min_samples_leaf
                && right_count >= self.min_samples_leaf
            {
                return Some(SplitRecord {
                    feature_index: feature,
                    partition_index: self.start + partition,
                    threshold,
                    improvement: left_improvement,
                    missing: MissingBranch::Left,
                });
            }
        } else {
            let left_count = partition - missing_end;
            let right_count = num_samples - partition + missing_end;
            if right_improvement > current
                && left_count >= self.min_samples_leaf
                && right_count >= self.min_samples_leaf
            {
                // move the missing block behind the observed samples so the
                // partition index still separates left from right
                local.rotate_left(missing_end);
                return Some(SplitRecord {
                    feature_index: feature,
                    partition_index: self.start + partition - missing_end,
                    threshold,
                    improvement: right_improvement,
                    missing: MissingBranch::Right,
                });
            }
        }
        tentative
    }

    /// Evaluate every admissible threshold of one feature.
    fn best_split_feature(
        &mut self,
        criterion: &mut Criterion,
        x: &[f64],
        y: &[i64],
        local: &mut [usize],
        feature: usize,
    ) -> Option<SplitRecord> {
        let num_samples = local.len();
        let (mut f_x, missing_end) = self.gather_feature(x, local, feature);

        if missing_end == num_samples {
            return None;
        }

        let mut tentative = None;
        if missing_end > 0 {
            criterion.compute_node_histogram_missing(y, local, missing_end);
            criterion.compute_node_impurity_missing();
            tentative = self.missingness_split(criterion, feature, missing_end, num_samples);

            // observed samples already pure: nothing a threshold could add
            if criterion.node_impurity_non_missing() < EPSILON {
                return tentative;
            }
        }

        let (fx_min, fx_max) = min_max(&f_x[missing_end..]);
        if fx_min + EPSILON >= fx_max {
            return tentative;
        }

        if missing_end == 0 {
            criterion.init_children_histogram();
        } else {
            criterion.init_children_histogram_non_missing();
        }

        // missing values keep their prefix; sort only the observed range
        sort_paired(&mut f_x, local, missing_end, num_samples);

        let mut index = missing_end;
        let mut next_index = missing_end;
        let mut max_improvement = 0.0;
        let mut max_threshold = 0.0;
        let mut max_partition = missing_end;

        while next_index < num_samples {
            // remaining values constant: no further boundary
            if f_x[next_index] + EPSILON >= f_x[num_samples - 1] {
                break;
            }
            // advance past a run of equal values
            while next_index + 1 < num_samples && f_x[next_index] + EPSILON >= f_x[next_index + 1]
            {
                next_index += 1;
            }
            next_index += 1;

            criterion.update_children_histogram(y, local, next_index);
            criterion.compute_children_impurity();

            let improvement = if missing_end == 0 {
                criterion.compute_impurity_improvement()
            } else {
                criterion.compute_impurity_improvement_non_missing()
            };

            if next_index >= self.min_samples_leaf
                && num_samples - next_index >= self.min_samples_leaf
                && improvement > max_improvement
            {
                max_improvement = improvement;
                max_threshold = (f_x[index] + f_x[next_index]) / 2.0;
                max_partition = next_index;
            }

            if criterion.right_impurity() < EPSILON {
                break;
            }
            index = next_index;
        }

        if missing_end == 0 {
            if max_improvement > 0.0 {
                return Some(SplitRecord {
                    feature_index: feature,
                    partition_index: self.start + max_partition,
                    threshold: max_threshold,
                    improvement: max_improvement,
                    missing: MissingBranch::None,
                });
            }
            return None;
        }

        if max_improvement > 0.0 {
            return self.route_missing_block(
                criterion,
                local,
                feature,
                missing_end,
                max_partition,
                max_threshold,
                tentative,
            );
        }
        tentative
    }

    /// Draw one uniform threshold for one feature and evaluate it.
    fn random_split_feature(
        &mut self,
        criterion: &mut Criterion,
        x: &[f64],
        y: &[i64],
        local: &mut [usize],
        feature: usize,
    ) -> Option<SplitRecord> {
        let num_samples = local.len();
        let (mut f_x, missing_end) = self.gather_feature(x, local, feature);

        if missing_end == num_samples {
            return None;
        }

        let mut tentative = None;
        if missing_end > 0 {
            criterion.compute_node_histogram_missing(y, local, missing_end);
            criterion.compute_node_impurity_missing();
            tentative = self.missingness_split(criterion, feature, missing_end, num_samples);

            if criterion.node_impurity_non_missing() < EPSILON {
                return tentative;
            }
        }

        let (fx_min, fx_max) = min_max(&f_x[missing_end..]);
        if fx_min + EPSILON >= fx_max {
            return tentative;
        }

        let threshold = self.random_state.uniform_real(fx_min + EPSILON, fx_max);

        // two-way partition of the observed range around the threshold
        let mut index = missing_end;
        let mut next_index = num_samples;
        while index < next_index {
            if f_x[index] <= threshold {
                index += 1;
            } else {
                next_index -= 1;
                f_x.swap(index, next_index);
                local.swap(index, next_index);
            }
        }

        if missing_end == 0 {
            criterion.init_children_histogram();
        } else {
            criterion.init_children_histogram_non_missing();
        }
        criterion.update_children_histogram(y, local, index);
        criterion.compute_children_impurity();

        if missing_end == 0 {
            let improvement = criterion.compute_impurity_improvement();
            if improvement > 0.0
                && index >= self.min_samples_leaf
                && num_samples - index >= self.min_samples_leaf
            {
                return Some(SplitRecord {
                    feature_index: feature,
                    partition_index: self.start + index,
                    threshold,
                    improvement,
                    missing: MissingBranch::None,
                });
            }
            return None;
        }

        self.route_missing_block(
            criterion,
            local,
            feature,
            missing_end,
            index,
            threshold,
            tentative,
        )
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = values[0];
    let mut max = values[0];
    for &v in &values[1..] {
        if v > max {
            max = v;
        } else if v < min {
            min = v;
        }
    }
    (min, max)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::criterion::Impurity;
    use approx::assert_abs_diff_eq;

    const IRIS_X: [f64; 36] = [
        5.2, 3.3, 1.2, 0.3, //
        4.8, 3.1, 1.6, 0.2, //
        4.75, 3.1, 1.32, 0.1, //
        5.9, 2.6, 4.1, 1.2, //
        5.1, 2.2, 3.3, 1.1, //
        5.2, 2.7, 4.1, 1.3, //
        6.6, 3.1, 5.25, 2.2, //
        6.3, 2.5, 5.1, 2.0, //
        6.5, 3.1, 5.2, 2.1,
    ];
    const IRIS_Y: [i64; 9] = [0, 0, 0, 1, 1, 1, 2, 2, 2];

    fn iris_setup(policy: SplitPolicy, seed: i64) -> (Splitter, Criterion) {
        let splitter = Splitter::new(4, 9, 4, 1, policy, RandomState::new(seed));
        let criterion = Criterion::new(
            Impurity::Gini,
            1,
            9,
            3,
            vec![3],
            vec![1.0, 1.0, 1.0],
        );
        (splitter, criterion)
    }

    #[test]
    fn test_from_str_policies() {
        assert_eq!("best".parse::<SplitPolicy>().unwrap(), SplitPolicy::Best);
        assert_eq!("random".parse::<SplitPolicy>().unwrap(), SplitPolicy::Random);
        assert!("exhaustive".parse::<SplitPolicy>().is_err());
    }

    #[test]
    fn test_init_node_computes_histogram() {
        let (mut splitter, mut criterion) = iris_setup(SplitPolicy::Best, 0);
        splitter.init_node(&mut criterion, &IRIS_Y, 0, 9);

        assert_eq!(criterion.node_weighted_histogram()[0], vec![3.0, 3.0, 3.0]);
        assert_abs_diff_eq!(criterion.node_impurity(), 2.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_root_best_split_isolates_one_class() {
        let (mut splitter, mut criterion) = iris_setup(SplitPolicy::Best, 42);
        splitter.init_node(&mut criterion, &IRIS_Y, 0, 9);
        let split = splitter.split_node(&mut criterion, &IRIS_X, &IRIS_Y);

        // The best root cut on this data peels one pure class of three
        // samples off (class 0 via the petal features, class 2 via sepal
        // length); all tie at the same improvement and sepal width never
        // wins.
        assert_ne!(split.feature_index, 1);
        assert_abs_diff_eq!(split.improvement, 1.0 / 3.0, epsilon = 1e-9);
        assert_eq!(split.missing, MissingBranch::None);
        assert!(split.threshold.is_finite());
        assert!(split.partition_index == 3 || split.partition_index == 6);

        // one side of the cut is a pure class
        let indices = splitter.sample_indices();
        let pure_side: Vec<i64> = if split.partition_index == 3 {
            indices[..3].iter().map(|&s| IRIS_Y[s]).collect()
        } else {
            indices[6..].iter().map(|&s| IRIS_Y[s]).collect()
        };
        assert!(pure_side.windows(2).all(|w| w[0] == w[1]));

        // partition correctness: left <= threshold < right
        let f = split.feature_index;
        for &s in &indices[..split.partition_index] {
            assert!(IRIS_X[s * 4 + f] <= split.threshold);
        }
        for &s in &indices[split.partition_index..9] {
            assert!(IRIS_X[s * 4 + f] > split.threshold);
        }
    }

    #[test]
    fn test_split_preserves_slice_multiset() {
        let (mut splitter, mut criterion) = iris_setup(SplitPolicy::Best, 7);
        splitter.init_node(&mut criterion, &IRIS_Y, 0, 9);
        splitter.split_node(&mut criterion, &IRIS_X, &IRIS_Y);

        let mut indices: Vec<usize> = splitter.sample_indices().to_vec();
        indices.sort_unstable();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_constant_feature_cannot_win() {
        // one informative feature, one constant
        let x = [
            1.0, 5.0, //
            2.0, 5.0, //
            3.0, 5.0, //
            4.0, 5.0,
        ];
        let y = [0i64, 0, 1, 1];
        let mut splitter = Splitter::new(2, 4, 2, 1, SplitPolicy::Best, RandomState::new(3));
        let mut criterion = Criterion::new(Impurity::Gini, 1, 4, 2, vec![2], vec![1.0, 1.0]);

        splitter.init_node(&mut criterion, &y, 0, 4);
        let split = splitter.split_node(&mut criterion, &x, &y);

        assert_eq!(split.feature_index, 0);
        assert!(split.improvement > 0.0);
        assert_abs_diff_eq!(split.threshold, 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_all_constant_features_yield_no_split() {
        let x = [2.0, 2.0, 2.0, 2.0];
        let y = [0i64, 1, 0, 1];
        let mut splitter = Splitter::new(1, 4, 1, 1, SplitPolicy::Best, RandomState::new(0));
        let mut criterion = Criterion::new(Impurity::Gini, 1, 4, 2, vec![2], vec![1.0, 1.0]);

        splitter.init_node(&mut criterion, &y, 0, 4);
        let split = splitter.split_node(&mut criterion, &x, &y);

        assert_eq!(split.improvement, 0.0);
        assert_eq!(split.missing, MissingBranch::None);
    }

    #[test]
    fn test_all_missing_feature_yields_no_split() {
        let x = [f64::NAN, f64::NAN, f64::NAN, f64::NAN];
        let y = [0i64, 1, 0, 1];
        let mut splitter = Splitter::new(1, 4, 1, 1, SplitPolicy::Best, RandomState::new(0));
        let mut criterion = Criterion::new(Impurity::Gini, 1, 4, 2, vec![2], vec![1.0, 1.0]);

        splitter.init_node(&mut criterion, &y, 0, 4);
        let split = splitter.split_node(&mut criterion, &x, &y);

        assert_eq!(split.improvement, 0.0);
    }

    #[test]
    fn test_missingness_alone_separates_classes() {
        // class 0 is exactly the missing block; observed samples are pure
        let x = [f64::NAN, f64::NAN, 1.0, 2.0];
        let y = [0i64, 0, 1, 1];
        let mut splitter = Splitter::new(1, 4, 1, 1, SplitPolicy::Best, RandomState::new(0));
        let mut criterion = Criterion::new(Impurity::Gini, 1, 4, 2, vec![2], vec![1.0, 1.0]);

        splitter.init_node(&mut criterion, &y, 0, 4);
        let split = splitter.split_node(&mut criterion, &x, &y);

        assert!(split.improvement > 0.0);
        assert_eq!(split.missing, MissingBranch::Left);
        assert!(split.threshold.is_nan());
        assert_eq!(split.partition_index, 2);

        // missing samples occupy the left slice
        let left = &splitter.sample_indices()[..2];
        assert!(left.contains(&0) && left.contains(&1));
    }

    #[test]
    fn test_missing_block_routed_with_threshold_split() {
        // observed values split classes imperfectly; the NaN sample's class
        // decides which side it joins
        let x = [f64::NAN, 1.0, 2.0, 8.0, 9.0, 3.0];
        let y = [1i64, 0, 0, 1, 1, 0];
        let mut splitter = Splitter::new(1, 6, 1, 1, SplitPolicy::Best, RandomState::new(0));
        let mut criterion = Criterion::new(Impurity::Gini, 1, 6, 2, vec![2], vec![1.0, 1.0]);

        splitter.init_node(&mut criterion, &y, 0, 6);
        let split = splitter.split_node(&mut criterion, &x, &y);

        assert!(split.improvement > 0.0);
        assert!(split.threshold.is_finite());
        assert_eq!(split.missing, MissingBranch::Right);

        // left slice: observed class-0 samples; right slice ends with the
        // rotated missing block
        let n_left = split.partition_index;
        let left = &splitter.sample_indices()[..n_left];
        assert!(left.iter().all(|&s| y[s] == 0));
        assert_eq!(*splitter.sample_indices().last().unwrap(), 0);
    }

    #[test]
    fn test_random_policy_produces_valid_partition() {
        let (mut splitter, mut criterion) = iris_setup(SplitPolicy::Random, 42);
        splitter.init_node(&mut criterion, &IRIS_Y, 0, 9);
        let split = splitter.split_node(&mut criterion, &IRIS_X, &IRIS_Y);

        assert!(split.improvement > 0.0);
        assert!(split.partition_index > 0 && split.partition_index < 9);

        // every left sample is <= threshold, every right sample greater
        let f = split.feature_index;
        for &s in &splitter.sample_indices()[..split.partition_index] {
            assert!(IRIS_X[s * 4 + f] <= split.threshold);
        }
        for &s in &splitter.sample_indices()[split.partition_index..] {
            assert!(IRIS_X[s * 4 + f] > split.threshold);
        }
    }

    #[test]
    fn test_min_samples_leaf_rejects_narrow_splits() {
        // the only impurity-reducing boundary would put one sample left
        let x = [1.0, 5.0, 5.1, 5.2];
        let y = [0i64, 1, 1, 1];
        let mut splitter = Splitter::new(1, 4, 1, 2, SplitPolicy::Best, RandomState::new(0));
        let mut criterion = Criterion::new(Impurity::Gini, 1, 4, 2, vec![2], vec![1.0, 1.0]);

        splitter.init_node(&mut criterion, &y, 0, 4);
        let split = splitter.split_node(&mut criterion, &x, &y);

        assert_eq!(split.improvement, 0.0);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let run = || {
            let (mut splitter, mut criterion) = iris_setup(SplitPolicy::Best, 42);
            splitter.init_node(&mut criterion, &IRIS_Y, 0, 9);
            let split = splitter.split_node(&mut criterion, &IRIS_X, &IRIS_Y);
            (
                split.feature_index,
                split.partition_index,
                split.threshold.to_bits(),
                split.improvement.to_bits(),
                splitter.sample_indices().to_vec(),
            )
        };
        assert_eq!(run(), run());
    }
}
