//! Depth-first tree construction.
//!
//! The builder drives the [`Splitter`] and [`Criterion`] against the shared
//! sample-index permutation with an explicit work stack. The right child is
//! pushed before the left so the LIFO pop order yields pre-order,
//! left-before-right node emission; this ordering is observable through
//! node indices and must not change.

use crate::training::criterion::Criterion;
use crate::training::logger::TrainingLogger;
use crate::training::splitter::{SplitRecord, Splitter};
use crate::tree::Tree;
use crate::EPSILON;

/// One pending node range on the work stack.
#[derive(Debug, Clone, Copy)]
struct NodeInfo {
    start: usize,
    end: usize,
    depth: usize,
    parent_index: usize,
    is_left: bool,
}

/// Stack-driven depth-first builder emitting nodes into a [`Tree`].
#[derive(Debug)]
pub struct DepthFirstBuilder {
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    min_weight_leaf: f64,
    criterion: Criterion,
    splitter: Splitter,
    tree: Tree,
    logger: TrainingLogger,
}

impl DepthFirstBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
        min_weight_leaf: f64,
        criterion: Criterion,
        splitter: Splitter,
        tree: Tree,
        logger: TrainingLogger,
    ) -> Self {
        Self {
            max_depth,
            min_samples_split,
            min_samples_leaf,
            min_weight_leaf,
            criterion,
            splitter,
            tree,
            logger,
        }
    }

    /// Grow the tree over `sample_indices[0..num_samples]`.
    pub fn build(&mut self, x: &[f64], y: &[i64], num_samples: usize) {
        self.tree.reserve_for_depth(self.max_depth, num_samples);

        let mut stack = vec![NodeInfo {
            start: 0,
            end: num_samples,
            depth: 0,
            parent_index: 0,
            is_left: false,
        }];

        while let Some(frame) = stack.pop() {
            self.splitter
                .init_node(&mut self.criterion, y, frame.start, frame.end);
            let histogram = self.criterion.node_weighted_histogram().to_vec();
            let impurity = self.criterion.node_impurity();
            let weighted_n = self.criterion.node_weighted_n();
            let num_node_samples = frame.end - frame.start;

            let mut is_leaf = frame.depth >= self.max_depth
                || num_node_samples < self.min_samples_split
                || num_node_samples < 2 * self.min_samples_leaf
                || weighted_n < 2.0 * self.min_weight_leaf
                || impurity <= EPSILON;

            let mut split = SplitRecord::none();
            if !is_leaf {
                split = self.splitter.split_node(&mut self.criterion, x, y);
                // also catches NaN improvements: the node degrades to a leaf
                if !(split.improvement > EPSILON) {
                    is_leaf = true;
                    split = SplitRecord::none();
                }
            }

            let node_index = self.tree.add_node(
                frame.is_left,
                frame.depth,
                frame.parent_index,
                split.feature_index,
                split.missing,
                split.threshold,
                impurity,
                split.improvement,
                histogram,
            );

            self.logger.debug(&format!(
                "node {node_index}: depth={} samples={} impurity={impurity:.6} leaf={is_leaf}",
                frame.depth, num_node_samples
            ));

            if !is_leaf {
                // right first: the LIFO pop handles the left child next
                stack.push(NodeInfo {
                    start: split.partition_index,
                    end: frame.end,
                    depth: frame.depth + 1,
                    parent_index: node_index,
                    is_left: false,
                });
                stack.push(NodeInfo {
                    start: frame.start,
                    end: split.partition_index,
                    depth: frame.depth + 1,
                    parent_index: node_index,
                    is_left: true,
                });
            }
        }

        self.tree.shrink();
        self.logger.info(&format!(
            "built tree: {} nodes, depth {}",
            self.tree.node_count(),
            self.tree.max_depth()
        ));
    }

    /// Final permutation, for invariant checks.
    pub fn sample_indices(&self) -> &[usize] {
        self.splitter.sample_indices()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Hand the finished tree to the caller.
    pub fn into_tree(self) -> Tree {
        self.tree
    }
}

// ============================================================================
// Tests
// ============================================================================
