//! CART regression tree builder
//!
//! Exact-greedy split search over every feature, minimizing the summed
//! squared error of the two children. Thresholds sit at midpoints between
//! consecutive distinct values.

use crate::data::TrainingSet;
use crate::tree::{Node, RegressionTree};

/// Growth limits for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Split candidate. Ordering on (feature_idx, threshold) breaks gain ties.
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        if self.gain != other.gain {
            return self.gain > other.gain;
        }
        (self.feature_idx, self.threshold.to_bits()) < (other.feature_idx, other.threshold.to_bits())
    }
}

/// Build a regression tree from a set of row indices (duplicates allowed,
/// as produced by bootstrap sampling).
pub struct CartBuilder<'a> {
    config: TreeConfig,
    data: &'a TrainingSet,
}

impl<'a> CartBuilder<'a> {
    pub fn new(data: &'a TrainingSet, config: TreeConfig) -> Self {
        Self { config, data }
    }

    pub fn build(&self, rows: &[usize]) -> RegressionTree {
        let mut nodes = Vec::new();
        if rows.is_empty() {
            nodes.push(Node::leaf(0, 0.0));
        } else {
            let mut rows = rows.to_vec();
            self.build_node(&mut rows, 0, &mut nodes);
        }
        RegressionTree::new(nodes)
    }

    fn build_node(&self, rows: &mut [usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current_idx = nodes.len() as i32;
        let leaf_value = self.mean_target(rows);
        let samples = rows.len() as u32;

        let depth_exhausted = self.config.max_depth.map_or(false, |max| depth >= max);
        if depth_exhausted
            || rows.len() < self.config.min_samples_split
            || rows.len() < 2 * self.config.min_samples_leaf
            || self.is_pure(rows)
        {
            nodes.push(Node::leaf(current_idx, leaf_value).with_samples(samples));
            return current_idx;
        }

        let Some(split) = self.find_best_split(rows) else {
            nodes.push(Node::leaf(current_idx, leaf_value).with_samples(samples));
            return current_idx;
        };

        let boundary = partition(rows, |row| {
            self.data.features[row][split.feature_idx] <= split.threshold
        });

        // Reserve space for the current node, patch children afterwards
        nodes.push(
            Node::internal(current_idx, split.feature_idx as i32, split.threshold, 0, 0)
                .with_samples(samples),
        );

        let (left_rows, right_rows) = rows.split_at_mut(boundary);
        let left_idx = self.build_node(left_rows, depth + 1, nodes);
        let right_idx = self.build_node(right_rows, depth + 1, nodes);

        let node = &mut nodes[current_idx as usize];
        node.left = left_idx;
        node.right = right_idx;

        current_idx
    }

    /// Sweep each feature in sorted order and score every admissible cut.
    ///
    /// Minimizing child SSE is the same as maximizing
    /// `S_l²/n_l + S_r²/n_r`, which needs only running sums.
    fn find_best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let total: f64 = rows.iter().map(|&r| self.data.targets[r]).sum();
        let parent_score = total * total / n as f64;
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        for feature_idx in 0..self.data.feature_count {
            let value = |row: usize| self.data.features[row][feature_idx];
            sorted.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

            let mut left_sum = 0.0;
            for i in 0..n - 1 {
                left_sum += self.data.targets[sorted[i]];
                let left_n = i + 1;
                let right_n = n - left_n;

                let current = value(sorted[i]);
                let next = value(sorted[i + 1]);
                if current == next || left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64;
                let gain = score - parent_score;
                if gain <= 0.0 {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: midpoint(current, next),
                    gain,
                };
                if best.map_or(true, |current_best| candidate.beats(&current_best)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn mean_target(&self, rows: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        rows.iter().map(|&r| self.data.targets[r]).sum::<f64>() / rows.len() as f64
    }

    fn is_pure(&self, rows: &[usize]) -> bool {
        let first = self.data.targets[rows[0]];
        rows.iter().all(|&r| self.data.targets[r] == first)
    }
}

/// Midpoint that stays strictly below `high`, so `low` always goes left.
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high {
        low
    } else {
        mid
    }
}

/// Stable in-place partition; returns the number of rows satisfying `pred`.
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let (left, right): (Vec<usize>, Vec<usize>) = rows.iter().copied().partition(|&row| pred(row));
    let boundary = left.len();
    for (slot, row) in rows.iter_mut().zip(left.into_iter().chain(right)) {
        *slot = row;
    }
    boundary
}
