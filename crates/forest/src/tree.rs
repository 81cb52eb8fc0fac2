//! Regression tree structures
//!
//! Trees are stored as a flat node vector with node 0 as the root. Traversal
//! goes left when `features[feature_idx] <= threshold`.

use serde::{Deserialize, Serialize};

/// A tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0`, `left`/`right` point at child
/// indices and `leaf` is `None`. Leaves carry `feature_idx == -1` and the
/// predicted value in `leaf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    pub feature_idx: i32,
    pub threshold: f64,
    pub leaf: Option<f64>,
    /// Number of (bootstrap) samples that reached this node during fitting
    pub samples: u32,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            samples: 0,
        }
    }

    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
            samples: 0,
        }
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate the tree on one feature vector.
    ///
    /// Structural problems (dangling child, out-of-range feature) yield 0.0;
    /// [`RegressionTree::validate`] rejects such trees before they are used.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }

            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0.0;
            };

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, depth: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    let left = walk(nodes, node.left as usize, depth + 1);
                    let right = walk(nodes, node.right as usize, depth + 1);
                    left.max(right)
                }
                _ => depth,
            }
        }
        walk(&self.nodes, 0, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Validate tree structure against the expected feature count.
    ///
    /// Children must point forward so traversal always terminates.
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(value) => return Err(format!("Leaf node {i} has non-finite value {value}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }

            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Internal node {} has invalid feature index: {}",
                    i, node.feature_idx
                ));
            }

            if !node.threshold.is_finite() {
                return Err(format!("Internal node {i} has non-finite threshold"));
            }
        }

        Ok(())
    }
}
