//! Random forest trainer
//!
//! Every tree draws its bootstrap sample from its own RNG, seeded from the
//! forest seed and the tree index. Trees are then independent and can be
//! grown on the rayon pool without affecting the result.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartBuilder, TreeConfig};
use crate::data::TrainingSet;
use crate::model::ForestModel;
use crate::tree::RegressionTree;
use crate::ForestError;

/// Forest training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ForestError::InvalidConfig(
                "max_depth must be at least 1 when set".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ForestError::InvalidConfig(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForestError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Random forest trainer
pub struct ForestTrainer {
    config: ForestConfig,
}

impl ForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Fit a forest on `data`.
    pub fn train(&self, data: &TrainingSet) -> Result<ForestModel, ForestError> {
        self.config.validate()?;
        if data.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }

        let tree_config = self.config.tree_config();
        let trees: Vec<RegressionTree> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let rows = self.sample_rows(data.len(), tree_idx);
                CartBuilder::new(data, tree_config.clone()).build(&rows)
            })
            .collect();

        debug!(
            "Fitted {} trees on {} rows (seed {})",
            trees.len(),
            data.len(),
            self.config.seed
        );

        ForestModel::new(trees, data.feature_count, data.len(), self.config.clone())
    }

    fn sample_rows(&self, n: usize, tree_idx: usize) -> Vec<usize> {
        if !self.config.bootstrap {
            return (0..n).collect();
        }
        let mut rng = StdRng::seed_from_u64(tree_seed(self.config.seed, tree_idx));
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    }
}

/// Derive a per-tree seed (splitmix64 finalizer over seed and index).
pub fn tree_seed(seed: u64, tree_idx: usize) -> u64 {
    let mut z = seed
        .wrapping_add((tree_idx as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_set(n: usize) -> TrainingSet {
        TrainingSet::new(
            (0..n).map(|i| vec![i as f64, (i % 7) as f64]).collect(),
            (0..n).map(|i| 100.0 + 2.0 * i as f64).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_train_simple_forest() {
        let config = ForestConfig {
            n_estimators: 8,
            ..ForestConfig::default()
        };
        let model = ForestTrainer::new(config).train(&linear_set(40)).unwrap();

        assert_eq!(model.trees.len(), 8);
        assert_eq!(model.metadata.feature_count, 2);
        assert_eq!(model.metadata.training_rows, 40);
        assert!(model.verify().is_ok());
    }

    #[test]
    fn test_determinism() {
        let data = linear_set(30);
        let config = ForestConfig {
            n_estimators: 12,
            ..ForestConfig::default()
        };

        let first = ForestTrainer::new(config.clone()).train(&data).unwrap();
        let second = ForestTrainer::new(config).train(&data).unwrap();

        assert_eq!(first.trees, second.trees);
        assert_eq!(first.metadata.model_hash, second.metadata.model_hash);
    }

    #[test]
    fn test_seed_changes_forest() {
        let data = linear_set(30);
        let a = ForestTrainer::new(ForestConfig {
            n_estimators: 4,
            seed: 1,
            ..ForestConfig::default()
        })
        .train(&data)
        .unwrap();
        let b = ForestTrainer::new(ForestConfig {
            n_estimators: 4,
            seed: 2,
            ..ForestConfig::default()
        })
        .train(&data)
        .unwrap();
        assert_ne!(a.metadata.model_hash, b.metadata.model_hash);
    }

    #[test]
    fn test_without_bootstrap_trees_match() {
        let config = ForestConfig {
            n_estimators: 3,
            bootstrap: false,
            ..ForestConfig::default()
        };
        let model = ForestTrainer::new(config).train(&linear_set(20)).unwrap();
        assert_eq!(model.trees[0], model.trees[1]);
        assert_eq!(model.predict(&[5.0, 5.0]).unwrap(), 110.0);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let data = linear_set(10);
        for config in [
            ForestConfig {
                n_estimators: 0,
                ..ForestConfig::default()
            },
            ForestConfig {
                max_depth: Some(0),
                ..ForestConfig::default()
            },
            ForestConfig {
                min_samples_split: 1,
                ..ForestConfig::default()
            },
            ForestConfig {
                min_samples_leaf: 0,
                ..ForestConfig::default()
            },
        ] {
            assert!(matches!(
                ForestTrainer::new(config).train(&data),
                Err(ForestError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_tree_seeds_differ_per_tree() {
        assert_ne!(tree_seed(42, 0), tree_seed(42, 1));
        assert_ne!(tree_seed(42, 0), tree_seed(43, 0));
        assert_eq!(tree_seed(42, 7), tree_seed(42, 7));
    }
}
