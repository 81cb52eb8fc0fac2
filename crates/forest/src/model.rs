//! Random forest model
//!
//! - bincode serialization for on-disk artifacts
//! - Blake3 model hash over the fitted trees, re-checked on decode
//! - prediction is the mean of the tree outputs

use agrocast_types::SegmentKey;
use serde::{Deserialize, Serialize};

use crate::tree::RegressionTree;
use crate::trainer::ForestConfig;
use crate::ForestError;

/// Artifact format version
pub const MODEL_VERSION: u32 = 1;

/// Descriptive data stored alongside the trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestMetadata {
    pub version: u32,
    /// Segment the forest was fitted for, if any
    pub segment: Option<SegmentKey>,
    pub tree_count: usize,
    pub feature_count: usize,
    pub training_rows: usize,
    pub config: ForestConfig,
    /// Unix seconds
    pub created_at: i64,
    /// Hex blake3 over feature count and trees
    pub model_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<RegressionTree>,
    pub metadata: ForestMetadata,
}

impl ForestModel {
    pub fn new(
        trees: Vec<RegressionTree>,
        feature_count: usize,
        training_rows: usize,
        config: ForestConfig,
    ) -> Result<Self, ForestError> {
        let model_hash = Self::calculate_model_hash(&trees, feature_count)?;
        let model = Self {
            metadata: ForestMetadata {
                version: MODEL_VERSION,
                segment: None,
                tree_count: trees.len(),
                feature_count,
                training_rows,
                config,
                created_at: chrono::Utc::now().timestamp(),
                model_hash,
            },
            trees,
        };
        model.validate()?;
        Ok(model)
    }

    /// Tag the model with the segment it belongs to. Not part of the hash.
    pub fn with_segment(mut self, key: SegmentKey) -> Self {
        self.metadata.segment = Some(key);
        self
    }

    pub fn segment(&self) -> Option<&SegmentKey> {
        self.metadata.segment.as_ref()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of every tree's output on one feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ForestError> {
        if features.len() != self.metadata.feature_count {
            return Err(ForestError::DimensionMismatch {
                row: 0,
                expected: self.metadata.feature_count,
                found: features.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(ForestError::ValidationFailed("model has no trees".to_string()));
        }

        let sum: f64 = self.trees.iter().map(|tree| tree.evaluate(features)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ForestError> {
        rows.iter()
            .enumerate()
            .map(|(row, features)| {
                self.predict(features).map_err(|err| match err {
                    ForestError::DimensionMismatch { expected, found, .. } => {
                        ForestError::DimensionMismatch { row, expected, found }
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.metadata.version != MODEL_VERSION {
            return Err(ForestError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.metadata.version
            )));
        }
        if self.trees.is_empty() {
            return Err(ForestError::ValidationFailed("model has no trees".to_string()));
        }
        if self.trees.len() != self.metadata.tree_count {
            return Err(ForestError::ValidationFailed(format!(
                "metadata lists {} trees, found {}",
                self.metadata.tree_count,
                self.trees.len()
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.metadata.feature_count).map_err(|e| {
                ForestError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Validate structure and check the stored hash against the trees.
    pub fn verify(&self) -> Result<(), ForestError> {
        self.validate()?;
        let computed = Self::calculate_model_hash(&self.trees, self.metadata.feature_count)?;
        if computed != self.metadata.model_hash {
            return Err(ForestError::HashMismatch {
                stored: self.metadata.model_hash.clone(),
                computed,
            });
        }
        Ok(())
    }

    pub fn calculate_model_hash(
        trees: &[RegressionTree],
        feature_count: usize,
    ) -> Result<String, ForestError> {
        let bytes = bincode::serialize(&(feature_count as u64, trees))?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ForestError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode an artifact and verify it before handing it out.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ForestError> {
        let model: ForestModel = bincode::deserialize(bytes)?;
        model.verify()?;
        Ok(model)
    }
}
