//! Train-or-load cache of per-segment price models.
//!
//! The artifact store is the cache: a hit deserializes the stored forest, a
//! miss trains from the canonical dataset and persists the result. Concurrent
//! misses on the same key are serialized so a segment is trained once.

use agrocast_dataset::PriceSource;
use agrocast_forest::{ForestConfig, ForestModel, ForestTrainer};
use agrocast_storage::ArtifactStore;
use agrocast_types::{SegmentKey, SupportedCatalog};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::features::{build_training_features, training_set};
use crate::TrainingFailure;

/// Result of one segment in a bulk training run.
#[derive(Debug)]
pub enum TrainStatus {
    Trained,
    /// An artifact was already present and training was not forced
    Skipped,
    Failed(TrainingFailure),
}

#[derive(Debug)]
pub struct SegmentOutcome {
    pub key: SegmentKey,
    pub status: TrainStatus,
}

pub struct SegmentModelStore {
    source: Arc<dyn PriceSource>,
    artifacts: Arc<dyn ArtifactStore>,
    trainer: ForestTrainer,
    key_locks: Mutex<HashMap<SegmentKey, Arc<Mutex<()>>>>,
}

impl SegmentModelStore {
    pub fn new(
        source: Arc<dyn PriceSource>,
        artifacts: Arc<dyn ArtifactStore>,
        config: ForestConfig,
    ) -> Self {
        Self {
            source,
            artifacts,
            trainer: ForestTrainer::new(config),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> Arc<dyn PriceSource> {
        Arc::clone(&self.source)
    }

    /// Return the stored model for `key`, training and persisting it first if
    /// no artifact exists. `key` must already be normalized.
    #[instrument(skip(self), fields(segment = %key))]
    pub fn get_or_train(&self, key: &SegmentKey) -> Result<ForestModel, TrainingFailure> {
        if let Some(model) = self.artifacts.get(key)? {
            debug!("Loaded existing model for {}", key);
            return Ok(model);
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock();

        // another caller may have finished training while we waited
        if let Some(model) = self.artifacts.get(key)? {
            debug!("Model for {} was trained by a concurrent request", key);
            return Ok(model);
        }

        info!("Training new model for {}", key);
        self.train_and_store(key)
    }

    /// Train `key` unconditionally and replace any existing artifact.
    #[instrument(skip(self), fields(segment = %key))]
    pub fn retrain(&self, key: &SegmentKey) -> Result<ForestModel, TrainingFailure> {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        info!("Retraining model for {}", key);
        self.train_and_store(key)
    }

    /// Train every catalog segment. Existing artifacts are kept unless
    /// `force` is set; a failing segment does not stop the run.
    pub fn train_catalog(&self, catalog: &SupportedCatalog, force: bool) -> Vec<SegmentOutcome> {
        catalog
            .segments()
            .into_iter()
            .map(|key| {
                let status = match self.train_one(&key, force) {
                    Ok(true) => TrainStatus::Trained,
                    Ok(false) => TrainStatus::Skipped,
                    Err(failure) => {
                        warn!("Training failed for {}: {}", key, failure);
                        TrainStatus::Failed(failure)
                    }
                };
                SegmentOutcome { key, status }
            })
            .collect()
    }

    fn train_one(&self, key: &SegmentKey, force: bool) -> Result<bool, TrainingFailure> {
        if !force && self.artifacts.exists(key)? {
            debug!("Model for {} already exists, skipping", key);
            return Ok(false);
        }
        self.retrain(key)?;
        Ok(true)
    }

    /// Entries are never evicted; the map stays bounded by the catalog
    /// because unsupported keys are rejected before reaching the store.
    fn key_lock(&self, key: &SegmentKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock();
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    fn train_and_store(&self, key: &SegmentKey) -> Result<ForestModel, TrainingFailure> {
        let segment = self.source.load_segment(key)?;
        if segment.is_empty() {
            warn!("No data found for {}", key);
            return Err(TrainingFailure::EmptySegment(key.clone()));
        }

        let samples = build_training_features(&segment);
        if samples.is_empty() {
            return Err(TrainingFailure::InsufficientHistory {
                key: key.clone(),
                rows: segment.len(),
            });
        }

        let set = training_set(&samples)?;
        let model = self.trainer.train(&set)?.with_segment(key.clone());
        self.artifacts.put(key, &model)?;

        info!(
            "Trained model for {} on {} rows ({} trees)",
            key,
            set.len(),
            model.num_trees()
        );
        Ok(model)
    }
}
