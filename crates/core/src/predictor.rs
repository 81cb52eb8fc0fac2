use agrocast_dataset::PriceSource;
use agrocast_types::{SegmentKey, SupportedCatalog};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::features::build_query_features;
use crate::segment_store::SegmentModelStore;
use crate::PredictionError;

/// One price question: which segment, which day, and the exogenous inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionQuery {
    pub key: SegmentKey,
    pub date: NaiveDate,
    pub rainfall: f64,
    pub demand: f64,
}

/// Answers [`PredictionQuery`]s, training segment models on first use.
pub struct Predictor {
    store: Arc<SegmentModelStore>,
    source: Arc<dyn PriceSource>,
    catalog: Option<SupportedCatalog>,
}

impl Predictor {
    pub fn new(store: Arc<SegmentModelStore>) -> Self {
        let source = store.source();
        Self {
            store,
            source,
            catalog: None,
        }
    }

    /// Reject keys outside `catalog` before touching data or models.
    pub fn with_catalog(mut self, catalog: SupportedCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[instrument(skip(self, query), fields(segment = %query.key, date = %query.date))]
    pub fn predict(&self, query: &PredictionQuery) -> Result<f64, PredictionError> {
        if let Some(catalog) = &self.catalog {
            catalog.check(&query.key)?;
        }

        let model = self
            .store
            .get_or_train(&query.key)
            .map_err(|source| PredictionError::Training {
                key: query.key.clone(),
                source,
            })?;

        let segment = self.source.load_segment(&query.key)?;
        if segment.is_empty() {
            return Err(PredictionError::NoHistoricalData(query.key.clone()));
        }

        let row = build_query_features(&segment, query.date, query.rainfall, query.demand)?;
        let price = model.predict(&row.to_vector())?;
        debug!("Predicted {:.2} for {} on {}", price, query.key, query.date);
        Ok(price)
    }
}
