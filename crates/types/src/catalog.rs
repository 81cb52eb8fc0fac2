//! Supported crop/state catalog.
//!
//! The catalog is built once at startup and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::segment::SegmentKey;

/// Catalog lookup failures, worded for end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Unsupported crop: {0}")]
    UnsupportedCrop(String),
    #[error("State {state} not supported for {crop}")]
    UnsupportedState { crop: String, state: String },
}

/// Mapping crop → supported states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedCatalog {
    crops: BTreeMap<String, Vec<String>>,
}

impl SupportedCatalog {
    pub fn new(crops: BTreeMap<String, Vec<String>>) -> Self {
        Self { crops }
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    pub fn crops(&self) -> impl Iterator<Item = &str> {
        self.crops.keys().map(String::as_str)
    }

    pub fn states(&self, crop: &str) -> Option<&[String]> {
        self.crops.get(crop).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &SegmentKey) -> bool {
        self.check(key).is_ok()
    }

    /// Check a normalized key, reporting which half is unsupported.
    pub fn check(&self, key: &SegmentKey) -> Result<(), CatalogError> {
        let states = self
            .crops
            .get(&key.crop)
            .ok_or_else(|| CatalogError::UnsupportedCrop(key.crop.clone()))?;
        if states.iter().any(|state| state == &key.state) {
            Ok(())
        } else {
            Err(CatalogError::UnsupportedState {
                crop: key.crop.clone(),
                state: key.state.clone(),
            })
        }
    }

    /// Every (crop, state) pair, crops in sorted order.
    pub fn segments(&self) -> Vec<SegmentKey> {
        self.crops
            .iter()
            .flat_map(|(crop, states)| {
                states
                    .iter()
                    .map(move |state| SegmentKey::new(crop.clone(), state.clone()))
            })
            .collect()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.crops
    }
}

impl Default for SupportedCatalog {
    fn default() -> Self {
        let entries: [(&str, &[&str]); 8] = [
            ("Wheat", &["Uttar Pradesh", "Punjab", "Madhya Pradesh"]),
            ("Paddy", &["West Bengal", "Punjab", "Uttar Pradesh"]),
            ("Sugarcane", &["Uttar Pradesh", "Maharashtra"]),
            ("Maize", &["Madhya Pradesh", "Uttar Pradesh"]),
            ("Arhar", &["Maharashtra", "Madhya Pradesh", "Uttar Pradesh"]),
            ("Moong", &["Rajasthan", "Madhya Pradesh"]),
            ("Cotton", &["Gujarat", "Maharashtra", "Punjab"]),
            ("Mustard", &["Rajasthan", "Madhya Pradesh"]),
        ];

        let crops = entries
            .iter()
            .map(|(crop, states)| {
                (
                    crop.to_string(),
                    states.iter().map(|state| state.to_string()).collect(),
                )
            })
            .collect();

        Self { crops }
    }
}
