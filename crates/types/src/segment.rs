//! Segment identity.
//!
//! A segment is every record for one (crop, state) pair. The key doubles as
//! the cache key for trained models, so its artifact name must be stable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix shared by every model artifact name.
pub const ARTIFACT_SUFFIX: &str = "price_model";

/// Identity of a (crop, state) segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub crop: String,
    pub state: String,
}

impl SegmentKey {
    /// Build a key from already-normalized parts.
    pub fn new(crop: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            crop: crop.into(),
            state: state.into(),
        }
    }

    /// Build a key from user input: trims and title-cases both parts.
    pub fn normalized(crop: &str, state: &str) -> Self {
        Self {
            crop: title_case(crop.trim()),
            state: title_case(state.trim()),
        }
    }

    /// Deterministic artifact name, e.g. `arhar_madhya_pradesh_price_model`.
    ///
    /// Storage backends append their own extension.
    pub fn artifact_name(&self) -> String {
        format!(
            "{}_{}_{}",
            artifact_component(&self.crop),
            artifact_component(&self.state),
            ARTIFACT_SUFFIX
        )
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.crop, self.state)
    }
}

fn artifact_component(value: &str) -> String {
    value.to_lowercase().replace(' ', "_")
}

/// Title-case a string: the first letter of every alphabetic run is
/// upper-cased, every other letter lower-cased.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_alphabetic = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_alphabetic {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            out.push(ch);
            previous_alphabetic = false;
        }
    }
    out
}
