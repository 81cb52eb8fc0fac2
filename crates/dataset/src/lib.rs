//! Agrocast dataset access
//!
//! Loads the canonical price table (`Date,Crop,State,Price,Rainfall,Demand`)
//! and exposes it through the [`PriceSource`] trait so the model store and
//! predictor can be driven from a CSV file or an in-memory fixture.

pub mod errors;
pub mod loader;
pub mod synth;

use agrocast_types::{filter_segment, PriceRecord, SegmentKey};

pub use errors::DatasetError;
pub use loader::{read_records, write_csv, write_records, CsvPriceSource, MemoryPriceSource, REQUIRED_COLUMNS};
pub use synth::{synthesize, SynthConfig};

/// Read access to the canonical dataset.
///
/// Every call reloads from the backing store; callers that need the same data
/// twice should hold on to the returned vector.
pub trait PriceSource: Send + Sync {
    /// Load every record in file order.
    fn load_all(&self) -> Result<Vec<PriceRecord>, DatasetError>;

    /// Load the records of one segment in file order.
    fn load_segment(&self, key: &SegmentKey) -> Result<Vec<PriceRecord>, DatasetError> {
        let records = self.load_all()?;
        Ok(filter_segment(&records, key))
    }
}
