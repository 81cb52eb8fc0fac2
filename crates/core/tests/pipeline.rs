//! End-to-end tests for the train-or-load pipeline: CSV dataset, file-backed
//! artifacts, segment store and predictor.

use agrocast_core::{
    PredictionError, PredictionQuery, Predictor, SegmentModelStore, TrainingFailure,
};
use agrocast_dataset::{
    write_csv, CsvPriceSource, DatasetError, MemoryPriceSource, PriceSource,
};
use agrocast_forest::ForestConfig;
use agrocast_storage::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
use agrocast_types::{CatalogError, PriceRecord, SegmentKey, SupportedCatalog};
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Price source that counts full loads.
struct CountingSource {
    inner: MemoryPriceSource,
    loads: AtomicUsize,
}

impl CountingSource {
    fn new(records: Vec<PriceRecord>) -> Self {
        Self {
            inner: MemoryPriceSource::new(records),
            loads: AtomicUsize::new(0),
        }
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl PriceSource for CountingSource {
    fn load_all(&self) -> Result<Vec<PriceRecord>, DatasetError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_all()
    }
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn wheat_punjab() -> SegmentKey {
    SegmentKey::new("Wheat", "Punjab")
}

/// `days` consecutive daily rows with price `100 + d`.
fn linear_segment(key: &SegmentKey, days: usize) -> Vec<PriceRecord> {
    (0..days)
        .map(|d| {
            PriceRecord::new(
                start() + Duration::days(d as i64),
                key,
                100.0 + d as f64,
                10.0,
                600.0,
            )
        })
        .collect()
}

fn fast_config() -> ForestConfig {
    ForestConfig {
        n_estimators: 20,
        ..ForestConfig::default()
    }
}

/// Rainfall in [0, 50) and demand in [500, 700), as the placeholder data has.
fn draw_inputs(rng: &mut StdRng) -> (f64, f64) {
    (rng.gen::<f64>() * 50.0, rng.gen::<f64>() * 200.0 + 500.0)
}

#[test]
fn end_to_end_linear_segment_predicts_near_trend() {
    let temp_dir = TempDir::new().unwrap();
    let data_file = temp_dir.path().join("all_crop_data.csv");
    let mut rng = StdRng::seed_from_u64(7);
    let mut records: Vec<PriceRecord> = linear_segment(&wheat_punjab(), 60)
        .into_iter()
        .map(|mut r| {
            (r.rainfall, r.demand) = draw_inputs(&mut rng);
            r
        })
        .collect();
    records.extend(linear_segment(&SegmentKey::new("Paddy", "Punjab"), 60).into_iter().map(
        |mut r| {
            r.price *= 3.0;
            r
        },
    ));
    write_csv(&data_file, &records).unwrap();

    let artifacts = Arc::new(FileArtifactStore::open(temp_dir.path().join("models")).unwrap());
    let store = Arc::new(SegmentModelStore::new(
        Arc::new(CsvPriceSource::new(&data_file)),
        artifacts.clone(),
        ForestConfig::default(),
    ));
    let predictor = Predictor::new(store).with_catalog(SupportedCatalog::default());

    let (rainfall, demand) = draw_inputs(&mut rng);
    let query = PredictionQuery {
        key: wheat_punjab(),
        date: start() + Duration::days(60),
        rainfall,
        demand,
    };
    let predicted = predictor.predict(&query).unwrap();

    // trees cannot extrapolate, so the answer sits just under the trend value
    let truth = 160.0;
    assert!(
        (predicted - truth).abs() < truth * 0.05,
        "predicted {predicted}, expected about {truth}"
    );
    assert!(temp_dir
        .path()
        .join("models")
        .join("wheat_punjab_price_model.bin")
        .is_file());
    assert!(artifacts.exists(&wheat_punjab()).unwrap());
}

#[test]
fn short_segment_fails_without_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let artifacts = Arc::new(FileArtifactStore::open(temp_dir.path()).unwrap());
    let store = SegmentModelStore::new(
        Arc::new(MemoryPriceSource::new(linear_segment(&wheat_punjab(), 6))),
        artifacts.clone(),
        fast_config(),
    );

    let result = store.get_or_train(&wheat_punjab());
    assert!(matches!(
        result,
        Err(TrainingFailure::InsufficientHistory { rows: 6, .. })
    ));
    assert!(!artifacts.exists(&wheat_punjab()).unwrap());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn get_or_train_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(CountingSource::new(linear_segment(&wheat_punjab(), 40)));
    let store = SegmentModelStore::new(
        source.clone(),
        Arc::new(FileArtifactStore::open(temp_dir.path()).unwrap()),
        fast_config(),
    );

    let first = store.get_or_train(&wheat_punjab()).unwrap();
    let second = store.get_or_train(&wheat_punjab()).unwrap();

    // the second call is served from the artifact
    assert_eq!(source.loads(), 1);
    assert_eq!(first, second);

    let features = [10.0, 600.0, 2.0, 3.0, 130.0];
    assert_eq!(first.predict(&features).unwrap(), second.predict(&features).unwrap());
}

#[test]
fn independent_stores_train_identical_models() {
    let records = linear_segment(&wheat_punjab(), 40);
    let train = |records: Vec<PriceRecord>| {
        SegmentModelStore::new(
            Arc::new(MemoryPriceSource::new(records)),
            Arc::new(MemoryArtifactStore::new()),
            fast_config(),
        )
        .get_or_train(&wheat_punjab())
        .unwrap()
    };

    let a = train(records.clone());
    let b = train(records);
    assert_eq!(a.trees, b.trees);
    assert_eq!(a.metadata.model_hash, b.metadata.model_hash);
}

#[test]
fn concurrent_misses_train_once() {
    let source = Arc::new(CountingSource::new(linear_segment(&wheat_punjab(), 40)));
    let store = SegmentModelStore::new(
        source.clone(),
        Arc::new(MemoryArtifactStore::new()),
        fast_config(),
    );

    let hashes: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| store.get_or_train(&wheat_punjab()).unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().metadata.model_hash)
            .collect()
    });

    assert_eq!(source.loads(), 1);
    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn unsupported_segment_rejected_before_any_work() {
    let source = Arc::new(CountingSource::new(linear_segment(&wheat_punjab(), 40)));
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let store = Arc::new(SegmentModelStore::new(
        source.clone(),
        artifacts.clone(),
        fast_config(),
    ));
    let predictor = Predictor::new(store).with_catalog(SupportedCatalog::default());

    let mut query = PredictionQuery {
        key: SegmentKey::new("Rice", "Punjab"),
        date: start(),
        rainfall: 0.0,
        demand: 0.0,
    };
    let err = predictor.predict(&query).unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(err.to_string(), "Unsupported crop: Rice");

    query.key = SegmentKey::new("Wheat", "Kerala");
    assert!(matches!(
        predictor.predict(&query),
        Err(PredictionError::UnsupportedSegment(CatalogError::UnsupportedState { .. }))
    ));

    assert_eq!(source.loads(), 0);
    assert!(artifacts.is_empty());
}

#[test]
fn missing_segment_without_catalog_is_training_failure() {
    let store = Arc::new(SegmentModelStore::new(
        Arc::new(MemoryPriceSource::new(linear_segment(&wheat_punjab(), 40))),
        Arc::new(MemoryArtifactStore::new()),
        fast_config(),
    ));
    let predictor = Predictor::new(store);

    let err = predictor
        .predict(&PredictionQuery {
            key: SegmentKey::new("Maize", "Punjab"),
            date: start(),
            rainfall: 0.0,
            demand: 0.0,
        })
        .unwrap_err();
    assert!(!err.is_invalid_input());
    assert!(matches!(
        err,
        PredictionError::Training {
            source: TrainingFailure::EmptySegment(_),
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "Could not load/train model for Maize in Punjab: No data found for Maize in Punjab"
    );
}

#[test]
fn stored_model_without_history_reports_no_data() {
    let artifacts = Arc::new(MemoryArtifactStore::new());
    SegmentModelStore::new(
        Arc::new(MemoryPriceSource::new(linear_segment(&wheat_punjab(), 40))),
        artifacts.clone(),
        fast_config(),
    )
    .get_or_train(&wheat_punjab())
    .unwrap();

    // same artifacts, but the dataset no longer has the segment
    let store = Arc::new(SegmentModelStore::new(
        Arc::new(MemoryPriceSource::default()),
        artifacts,
        fast_config(),
    ));
    let err = Predictor::new(store)
        .predict(&PredictionQuery {
            key: wheat_punjab(),
            date: start(),
            rainfall: 0.0,
            demand: 0.0,
        })
        .unwrap_err();
    assert!(matches!(err, PredictionError::NoHistoricalData(_)));
    assert_eq!(err.to_string(), "No historical data found for Wheat in Punjab");
}

#[test]
fn missing_dataset_file_surfaces_as_training_failure() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SegmentModelStore::new(
        Arc::new(CsvPriceSource::new(temp_dir.path().join("absent.csv"))),
        Arc::new(MemoryArtifactStore::new()),
        fast_config(),
    ));
    let err = Predictor::new(store)
        .predict(&PredictionQuery {
            key: wheat_punjab(),
            date: start(),
            rainfall: 0.0,
            demand: 0.0,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        PredictionError::Training {
            source: TrainingFailure::Dataset(DatasetError::NotFound(_)),
            ..
        }
    ));
}

#[test]
fn retrain_replaces_artifact() {
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let key = wheat_punjab();
    SegmentModelStore::new(
        Arc::new(MemoryPriceSource::new(linear_segment(&key, 30))),
        artifacts.clone(),
        fast_config(),
    )
    .get_or_train(&key)
    .unwrap();

    let store = SegmentModelStore::new(
        Arc::new(MemoryPriceSource::new(linear_segment(&key, 50))),
        artifacts.clone(),
        fast_config(),
    );
    assert_eq!(store.get_or_train(&key).unwrap().metadata.training_rows, 24);
    assert_eq!(store.retrain(&key).unwrap().metadata.training_rows, 44);
    assert_eq!(
        artifacts.get(&key).unwrap().unwrap().metadata.training_rows,
        44
    );
}

#[test]
fn incomplete_rows_only_cost_their_own_segment() {
    let temp_dir = TempDir::new().unwrap();
    let data_file = temp_dir.path().join("all_crop_data.csv");
    let paddy = SegmentKey::new("Paddy", "Punjab");

    let mut csv = String::from("Date,Crop,State,Price,Rainfall,Demand\n");
    for d in 0..40 {
        let date = start() + Duration::days(d);
        csv.push_str(&format!("{date},Wheat,Punjab,{},10,600\n", 100 + d));
        // one Paddy row has a blank rainfall cell and another a NaN demand
        let (rainfall, demand) = match d {
            12 => (String::new(), "600".to_string()),
            25 => ("10".to_string(), "NaN".to_string()),
            _ => ("10".to_string(), "600".to_string()),
        };
        csv.push_str(&format!("{date},Paddy,Punjab,{},{rainfall},{demand}\n", 300 + d));
    }
    std::fs::write(&data_file, csv).unwrap();

    let store = SegmentModelStore::new(
        Arc::new(CsvPriceSource::new(&data_file)),
        Arc::new(MemoryArtifactStore::new()),
        fast_config(),
    );

    let wheat = store.get_or_train(&wheat_punjab()).unwrap();
    assert_eq!(wheat.metadata.training_rows, 34);

    let paddy_model = store.get_or_train(&paddy).unwrap();
    assert_eq!(paddy_model.metadata.training_rows, 32);
}
