//! CSV loading and writing for the canonical dataset.

use agrocast_types::PriceRecord;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{DatasetError, PriceSource};

/// Columns the canonical dataset must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 6] = ["Date", "Crop", "State", "Price", "Rainfall", "Demand"];

/// Dataset backed by a CSV file that is re-read on every load.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl PriceSource for CsvPriceSource {
    fn load_all(&self) -> Result<Vec<PriceRecord>, DatasetError> {
        let file = File::open(&self.path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                DatasetError::NotFound(self.path.clone())
            } else {
                DatasetError::Io(err)
            }
        })?;
        let records = read_records(file)?;
        debug!(
            "Loaded {} price records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Fixed in-memory dataset, mostly for tests and offline tooling.
#[derive(Debug, Clone, Default)]
pub struct MemoryPriceSource {
    records: Vec<PriceRecord>,
}

impl MemoryPriceSource {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        Self { records }
    }
}

impl PriceSource for MemoryPriceSource {
    fn load_all(&self) -> Result<Vec<PriceRecord>, DatasetError> {
        Ok(self.records.clone())
    }
}

/// Parse the canonical layout from any reader. Column order is free, extra
/// columns are ignored.
///
/// Rows with a blank crop or state, or a Price, Rainfall or Demand that is
/// blank, non-numeric or not finite are skipped with a warning. Header and
/// Date problems fail the whole load.
pub fn read_records<R: Read>(input: R) -> Result<Vec<PriceRecord>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let columns = resolve_columns(&headers)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, result) in reader.records().enumerate() {
        // header is line 1
        let line = idx + 2;
        let row = result?;
        match parse_row(&row, &columns, line)? {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Dropped {} incomplete price rows", skipped);
    }
    Ok(records)
}

/// Write records to `path` in canonical column order, creating parent
/// directories as needed.
pub fn write_csv(path: &Path, records: &[PriceRecord]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_records(file, records)?;
    debug!("Wrote {} price records to {}", records.len(), path.display());
    Ok(())
}

/// Write records in canonical column order.
pub fn write_records<W: Write>(output: W, records: &[PriceRecord]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_writer(output);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

struct ColumnIndex {
    date: usize,
    crop: usize,
    state: usize,
    price: usize,
    rainfall: usize,
    demand: usize,
}

fn resolve_columns(headers: &StringRecord) -> Result<ColumnIndex, DatasetError> {
    let positions: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim_start_matches('\u{feff}'), idx))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !positions.contains_key(*column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns {
            required: REQUIRED_COLUMNS.to_vec(),
            missing,
        });
    }

    Ok(ColumnIndex {
        date: positions["Date"],
        crop: positions["Crop"],
        state: positions["State"],
        price: positions["Price"],
        rainfall: positions["Rainfall"],
        demand: positions["Demand"],
    })
}

/// `Ok(None)` marks an incomplete row that should be dropped.
fn parse_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    line: usize,
) -> Result<Option<PriceRecord>, DatasetError> {
    let raw_date = text_field(row, columns.date, "Date", line)?;
    let date = parse_date(raw_date).ok_or_else(|| DatasetError::InvalidRow {
        line,
        message: format!("Date is not YYYY-MM-DD: '{raw_date}'"),
    })?;

    let crop = text_field(row, columns.crop, "Crop", line)?;
    let state = text_field(row, columns.state, "State", line)?;
    if crop.is_empty() || state.is_empty() {
        warn!("Skipping line {}: blank Crop or State", line);
        return Ok(None);
    }

    let (Some(price), Some(rainfall), Some(demand)) = (
        number_field(row, columns.price, "Price", line)?,
        number_field(row, columns.rainfall, "Rainfall", line)?,
        number_field(row, columns.demand, "Demand", line)?,
    ) else {
        return Ok(None);
    };

    Ok(Some(PriceRecord {
        date,
        crop: crop.to_string(),
        state: state.to_string(),
        price,
        rainfall,
        demand,
    }))
}

fn text_field<'r>(row: &'r StringRecord, idx: usize, name: &str, line: usize) -> Result<&'r str, DatasetError> {
    row.get(idx).ok_or_else(|| DatasetError::InvalidRow {
        line,
        message: format!("missing value for {name}"),
    })
}

/// Blank, non-numeric and non-finite values yield `None`.
fn number_field(
    row: &StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<Option<f64>, DatasetError> {
    let raw = text_field(row, idx, name, line)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => {
            warn!("Skipping line {}: {} is not a number: '{}'", line, name, raw);
            Ok(None)
        }
    }
}

/// Accepts plain dates and the midnight timestamps some exporters emit.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}
