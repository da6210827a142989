//! Loader for raw input series stored on disk.
//!
//! Each input lives in the data directory under its key name with one of
//! three supported formats, probed in this order:
//! - `<key>.csv`: header `date,value`
//! - `<key>.parquet`: `date` (string or date typed) and `value` columns
//! - `<key>.json`: FRED observations payload `{"observations": [{"date", "value"}]}`
//!
//! Unparseable values (FRED uses `"."` for holidays) load as NaN and are
//! treated as missing downstream. A missing file is not an error: the input
//! is simply absent from the returned [`InputSet`].

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::types::{InputKey, InputSet, Series, SeriesError, TimePoint};

/// Supported input file extensions, in probing order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "parquet", "json"];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

/// Loads raw input series from a data directory.
pub struct SeriesLoader {
    data_dir: PathBuf,
}

impl SeriesLoader {
    /// Create a loader pointing to a data directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of an input file with the given extension.
    fn input_path(&self, key: InputKey, ext: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", key.as_str(), ext))
    }

    /// First existing file for an input, if any.
    pub fn find_file(&self, key: InputKey) -> Option<PathBuf> {
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.input_path(key, ext))
            .find(|p| p.exists())
    }

    /// Inputs with a file present in the data directory.
    pub fn available_inputs(&self) -> Vec<InputKey> {
        InputKey::MARKET
            .iter()
            .chain(std::iter::once(&InputKey::Benchmark))
            .copied()
            .filter(|k| self.find_file(*k).is_some())
            .collect()
    }

    /// Load one input, `Ok(None)` when no file exists for it.
    pub fn load(&self, key: InputKey) -> Result<Option<Series>, LoaderError> {
        match self.find_file(key) {
            Some(path) => load_series_file(&path, key.as_str()).map(Some),
            None => Ok(None),
        }
    }

    /// Load every market input present, plus the benchmark when requested.
    pub fn load_inputs(&self, with_benchmark: bool) -> Result<InputSet, LoaderError> {
        let mut inputs = InputSet::new();
        let keys = InputKey::MARKET
            .iter()
            .copied()
            .chain(with_benchmark.then_some(InputKey::Benchmark));

        for key in keys {
            if let Some(series) = self.load(key)? {
                debug!("Loaded {} observations for {}", series.len(), key);
                inputs.insert(key, series);
            }
        }
        Ok(inputs)
    }
}

/// Load a single series file, dispatching on its extension.
pub fn load_series_file(path: &Path, name: &str) -> Result<Series, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let points = match ext.as_str() {
        "csv" => read_csv(path)?,
        "parquet" => read_parquet(path)?,
        "json" => read_fred_json(path)?,
        _ => return Err(LoaderError::UnsupportedFormat(path.display().to_string())),
    };
    Ok(Series::new(name, points)?)
}

fn parse_date(s: &str) -> Result<NaiveDate, LoaderError> {
    // Accept full timestamps by keeping only the date part.
    let trimmed = s.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|e| LoaderError::InvalidData(format!("Invalid date '{}': {}", s, e)))
}

fn parse_value(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn read_csv(path: &Path) -> Result<Vec<TimePoint>, LoaderError> {
    let file = File::open(path)?;
    let mut reader = ::csv::Reader::from_reader(file);
    let mut points = Vec::new();

    for row in reader.deserialize() {
        let row: CsvRow = row?;
        points.push(TimePoint::new(parse_date(&row.date)?, parse_value(&row.value)));
    }
    Ok(points)
}

fn read_fred_json(path: &Path) -> Result<Vec<TimePoint>, LoaderError> {
    let file = File::open(path)?;
    let payload: FredResponse = serde_json::from_reader(file)?;

    payload
        .observations
        .iter()
        .map(|obs| Ok(TimePoint::new(parse_date(&obs.date)?, parse_value(&obs.value))))
        .collect()
}

fn read_parquet(path: &Path) -> Result<Vec<TimePoint>, LoaderError> {
    let df = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?
        .select([col("date"), col("value")])
        .collect()?;

    // Date-typed columns cast to their ISO string form.
    let dates = df.column("date")?.cast(&DataType::String)?;
    let values = df.column("value")?.cast(&DataType::Float64)?;
    let dates = dates.str()?;
    let values = values.f64()?;

    let mut points = Vec::with_capacity(df.height());
    for (date, value) in dates.into_iter().zip(values.into_iter()) {
        let date = date.ok_or_else(|| LoaderError::InvalidData("Null date".to_string()))?;
        points.push(TimePoint::new(parse_date(date)?, value.unwrap_or(f64::NAN)));
    }
    Ok(points)
}
