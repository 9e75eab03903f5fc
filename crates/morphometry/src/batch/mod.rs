pub mod runner;

use std::{fs::File, io::Read, path::Path};

use serde::Deserialize;
use tracing::warn;
use crate::{
    error::{MeasureError, Result},
    types::ExpectedWidths,
};

/// Columns every batch file must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["ID", "LENGTH", "MIN_WIDTH", "MAX_WIDTH"];

/// One image to measure, with its calibration and expected bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub image_id: String,
    pub reference_length_mm: f64,
    pub expected: ExpectedWidths,
}

impl BatchRow {
    pub fn new(image_id: impl Into<String>, reference_length_mm: f64, min_width_mm: f64, max_width_mm: f64) -> Self {
        Self {
            image_id: image_id.into(),
            reference_length_mm,
            expected: ExpectedWidths { min_mm: min_width_mm, max_mm: max_width_mm },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "LENGTH")]
    length: f64,
    #[serde(rename = "MIN_WIDTH")]
    min_width: f64,
    #[serde(rename = "MAX_WIDTH")]
    max_width: f64,
}

/// Ordered batch rows. Rows that failed validation stay in place as errors so
/// they are reported, in order, alongside the measured ones.
#[derive(Debug, Default)]
pub struct BatchSpec {
    entries: Vec<Result<BatchRow>>,
}

impl BatchSpec {
    pub fn from_rows(rows: impl IntoIterator<Item = BatchRow>) -> Self {
        Self { entries: rows.into_iter().map(Ok).collect() }
    }

    /// Read a batch CSV file
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Read batch CSV data.
    ///
    /// A missing required column fails the whole batch. A bad value only
    /// invalidates its own row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(MeasureError::MissingRequiredColumn(column.to_string()));
            }
        }
        let id_index = headers.iter().position(|h| h == "ID");

        let mut entries = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let entry = match record {
                Ok(record) => {
                    let id = id_index
                        .and_then(|i| record.get(i))
                        .unwrap_or_default()
                        .to_string();
                    record
                        .deserialize::<RawRow>(Some(&headers))
                        .map_err(|e| invalid_row(row, &id, e.to_string()))
                        .and_then(|raw| validate(row, raw))
                }
                Err(e) => Err(invalid_row(row, "", e.to_string())),
            };
            if let Err(e) = &entry {
                warn!(kind = e.kind(), "{e}. Skipping...");
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Every row in input order, valid or not
    pub fn entries(&self) -> &[Result<BatchRow>] {
        &self.entries
    }

    pub fn rows(&self) -> impl Iterator<Item = &BatchRow> {
        self.entries.iter().filter_map(|e| e.as_ref().ok())
    }

    pub fn invalid_rows(&self) -> impl Iterator<Item = &MeasureError> {
        self.entries.iter().filter_map(|e| e.as_ref().err())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn invalid_row(row: usize, id: &str, reason: String) -> MeasureError {
    MeasureError::InvalidBatchRow { row, id: id.to_string(), reason }
}

fn validate(row: usize, raw: RawRow) -> Result<BatchRow> {
    if raw.id.is_empty() {
        return Err(invalid_row(row, "", "missing ID".to_string()));
    }
    if !(raw.length.is_finite() && raw.length > 0.0) {
        return Err(invalid_row(row, &raw.id, format!("LENGTH must be > 0, got {}", raw.length)));
    }
    for (name, value) in [("MIN_WIDTH", raw.min_width), ("MAX_WIDTH", raw.max_width)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(invalid_row(row, &raw.id, format!("{name} must be >= 0, got {value}")));
        }
    }
    Ok(BatchRow::new(raw.id, raw.length, raw.min_width, raw.max_width))
}
