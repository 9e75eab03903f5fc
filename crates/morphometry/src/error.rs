use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeasureError {
    #[error("Image file not found or unreadable: {path}: {source}")]
    ImageDecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No contours found in mask")]
    NoContourFound,

    #[error("Zero-size bounding box ({width}x{height} px)")]
    DegenerateBoundingBox { width: u32, height: u32 },

    #[error("No valid widths >= expected min ({expected_min_mm} mm)")]
    NoValidSamples { expected_min_mm: f64 },

    #[error("Reference length must be a positive number of millimetres, got {0}")]
    InvalidReferenceLength(f64),

    #[error("Invalid batch row {row} ({id}): {reason}")]
    InvalidBatchRow {
        row: usize,
        id: String,
        reason: String,
    },

    #[error("Batch file is missing required column: '{0}'")]
    MissingRequiredColumn(String),

    #[error("Threshold confirmation abandoned at threshold {threshold}")]
    ThresholdAbandoned { threshold: u8 },

    #[error("Threshold not accepted after {attempts} attempts")]
    ThresholdAttemptsExhausted { attempts: usize },

    #[error("Batch cancelled before this image was processed")]
    Cancelled,

    #[error("Batch contains no rows")]
    EmptyBatch,

    #[error("No valid measurements were produced ({skipped} image(s) skipped)")]
    NoResults { skipped: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeasureError {
    /// Batch-level failures abort the whole run; everything else skips one image.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredColumn(_)
                | Self::EmptyBatch
                | Self::NoResults { .. }
                | Self::Csv(_)
                | Self::Io(_)
        )
    }

    /// Short stable name of the failure kind, used in skip reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImageDecodeFailure { .. } => "image_decode_failure",
            Self::NoContourFound => "no_contour_found",
            Self::DegenerateBoundingBox { .. } => "degenerate_bounding_box",
            Self::NoValidSamples { .. } => "no_valid_samples",
            Self::InvalidReferenceLength(_) => "invalid_reference_length",
            Self::InvalidBatchRow { .. } => "invalid_batch_row",
            Self::MissingRequiredColumn(_) => "missing_required_column",
            Self::ThresholdAbandoned { .. } => "threshold_abandoned",
            Self::ThresholdAttemptsExhausted { .. } => "threshold_attempts_exhausted",
            Self::Cancelled => "cancelled",
            Self::EmptyBatch => "empty_batch",
            Self::NoResults { .. } => "no_results",
            Self::Csv(_) => "csv",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, MeasureError>;
