use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use rayon::prelude::*;
use tracing::{info, warn};
use crate::{
    batch::{BatchRow, BatchSpec},
    error::{MeasureError, Result},
    pipeline::measure_image,
    traits::MaskSource,
    types::{MeasurementResult, ScanAxis},
};

/// An image that produced no result, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    /// Zero-based data row in the batch
    pub row: usize,
    pub image_id: String,
    pub kind: &'static str,
    pub reason: String,
}

impl SkippedImage {
    fn new(row: usize, image_id: &str, error: &MeasureError) -> Self {
        Self {
            row,
            image_id: image_id.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Outcome of a batch run, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<MeasurementResult>,
    pub skipped: Vec<SkippedImage>,
    /// The cancellation flag was raised during the run
    pub cancelled: bool,
}

enum Outcome {
    Measured(MeasurementResult),
    Skipped(SkippedImage),
}

/// Measures every row of a [`BatchSpec`], one independent job per image.
pub struct BatchRunner {
    source: Box<dyn MaskSource>,
    image_dir: PathBuf,
    axis: ScanAxis,
    workers: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchRunner {
    pub fn new(source: Box<dyn MaskSource>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            image_dir: image_dir.into(),
            axis: ScanAxis::default(),
            workers: None,
            cancel: None,
        }
    }

    pub fn with_axis(mut self, axis: ScanAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Size of the worker pool; the global rayon pool is used when unset
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    /// Checked before each image starts; images after cancellation are skipped
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn image_path(&self, image_id: &str) -> PathBuf {
        self.image_dir.join(image_id)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Decode and measure a single row
    pub fn measure_row(&self, row: &BatchRow) -> Result<MeasurementResult> {
        let path = self.image_path(&row.image_id);
        let image = open_image(&path)?;
        measure_image(
            self.source.as_ref(),
            &row.image_id,
            &image,
            row.reference_length_mm,
            row.expected,
            self.axis,
        )
    }

    fn process_entry(&self, index: usize, entry: &Result<BatchRow>) -> Outcome {
        let row = match entry {
            Ok(row) => row,
            Err(error) => {
                let id = match error {
                    MeasureError::InvalidBatchRow { id, .. } => id.as_str(),
                    _ => "",
                };
                return Outcome::Skipped(SkippedImage::new(index, id, error));
            }
        };

        if self.is_cancelled() {
            return Outcome::Skipped(SkippedImage::new(index, &row.image_id, &MeasureError::Cancelled));
        }

        match self.measure_row(row) {
            Ok(result) => {
                info!(
                    "[OK] {} | Min = {:.2} mm, Max = {:.2} mm, Mean = {:.2} mm, Ratio = {:.4}, CV = {:.2}%",
                    result.image_id,
                    result.min_width,
                    result.max_width,
                    result.mean_width,
                    result.width_ratio,
                    result.coefficient_of_variation,
                );
                Outcome::Measured(result)
            }
            Err(error) => {
                warn!(image_id = %row.image_id, kind = error.kind(), "{error}. Skipping...");
                Outcome::Skipped(SkippedImage::new(index, &row.image_id, &error))
            }
        }
    }

    fn process_all(&self, spec: &BatchSpec) -> Vec<Outcome> {
        spec.entries()
            .par_iter()
            .enumerate()
            .map(|(index, entry)| self.process_entry(index, entry))
            .collect()
    }

    /// Measure the whole batch.
    ///
    /// Per-image failures are collected in [`BatchReport::skipped`]. Only an
    /// empty batch or a batch where nothing could be measured is an error.
    pub fn run(&self, spec: &BatchSpec) -> Result<BatchReport> {
        if spec.is_empty() {
            return Err(MeasureError::EmptyBatch);
        }
        info!("Processing {} entries from batch...", spec.len());

        let outcomes = match self.workers {
            Some(workers) => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| self.process_all(spec)),
                Err(e) => {
                    warn!("Could not build a {workers}-thread pool ({e}), using the global pool");
                    self.process_all(spec)
                }
            },
            None => self.process_all(spec),
        };

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Measured(result) => report.results.push(result),
                Outcome::Skipped(skipped) => report.skipped.push(skipped),
            }
        }
        report.cancelled = self.is_cancelled();

        if report.results.is_empty() {
            return Err(MeasureError::NoResults { skipped: report.skipped.len() });
        }
        info!(
            measured = report.results.len(),
            skipped = report.skipped.len(),
            "Batch complete"
        );
        Ok(report)
    }
}

/// Decode an image file; a missing or unreadable file is a per-image failure.
pub fn open_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).map_err(|source| MeasureError::ImageDecodeFailure {
        path: path.to_path_buf(),
        source,
    })
}
