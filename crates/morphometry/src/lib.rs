//! # Morphometry
//!
//! Width measurement for elongated objects photographed on a plain
//! background (fish, leaves, roots, rods).
//!
//! Each image goes through four stages:
//!
//! - **Mask**: CLAHE, Gaussian blur, Otsu threshold by background polarity,
//!   then morphological opening and closing ([`MaskPipeline`])
//! - **Align**: rotate so the minimum-area rectangle's long side is horizontal
//!   ([`align_horizontal`])
//! - **Profile**: count object pixels across the object at every position
//!   along its length, scaled by the known reference length ([`thickness_profile`])
//! - **Summarize**: filter, then min/max/mean/ratio/CV against the expected
//!   bounds ([`summarize`])
//!
//! Masks come from a [`MaskSource`]: automatic segmentation, or a manual
//! threshold confirmed by a reviewer through a [`ThresholdPrompt`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use morphometry::{BackgroundPolarity, BatchRunner, BatchSpec, Segmentation, MaskParams};
//!
//! let spec = BatchSpec::from_csv_path("widths.csv")?;
//! let source = Segmentation::Automatic {
//!     polarity: BackgroundPolarity::Light,
//!     params: MaskParams::default(),
//! }
//! .into_source(None);
//!
//! let report = BatchRunner::new(source, "images/").run(&spec)?;
//! morphometry::write_results_csv("results.csv", &report.results)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Single Image
//!
//! ```rust,no_run
//! use morphometry::{algorithms::*, build_mask, BackgroundPolarity, ExpectedWidths, ScanAxis};
//!
//! let image = image::open("bar.png")?;
//! let mask = align_horizontal(&build_mask(&image, BackgroundPolarity::Light)?);
//! let profile = thickness_profile(&mask, 600.0, ScanAxis::Horizontal)?;
//! let result = summarize("bar.png", &profile, ExpectedWidths { min_mm: 0.0, max_mm: 9999.0 })?;
//! println!("mean width {:.2} mm", result.mean_width);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod interactive;
pub mod source;
pub mod batch;
pub mod io;

pub use error::{MeasureError, Result};
pub use types::*;
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{build_mask, measure_image, MaskPipeline, builder::{MaskParams, MaskPipelineBuilder}};
pub use interactive::{confirm, render_preview, Decision, LoopState, ThresholdConfirmationLoop, ThresholdPreview, DEFAULT_THRESHOLD};
pub use source::{AcceptAll, AutomaticMaskSource, InteractiveMaskSource, Segmentation};
pub use batch::{BatchRow, BatchSpec, REQUIRED_COLUMNS, runner::{BatchReport, BatchRunner, SkippedImage}};
pub use io::*;
