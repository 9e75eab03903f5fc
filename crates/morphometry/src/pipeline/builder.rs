use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    algorithms::{
        ClahePreprocessor,
        ClosingPreprocessor,
        GaussianBlurPreprocessor,
        OpeningPreprocessor,
        OtsuThresholdPreprocessor,
        ThresholdPreprocessor,
    },
    pipeline::MaskPipeline,
    traits::ImagePreprocessor,
    types::BackgroundPolarity,
};

/// Tuning of the automatic segmentation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MaskParams {
    /// CLAHE clip limit, relative to the mean histogram bin
    #[schemars(range(min = 0.0))]
    pub clahe_clip_limit: f32,
    /// CLAHE grid size (tiles per side)
    #[schemars(range(min = 1, max = 64))]
    pub clahe_tiles: u32,
    /// Gaussian blur sigma; 0 disables smoothing
    #[schemars(range(min = 0.0))]
    pub blur_sigma: f32,
    /// 3x3 opening iterations (speckle removal)
    pub open_iterations: u8,
    /// 3x3 closing iterations (gap filling)
    pub close_iterations: u8,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            blur_sigma: 1.1,
            open_iterations: 1,
            close_iterations: 2,
        }
    }
}

/// Builder for mask pipelines with a fluent API
pub struct MaskPipelineBuilder {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
}

impl MaskPipelineBuilder {
    /// Create a new, empty pipeline builder
    pub fn new() -> Self {
        Self { preprocessors: Vec::new() }
    }

    /// Add a stage to the end of the pipeline
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Tile-based contrast normalization against uneven lighting and glare
    pub fn with_clahe(self, clip_limit: f32, tiles: u32) -> Self {
        self.add_preprocessor(ClahePreprocessor { clip_limit, tiles })
    }

    /// Gaussian smoothing; must come before thresholding
    pub fn with_blur(self, sigma: f32) -> Self {
        self.add_preprocessor(GaussianBlurPreprocessor { sigma })
    }

    /// Otsu threshold oriented by background polarity
    pub fn with_otsu(self, polarity: BackgroundPolarity) -> Self {
        self.add_preprocessor(OtsuThresholdPreprocessor { polarity })
    }

    /// Fixed threshold, object = intensity > threshold
    pub fn with_threshold(self, threshold: u8) -> Self {
        self.add_preprocessor(ThresholdPreprocessor { threshold })
    }

    /// Opening then closing. Opening goes first so closing cannot cement speckle.
    pub fn with_cleanup(self, open_iterations: u8, close_iterations: u8) -> Self {
        self.add_preprocessor(OpeningPreprocessor { iterations: open_iterations })
            .add_preprocessor(ClosingPreprocessor { iterations: close_iterations })
    }

    pub fn build(self) -> MaskPipeline {
        MaskPipeline::new(self.preprocessors)
    }

    /// Build the automatic segmentation pipeline
    pub fn build_automatic(polarity: BackgroundPolarity, params: &MaskParams) -> MaskPipeline {
        Self::new()
            .with_clahe(params.clahe_clip_limit, params.clahe_tiles)
            .with_blur(params.blur_sigma)
            .with_otsu(polarity)
            .with_cleanup(params.open_iterations, params.close_iterations)
            .build()
    }

    /// Build the single-threshold pipeline used by interactive confirmation
    pub fn build_manual(threshold: u8) -> MaskPipeline {
        Self::new().with_threshold(threshold).build()
    }
}

impl Default for MaskPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
