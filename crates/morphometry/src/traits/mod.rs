use image::{DynamicImage, GrayImage};
use crate::{
    error::Result,
    interactive::{Decision, ThresholdPreview},
    types::BinaryMask,
};

/// Trait for the grayscale stages that run before and after thresholding
pub trait ImagePreprocessor: Send + Sync {
    /// Transform the input image (e.g. equalize, blur, threshold, clean up)
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Anything that can turn a decoded photograph into a [`BinaryMask`].
///
/// One source is chosen per batch and shared by every worker.
pub trait MaskSource: Send + Sync {
    fn produce_mask(&self, image_id: &str, image: &DynamicImage) -> Result<BinaryMask>;
}

/// Human (or scripted) reviewer of a proposed manual threshold.
pub trait ThresholdPrompt: Send {
    /// Look at the preview and decide what happens next
    fn review(&mut self, image_id: &str, preview: &ThresholdPreview<'_>) -> Decision;
}
