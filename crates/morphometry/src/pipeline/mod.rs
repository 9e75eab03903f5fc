pub mod builder;

use image::{DynamicImage, GrayImage};
use tracing::debug;
use crate::{
    algorithms::{align_to_axis, summarize, thickness_profile},
    error::Result,
    traits::{ImagePreprocessor, MaskSource},
    types::{BackgroundPolarity, BinaryMask, ExpectedWidths, MeasurementResult, ScanAxis},
};
use builder::{MaskParams, MaskPipelineBuilder};

/// Ordered grayscale stages that turn a photograph into a [`BinaryMask`].
pub struct MaskPipeline {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
}

impl MaskPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> MaskPipelineBuilder {
        MaskPipelineBuilder::new()
    }

    pub fn new(preprocessors: Vec<Box<dyn ImagePreprocessor>>) -> Self {
        Self { preprocessors }
    }

    /// The automatic segmentation path: CLAHE, blur, Otsu by polarity,
    /// opening, then closing.
    pub fn automatic(polarity: BackgroundPolarity, params: &MaskParams) -> Self {
        MaskPipelineBuilder::build_automatic(polarity, params)
    }

    /// Run every stage in order and binarize the result
    pub fn process(&self, image: &GrayImage) -> Result<BinaryMask> {
        let mut processed = image.clone();
        for preprocessor in &self.preprocessors {
            processed = preprocessor.preprocess(&processed)?;
        }
        Ok(BinaryMask::from_gray(processed))
    }

    /// Convert a color photograph to intensity and run the pipeline
    pub fn build_mask(&self, image: &DynamicImage) -> Result<BinaryMask> {
        self.process(&image.to_luma8())
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!("MaskPipeline: {} stages", self.preprocessors.len())
    }
}

/// Build an object/background mask with the default automatic parameters.
///
/// The built-in stages never fail; a photo without a usable object yields an
/// empty mask, which the later stages report as [`crate::MeasureError::NoContourFound`].
pub fn build_mask(image: &DynamicImage, polarity: BackgroundPolarity) -> Result<BinaryMask> {
    MaskPipeline::automatic(polarity, &MaskParams::default()).build_mask(image)
}

/// Mask, align, scan and summarize one decoded image.
///
/// The object's long axis is turned onto `axis` before scanning, so the
/// reference length always calibrates the object's length.
pub fn measure_image(
    source: &dyn MaskSource,
    image_id: &str,
    image: &DynamicImage,
    reference_length_mm: f64,
    expected: ExpectedWidths,
    axis: ScanAxis,
) -> Result<MeasurementResult> {
    let mask = source.produce_mask(image_id, image)?;
    let aligned = align_to_axis(&mask, axis);
    let profile = thickness_profile(&aligned, reference_length_mm, axis)?;
    debug!(image_id, samples = profile.len(), "Thickness profile ready");
    summarize(image_id, &profile, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    #[test]
    fn test_mask_is_two_valued() {
        let mut image = RgbImage::from_pixel(200, 100, Rgb([250, 250, 250]));
        draw_filled_rect_mut(&mut image, Rect::at(40, 40).of_size(120, 20), Rgb([20, 20, 20]));
        let mask = build_mask(&DynamicImage::ImageRgb8(image), BackgroundPolarity::Light).unwrap();

        assert_eq!(mask.dimensions(), (200, 100));
        assert!(mask.as_image().pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(mask.is_object(100, 50));
        assert!(!mask.is_object(5, 5));
    }

    #[test]
    fn test_black_background_selects_light_object() {
        let mut image = GrayImage::from_pixel(200, 100, Luma([10]));
        draw_filled_rect_mut(&mut image, Rect::at(40, 30).of_size(120, 40), Luma([230]));
        let mask = build_mask(&DynamicImage::ImageLuma8(image), BackgroundPolarity::Black).unwrap();

        assert!(mask.is_object(100, 50));
        assert!(!mask.is_object(5, 5));
    }

    #[test]
    fn test_wrong_polarity_marks_background() {
        let mut image = GrayImage::from_pixel(200, 100, Luma([10]));
        draw_filled_rect_mut(&mut image, Rect::at(40, 30).of_size(120, 40), Luma([230]));
        let mask = build_mask(&DynamicImage::ImageLuma8(image), BackgroundPolarity::Light).unwrap();

        assert!(!mask.is_object(100, 50));
        assert!(mask.is_object(5, 5));
    }

    #[test]
    fn test_speckle_is_removed() {
        let mut image = GrayImage::from_pixel(200, 100, Luma([250]));
        draw_filled_rect_mut(&mut image, Rect::at(40, 30).of_size(120, 40), Luma([10]));
        image.put_pixel(10, 10, Luma([0]));
        let mask = build_mask(&DynamicImage::ImageLuma8(image), BackgroundPolarity::Light).unwrap();

        assert!(!mask.is_object(10, 10));
        assert!(mask.is_object(100, 50));
    }

    #[test]
    fn test_pipeline_info() {
        let pipeline = MaskPipeline::automatic(BackgroundPolarity::Black, &MaskParams::default());
        assert_eq!(pipeline.info(), "MaskPipeline: 5 stages");
    }
}
