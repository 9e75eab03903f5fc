use std::sync::Mutex;

use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::{
    error::Result,
    interactive::{Decision, ThresholdConfirmationLoop, ThresholdPreview, DEFAULT_THRESHOLD},
    pipeline::{builder::MaskParams, MaskPipeline},
    traits::{MaskSource, ThresholdPrompt},
    types::{BackgroundPolarity, BinaryMask},
};

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

/// How masks are produced for a batch. Chosen once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Segmentation {
    /// Otsu threshold oriented by the background polarity
    Automatic {
        polarity: BackgroundPolarity,
        #[serde(default)]
        params: MaskParams,
    },
    /// Manual threshold confirmed by a reviewer
    Interactive {
        #[serde(default = "default_threshold")]
        initial_threshold: u8,
        /// Stop after this many rejected previews; unbounded when absent
        #[serde(default)]
        max_attempts: Option<usize>,
    },
}

impl Segmentation {
    /// Build the mask source for this mode. The prompt is only used by the
    /// interactive mode.
    pub fn into_source(self, prompt: Option<Box<dyn ThresholdPrompt>>) -> Box<dyn MaskSource> {
        match (self, prompt) {
            (Self::Automatic { polarity, params }, _) => {
                Box::new(AutomaticMaskSource::new(polarity, &params))
            }
            (Self::Interactive { initial_threshold, max_attempts }, Some(prompt)) => {
                Box::new(InteractiveMaskSource::new(prompt, initial_threshold, max_attempts))
            }
            (Self::Interactive { initial_threshold, max_attempts }, None) => {
                Box::new(InteractiveMaskSource::new(
                    Box::new(AcceptAll),
                    initial_threshold,
                    max_attempts,
                ))
            }
        }
    }
}

/// Automatic segmentation with a fixed polarity for the whole batch.
pub struct AutomaticMaskSource {
    pipeline: MaskPipeline,
}

impl AutomaticMaskSource {
    pub fn new(polarity: BackgroundPolarity, params: &MaskParams) -> Self {
        let pipeline = MaskPipeline::automatic(polarity, params);
        debug!(%polarity, ?params, "{}", pipeline.info());
        Self { pipeline }
    }
}

impl MaskSource for AutomaticMaskSource {
    fn produce_mask(&self, _image_id: &str, image: &DynamicImage) -> Result<BinaryMask> {
        self.pipeline.build_mask(image)
    }
}

/// Manual-threshold segmentation. Prompts are serialized through one lock,
/// so concurrent workers take turns with the reviewer.
pub struct InteractiveMaskSource {
    prompt: Mutex<Box<dyn ThresholdPrompt>>,
    initial_threshold: u8,
    max_attempts: Option<usize>,
}

impl InteractiveMaskSource {
    pub fn new(
        prompt: Box<dyn ThresholdPrompt>,
        initial_threshold: u8,
        max_attempts: Option<usize>,
    ) -> Self {
        Self {
            prompt: Mutex::new(prompt),
            initial_threshold,
            max_attempts,
        }
    }
}

impl MaskSource for InteractiveMaskSource {
    fn produce_mask(&self, image_id: &str, image: &DynamicImage) -> Result<BinaryMask> {
        let gray = image.to_luma8();
        // Recover the prompt if a previous reviewer call panicked
        let mut prompt = self.prompt.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ThresholdConfirmationLoop::new(Some(self.initial_threshold))
            .with_max_attempts(self.max_attempts)
            .run(image_id, &gray, prompt.as_mut())
    }
}

/// Reviewer that accepts every proposal unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ThresholdPrompt for AcceptAll {
    fn review(&mut self, _image_id: &str, _preview: &ThresholdPreview<'_>) -> Decision {
        Decision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_segmentation_from_json() {
        let auto: Segmentation = serde_json::from_str(r#"{"mode": "automatic", "polarity": "light"}"#).unwrap();
        assert_eq!(
            auto,
            Segmentation::Automatic { polarity: BackgroundPolarity::Light, params: MaskParams::default() }
        );

        let manual: Segmentation = serde_json::from_str(r#"{"mode": "interactive"}"#).unwrap();
        assert_eq!(
            manual,
            Segmentation::Interactive { initial_threshold: 15, max_attempts: None }
        );
    }

    #[test]
    fn test_interactive_source_without_prompt_accepts_default() {
        let mut image = GrayImage::from_pixel(60, 40, Luma([0]));
        for y in 10..30 {
            for x in 10..50 {
                image.put_pixel(x, y, Luma([90]));
            }
        }
        let source = Segmentation::Interactive { initial_threshold: 15, max_attempts: None }.into_source(None);
        let mask = source.produce_mask("x", &DynamicImage::ImageLuma8(image)).unwrap();
        assert_eq!(mask.object_pixel_count(), 40 * 20);
    }
}
