//! Manual-threshold segmentation confirmed by a reviewer.
//!
//! The loop moves through `Proposed -> PreviewRendered -> {Accepted, Rejected}`,
//! and `Rejected` goes back to `Proposed` with the reviewer's next threshold.
//! Rendering and prompting live behind [`ThresholdPrompt`]; the loop only
//! decides what happens next.

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::{debug, info};
use crate::{
    algorithms::largest_outline,
    error::{MeasureError, Result},
    pipeline::builder::MaskPipelineBuilder,
    traits::ThresholdPrompt,
    types::{BinaryMask, Outline},
};

/// Threshold proposed when the caller supplies none.
pub const DEFAULT_THRESHOLD: u8 = 15;

/// Reviewer verdict on one preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    /// Reject and try again at this threshold
    Retry(u8),
    /// Give up on this image
    Abandon,
}

/// What the reviewer is shown for a proposal.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPreview<'a> {
    pub threshold: u8,
    pub mask: &'a BinaryMask,
    /// Largest external boundary of `mask`
    pub outline: &'a Outline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Proposed { threshold: u8 },
    PreviewRendered { threshold: u8, mask: BinaryMask, outline: Outline },
    Rejected { next_threshold: u8 },
    Accepted { threshold: u8, mask: BinaryMask },
    Abandoned { threshold: u8 },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Abandoned { .. })
    }
}

/// State machine for one image's manual threshold confirmation.
///
/// Retries are unbounded unless [`with_max_attempts`](Self::with_max_attempts)
/// is set; an automated reviewer must supply its own limit.
#[derive(Debug, Clone)]
pub struct ThresholdConfirmationLoop {
    state: LoopState,
    attempts: usize,
    max_attempts: Option<usize>,
}

impl ThresholdConfirmationLoop {
    pub fn new(initial_threshold: Option<u8>) -> Self {
        Self {
            state: LoopState::Proposed {
                threshold: initial_threshold.unwrap_or(DEFAULT_THRESHOLD),
            },
            attempts: 0,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Number of previews shown so far
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Advance by exactly one transition. Terminal states do not move.
    pub fn step(
        &mut self,
        image_id: &str,
        image: &GrayImage,
        prompt: &mut dyn ThresholdPrompt,
    ) -> Result<()> {
        let next = match &self.state {
            LoopState::Proposed { threshold } => {
                let threshold = *threshold;
                let mask = MaskPipelineBuilder::build_manual(threshold).process(image)?;
                // Nothing to preview: give up on the image instead of looping
                let outline = largest_outline(&mask).ok_or(MeasureError::NoContourFound)?;
                self.attempts += 1;
                debug!(image_id, threshold, attempt = self.attempts, "Preview rendered");
                LoopState::PreviewRendered { threshold, mask, outline }
            }
            LoopState::PreviewRendered { threshold, mask, outline } => {
                let preview = ThresholdPreview { threshold: *threshold, mask, outline };
                match prompt.review(image_id, &preview) {
                    Decision::Accept => LoopState::Accepted {
                        threshold: *threshold,
                        mask: mask.clone(),
                    },
                    Decision::Retry(next_threshold) => LoopState::Rejected { next_threshold },
                    Decision::Abandon => LoopState::Abandoned { threshold: *threshold },
                }
            }
            LoopState::Rejected { next_threshold } => {
                if let Some(limit) = self.max_attempts {
                    if self.attempts >= limit {
                        return Err(MeasureError::ThresholdAttemptsExhausted { attempts: self.attempts });
                    }
                }
                LoopState::Proposed { threshold: *next_threshold }
            }
            LoopState::Accepted { .. } | LoopState::Abandoned { .. } => return Ok(()),
        };
        self.state = next;
        Ok(())
    }

    /// Step until the reviewer accepts or abandons.
    pub fn run(
        mut self,
        image_id: &str,
        image: &GrayImage,
        prompt: &mut dyn ThresholdPrompt,
    ) -> Result<BinaryMask> {
        loop {
            match &self.state {
                LoopState::Accepted { threshold, mask } => {
                    info!(image_id, threshold, attempts = self.attempts, "Threshold accepted");
                    return Ok(mask.clone());
                }
                LoopState::Abandoned { threshold } => {
                    return Err(MeasureError::ThresholdAbandoned { threshold: *threshold });
                }
                _ => self.step(image_id, image, prompt)?,
            }
        }
    }
}

/// Propose `threshold` (or the default) and loop until the reviewer accepts.
pub fn confirm(
    image_id: &str,
    image: &DynamicImage,
    threshold: Option<u8>,
    prompt: &mut dyn ThresholdPrompt,
) -> Result<BinaryMask> {
    ThresholdConfirmationLoop::new(threshold).run(image_id, &image.to_luma8(), prompt)
}

/// Draw the preview outline over the photograph.
pub fn render_preview(image: &DynamicImage, preview: &ThresholdPreview<'_>) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let points = &preview.outline.points;
    let color = Rgb([0, 255, 0]);
    for i in 0..points.len() {
        let p1 = points[i];
        let p2 = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            &mut canvas,
            (p1.x as f32, p1.y as f32),
            (p2.x as f32, p2.y as f32),
            color,
        );
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
    use std::collections::VecDeque;

    /// Replays a fixed list of decisions and records what it was shown.
    struct Scripted {
        decisions: VecDeque<Decision>,
        seen: Vec<u8>,
    }

    impl Scripted {
        fn new(decisions: &[Decision]) -> Self {
            Self { decisions: decisions.iter().copied().collect(), seen: Vec::new() }
        }
    }

    impl ThresholdPrompt for Scripted {
        fn review(&mut self, _image_id: &str, preview: &ThresholdPreview<'_>) -> Decision {
            self.seen.push(preview.threshold);
            self.decisions.pop_front().unwrap_or(Decision::Abandon)
        }
    }

    fn bright_bar() -> GrayImage {
        let mut image = GrayImage::from_pixel(120, 60, Luma([5]));
        draw_filled_rect_mut(&mut image, Rect::at(20, 20).of_size(80, 20), Luma([120]));
        image
    }

    #[test]
    fn test_accept_first_proposal() {
        let mut prompt = Scripted::new(&[Decision::Accept]);
        let mask = ThresholdConfirmationLoop::new(None)
            .run("a", &bright_bar(), &mut prompt)
            .unwrap();

        assert_eq!(prompt.seen, vec![DEFAULT_THRESHOLD]);
        assert!(mask.is_object(50, 30));
        assert!(!mask.is_object(5, 5));
    }

    #[test]
    fn test_retry_into_empty_threshold_stops() {
        let mut prompt = Scripted::new(&[Decision::Retry(200), Decision::Retry(60), Decision::Accept]);
        let image = bright_bar();
        let mut state_machine = ThresholdConfirmationLoop::new(Some(2));

        // Threshold 200 leaves nothing to preview: the loop stops instead of spinning
        let err = loop {
            match state_machine.step("b", &image, &mut prompt) {
                Ok(()) => assert!(!state_machine.state().is_terminal()),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, MeasureError::NoContourFound));
        assert_eq!(prompt.seen, vec![2]);
        assert_eq!(state_machine.attempts(), 1);
    }

    #[test]
    fn test_state_transitions() {
        let mut prompt = Scripted::new(&[Decision::Retry(60), Decision::Accept]);
        let image = bright_bar();
        let mut state_machine = ThresholdConfirmationLoop::new(Some(30));

        assert!(matches!(state_machine.state(), LoopState::Proposed { threshold: 30 }));
        state_machine.step("c", &image, &mut prompt).unwrap();
        assert!(matches!(state_machine.state(), LoopState::PreviewRendered { threshold: 30, .. }));
        state_machine.step("c", &image, &mut prompt).unwrap();
        assert!(matches!(state_machine.state(), LoopState::Rejected { next_threshold: 60 }));
        state_machine.step("c", &image, &mut prompt).unwrap();
        assert!(matches!(state_machine.state(), LoopState::Proposed { threshold: 60 }));
        state_machine.step("c", &image, &mut prompt).unwrap();
        state_machine.step("c", &image, &mut prompt).unwrap();
        assert!(matches!(state_machine.state(), LoopState::Accepted { threshold: 60, .. }));

        // Terminal states stay put
        state_machine.step("c", &image, &mut prompt).unwrap();
        assert!(state_machine.state().is_terminal());
        assert_eq!(prompt.seen, vec![30, 60]);
    }

    #[test]
    fn test_abandon_is_reported() {
        let mut prompt = Scripted::new(&[Decision::Abandon]);
        let err = ThresholdConfirmationLoop::new(None)
            .run("d", &bright_bar(), &mut prompt)
            .unwrap_err();
        assert!(matches!(err, MeasureError::ThresholdAbandoned { threshold: DEFAULT_THRESHOLD }));
    }

    #[test]
    fn test_no_contour_is_unrecoverable() {
        let mut prompt = Scripted::new(&[Decision::Accept]);
        let image = GrayImage::from_pixel(40, 40, Luma([3]));
        let err = ThresholdConfirmationLoop::new(None)
            .run("e", &image, &mut prompt)
            .unwrap_err();
        assert!(matches!(err, MeasureError::NoContourFound));
        assert!(prompt.seen.is_empty());
    }

    #[test]
    fn test_attempt_limit_stops_automated_reviewer() {
        let mut prompt = Scripted::new(&[Decision::Retry(20); 10]);
        let err = ThresholdConfirmationLoop::new(None)
            .with_max_attempts(Some(3))
            .run("f", &bright_bar(), &mut prompt)
            .unwrap_err();
        assert!(matches!(err, MeasureError::ThresholdAttemptsExhausted { attempts: 3 }));
        assert_eq!(prompt.seen.len(), 3);
    }

    #[test]
    fn test_confirm_returns_accepted_mask() {
        // Left half of the bar only clears the first threshold
        let mut image = bright_bar();
        draw_filled_rect_mut(&mut image, Rect::at(20, 20).of_size(40, 20), Luma([40]));
        let image = DynamicImage::ImageLuma8(image);
        let mut prompt = Scripted::new(&[Decision::Retry(80), Decision::Accept]);

        let mask = confirm("g", &image, Some(30), &mut prompt).unwrap();
        assert_eq!(prompt.seen, vec![30, 80]);
        assert_eq!(mask.object_pixel_count(), 40 * 20);
        assert!(mask.is_object(80, 30));
        assert!(!mask.is_object(30, 30));
    }

    #[test]
    fn test_confirm_defaults_to_threshold_15() {
        let mut image = GrayImage::from_pixel(60, 30, Luma([0]));
        draw_filled_rect_mut(&mut image, Rect::at(10, 10).of_size(20, 10), Luma([15]));
        draw_filled_rect_mut(&mut image, Rect::at(35, 10).of_size(20, 10), Luma([16]));
        let mut prompt = Scripted::new(&[Decision::Accept]);

        let mask = confirm("h", &DynamicImage::ImageLuma8(image), None, &mut prompt).unwrap();
        assert_eq!(prompt.seen, vec![DEFAULT_THRESHOLD]);
        assert!(!mask.is_object(20, 15));
        assert!(mask.is_object(45, 15));
    }

    #[test]
    fn test_render_preview_draws_outline() {
        let image = DynamicImage::ImageLuma8(bright_bar());
        let mask = MaskPipelineBuilder::build_manual(DEFAULT_THRESHOLD)
            .build_mask(&image)
            .unwrap();
        let outline = largest_outline(&mask).unwrap();
        let preview = ThresholdPreview { threshold: DEFAULT_THRESHOLD, mask: &mask, outline: &outline };

        let canvas = render_preview(&image, &preview);
        assert_eq!(canvas.dimensions(), (120, 60));
        assert_eq!(*canvas.get_pixel(20, 20), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(60, 30), Rgb([120, 120, 120]));
    }
}
