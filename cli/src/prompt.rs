use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use morphometry::{batch::runner::open_image, render_preview, Decision, ThresholdPreview, ThresholdPrompt};
use tracing::{info, warn};

/// A reviewer answer as typed on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Threshold(u8),
    Quit,
}

/// Parse `y`, `n`, `q` or a threshold between 0 and 255
pub fn parse_answer(line: &str) -> Option<Answer> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Answer::Yes),
        "n" | "no" => Some(Answer::No),
        "q" | "quit" => Some(Answer::Quit),
        other => other.parse::<u8>().ok().map(Answer::Threshold),
    }
}

/// Console reviewer for manual thresholds.
///
/// Saves each preview as `<preview_dir>/<ID>_t<threshold>.png` and asks on
/// stdout/stdin whether the outline looks right.
pub struct StdinPrompt {
    image_dir: PathBuf,
    preview_dir: PathBuf,
    input: Box<dyn BufRead + Send>,
    cached: Option<(String, DynamicImage)>,
}

impl StdinPrompt {
    pub fn new(image_dir: impl Into<PathBuf>, preview_dir: impl Into<PathBuf>) -> Self {
        Self::with_input(image_dir, preview_dir, Box::new(BufReader::new(io::stdin())))
    }

    pub fn with_input(
        image_dir: impl Into<PathBuf>,
        preview_dir: impl Into<PathBuf>,
        input: Box<dyn BufRead + Send>,
    ) -> Self {
        Self {
            image_dir: image_dir.into(),
            preview_dir: preview_dir.into(),
            input,
            cached: None,
        }
    }

    fn read_answer(&mut self, question: &str) -> Option<Answer> {
        loop {
            print!("{question} ");
            if let Err(e) = io::stdout().flush() {
                warn!("Failed to flush prompt: {e}");
            }

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => match parse_answer(&line) {
                    Some(answer) => return Some(answer),
                    None => println!("Please answer y, n, q or a threshold (0-255)."),
                },
                Err(e) => {
                    warn!("Failed to read answer: {e}");
                    return None;
                }
            }
        }
    }

    fn photo(&mut self, image_id: &str) -> Option<&DynamicImage> {
        let stale = self.cached.as_ref().is_none_or(|(id, _)| id != image_id);
        if stale {
            match open_image(&self.image_dir.join(image_id)) {
                Ok(image) => self.cached = Some((image_id.to_string(), image)),
                Err(e) => {
                    warn!("Cannot render preview: {e}");
                    self.cached = None;
                }
            }
        }
        self.cached.as_ref().map(|(_, image)| image)
    }

    /// Render the outline over the photo and save it; returns the saved path
    fn save_preview(&mut self, image_id: &str, preview: &ThresholdPreview<'_>) -> Option<PathBuf> {
        let path = preview_path(&self.preview_dir, image_id, preview.threshold);
        let photo = self.photo(image_id)?;
        let canvas = render_preview(photo, preview);
        match canvas.save(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to save preview {}: {e}", path.display());
                None
            }
        }
    }
}

/// `<dir>/<ID stem>_t<threshold>.png`
pub fn preview_path(dir: &Path, image_id: &str, threshold: u8) -> PathBuf {
    let stem = Path::new(image_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_id.to_string());
    dir.join(format!("{stem}_t{threshold}.png"))
}

impl ThresholdPrompt for StdinPrompt {
    fn review(&mut self, image_id: &str, preview: &ThresholdPreview<'_>) -> Decision {
        match self.save_preview(image_id, preview) {
            Some(path) => info!("Preview saved to {}", path.display()),
            None => warn!("{image_id}: no preview available for threshold {}", preview.threshold),
        }
        println!(
            "{image_id}: threshold {} gives an outline of {} points ({} object pixels)",
            preview.threshold,
            preview.outline.points.len(),
            preview.mask.object_pixel_count(),
        );

        match self.read_answer("Accept this outline? [y/n/q or new threshold]") {
            Some(Answer::Yes) => Decision::Accept,
            Some(Answer::Threshold(t)) => Decision::Retry(t),
            Some(Answer::No) => match self.read_answer("New threshold (0-255):") {
                Some(Answer::Threshold(t)) => Decision::Retry(t),
                Some(Answer::Yes) => Decision::Accept,
                Some(Answer::No) => Decision::Retry(preview.threshold),
                Some(Answer::Quit) | None => Decision::Abandon,
            },
            Some(Answer::Quit) | None => Decision::Abandon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use morphometry::{largest_outline, MaskPipelineBuilder};
    use std::io::Cursor;

    fn bar() -> GrayImage {
        let mut image = GrayImage::from_pixel(80, 40, Luma([0]));
        for y in 15..25 {
            for x in 10..70 {
                image.put_pixel(x, y, Luma([200]));
            }
        }
        image
    }

    fn review_with(answers: &str, image_dir: &Path) -> Decision {
        let mask = MaskPipelineBuilder::build_manual(20).process(&bar()).unwrap();
        let outline = largest_outline(&mask).unwrap();
        let preview = ThresholdPreview { threshold: 20, mask: &mask, outline: &outline };
        let input = Box::new(Cursor::new(answers.to_string().into_bytes()));
        StdinPrompt::with_input(image_dir, image_dir.join("previews"), input).review("bar.png", &preview)
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer(" Y \n"), Some(Answer::Yes));
        assert_eq!(parse_answer("n"), Some(Answer::No));
        assert_eq!(parse_answer("q"), Some(Answer::Quit));
        assert_eq!(parse_answer("42"), Some(Answer::Threshold(42)));
        assert_eq!(parse_answer("300"), None);
        assert_eq!(parse_answer("maybe"), None);
    }

    #[test]
    fn test_review_decisions() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(review_with("y\n", dir.path()), Decision::Accept);
        assert_eq!(review_with("35\n", dir.path()), Decision::Retry(35));
        assert_eq!(review_with("what\nn\n60\n", dir.path()), Decision::Retry(60));
        assert_eq!(review_with("q\n", dir.path()), Decision::Abandon);
        assert_eq!(review_with("", dir.path()), Decision::Abandon);
    }

    #[test]
    fn test_preview_is_always_saved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("previews")).unwrap();
        DynamicImage::ImageLuma8(bar()).save(dir.path().join("bar.png")).unwrap();

        let decision = review_with("y\n", dir.path());
        assert_eq!(decision, Decision::Accept);
        assert!(dir.path().join("previews").join("bar_t20.png").is_file());
    }

    #[test]
    fn test_preview_path_uses_id_stem() {
        let path = preview_path(Path::new("out"), "fish/perch.jpg", 42);
        assert_eq!(path, Path::new("out").join("perch_t42.png"));
    }
}
