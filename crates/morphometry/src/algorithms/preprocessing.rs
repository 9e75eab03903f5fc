use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use tracing::debug;
use crate::{error::Result, traits::ImagePreprocessor, types::BackgroundPolarity};

/// Contrast-limited adaptive histogram equalization.
///
/// Equalizes each tile of a `tiles x tiles` grid separately, clipping the
/// tile histograms at `clip_limit` times the mean bin height, and blends the
/// four nearest tile mappings bilinearly.
#[derive(Debug, Clone)]
pub struct ClahePreprocessor {
    pub clip_limit: f32,
    pub tiles: u32,
}

impl Default for ClahePreprocessor {
    fn default() -> Self {
        Self { clip_limit: 2.0, tiles: 8 }
    }
}

impl ClahePreprocessor {
    fn tile_mapping(&self, image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> [u8; 256] {
        let tile_pixels = ((x1 - x0) * (y1 - y0)) as f32;

        let mut hist = [0u32; 256];
        for y in y0..y1 {
            for x in x0..x1 {
                hist[image.get_pixel(x, y)[0] as usize] += 1;
            }
        }

        // Clip and redistribute the excess evenly
        let clip = ((self.clip_limit * tile_pixels / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }
        let per_bin = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += per_bin;
            if i < remainder {
                *bin += 1;
            }
        }

        let mut cdf = [0u32; 256];
        let mut running = 0u32;
        for (i, &count) in hist.iter().enumerate() {
            running += count;
            cdf[i] = running;
        }
        let cdf_min = cdf.iter().copied().find(|&v| v > 0).unwrap_or(0);
        let denom = cdf[255].saturating_sub(cdf_min);

        let mut mapping = [0u8; 256];
        for (i, value) in mapping.iter_mut().enumerate() {
            *value = if denom == 0 {
                i as u8
            } else {
                let scaled = cdf[i].saturating_sub(cdf_min) as f32 / denom as f32 * 255.0;
                scaled.round().min(255.0) as u8
            };
        }
        mapping
    }
}

impl ImagePreprocessor for ClahePreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        let (width, height) = image.dimensions();
        let tiles = self.tiles.max(1);
        let tile_w = width / tiles;
        let tile_h = height / tiles;
        if tile_w == 0 || tile_h == 0 {
            return Ok(image.clone());
        }

        let mut maps = Vec::with_capacity((tiles * tiles) as usize);
        for ty in 0..tiles {
            for tx in 0..tiles {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = if tx == tiles - 1 { width } else { x0 + tile_w };
                let y1 = if ty == tiles - 1 { height } else { y0 + tile_h };
                maps.push(self.tile_mapping(image, x0, y0, x1, y1));
            }
        }

        let last = tiles as i64 - 1;
        let clamp = |v: i64| v.clamp(0, last) as usize;
        let mut output = GrayImage::new(width, height);

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let value = image.get_pixel(x, y)[0] as usize;

            let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
            let tx0 = clamp(fx.floor() as i64);
            let tx1 = clamp(fx.floor() as i64 + 1);
            let ty0 = clamp(fy.floor() as i64);
            let ty1 = clamp(fy.floor() as i64 + 1);
            let ax = fx - fx.floor();
            let ay = fy - fy.floor();

            let row = tiles as usize;
            let v00 = maps[ty0 * row + tx0][value] as f32;
            let v10 = maps[ty0 * row + tx1][value] as f32;
            let v01 = maps[ty1 * row + tx0][value] as f32;
            let v11 = maps[ty1 * row + tx1][value] as f32;

            let top = v00 + (v10 - v00) * ax;
            let bottom = v01 + (v11 - v01) * ax;
            let blended = top + (bottom - top) * ay;
            *pixel = Luma([blended.round().clamp(0.0, 255.0) as u8]);
        }

        Ok(output)
    }
}

/// Gaussian blur preprocessor for noise reduction
#[derive(Debug, Clone)]
pub struct GaussianBlurPreprocessor {
    pub sigma: f32,
}

impl Default for GaussianBlurPreprocessor {
    fn default() -> Self {
        // Sigma a 5x5 kernel implies when no sigma is given
        Self { sigma: 1.1 }
    }
}

impl ImagePreprocessor for GaussianBlurPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.sigma <= 0.0 {
            return Ok(image.clone());
        }
        Ok(imageproc::filter::gaussian_blur_f32(image, self.sigma))
    }
}

/// Otsu threshold whose direction follows the background polarity.
///
/// Black background: object = intensity > level.
/// Light background: object = intensity <= level.
#[derive(Debug, Clone)]
pub struct OtsuThresholdPreprocessor {
    pub polarity: BackgroundPolarity,
}

impl ImagePreprocessor for OtsuThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        let level = imageproc::contrast::otsu_level(image);
        debug!(level, polarity = %self.polarity, "Otsu threshold selected");

        let mut binary = imageproc::contrast::threshold(image, level);
        if self.polarity == BackgroundPolarity::Light {
            image::imageops::invert(&mut binary);
        }
        Ok(binary)
    }
}

/// Fixed-level thresholding preprocessor (object = intensity > threshold)
#[derive(Debug, Clone)]
pub struct ThresholdPreprocessor {
    pub threshold: u8,
}

impl Default for ThresholdPreprocessor {
    fn default() -> Self {
        Self { threshold: 15 }
    }
}

impl ImagePreprocessor for ThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::contrast::threshold(image, self.threshold))
    }
}

/// Morphological opening with a 3x3 square, repeated `iterations` times
/// (all erosions, then all dilations). Removes isolated speckle.
#[derive(Debug, Clone)]
pub struct OpeningPreprocessor {
    pub iterations: u8,
}

impl Default for OpeningPreprocessor {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

impl ImagePreprocessor for OpeningPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.iterations == 0 {
            return Ok(image.clone());
        }
        Ok(imageproc::morphology::open(image, Norm::LInf, self.iterations))
    }
}

/// Morphological closing with a 3x3 square, repeated `iterations` times
/// (all dilations, then all erosions). Fills small internal gaps.
#[derive(Debug, Clone)]
pub struct ClosingPreprocessor {
    pub iterations: u8,
}

impl Default for ClosingPreprocessor {
    fn default() -> Self {
        Self { iterations: 2 }
    }
}

impl ImagePreprocessor for ClosingPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.iterations == 0 {
            return Ok(image.clone());
        }
        Ok(imageproc::morphology::close(image, Norm::LInf, self.iterations))
    }
}
