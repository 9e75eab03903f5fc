use geo_types::{Coord, LineString, Polygon};
use image::{GrayImage, Luma};
use imageproc::point::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Pixel value marking object pixels in a [`BinaryMask`].
pub const OBJECT: u8 = 255;
/// Pixel value marking background pixels in a [`BinaryMask`].
pub const BACKGROUND: u8 = 0;

/// Which side of the intensity range the background sits on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BackgroundPolarity {
    /// Dark background, lighter object
    Black,
    /// White / light background, darker object
    Light,
}

/// Axis the object's length is measured along after alignment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ScanAxis {
    /// Length runs along x, thickness is counted per column
    #[default]
    Horizontal,
    /// Length runs along y, thickness is counted per row
    Vertical,
}

/// Two-valued object/background image.
///
/// Every pixel is either [`OBJECT`] or [`BACKGROUND`]. A mask is never edited
/// after construction; stages that transform it build a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// Binarize a grayscale image: any non-zero pixel becomes an object pixel.
    pub fn from_gray(image: GrayImage) -> Self {
        let mut image = image;
        for pixel in image.pixels_mut() {
            *pixel = if pixel[0] > 0 { Luma([OBJECT]) } else { Luma([BACKGROUND]) };
        }
        Self { image }
    }

    /// An all-background mask of the given size.
    pub fn empty(width: u32, height: u32) -> Self {
        Self { image: GrayImage::from_pixel(width, height, Luma([BACKGROUND])) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_object(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == OBJECT
    }

    pub fn object_pixel_count(&self) -> usize {
        self.image.pixels().filter(|p| p[0] == OBJECT).count()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// External boundary of one object silhouette, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub points: Vec<Point<i32>>,
}

impl Outline {
    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.points
            .iter()
            .map(|p| Coord { x: p.x as f64, y: p.y as f64 })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Area enclosed by the boundary polygon
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Tight axis-aligned bounding box, inclusive of the boundary pixels
    pub fn bounding_box(&self) -> PixelBox {
        if self.points.is_empty() {
            return PixelBox { x: 0, y: 0, width: 0, height: 0 };
        }

        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;

        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        PixelBox {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        }
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Minimum-area bounding rectangle of an outline.
///
/// `width` is the edge running from the first to the second corner and
/// `angle_deg` is that edge's direction in image coordinates (y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f32, f32),
    pub width: f64,
    pub height: f64,
    pub angle_deg: f64,
}

impl RotatedRect {
    /// Direction of the longer side, normalized to (-90, 90] degrees.
    pub fn long_axis_angle(&self) -> f64 {
        let angle = if self.width < self.height {
            self.angle_deg + 90.0
        } else {
            self.angle_deg
        };
        normalize_axis_angle(angle)
    }
}

/// Fold an undirected axis angle into (-90, 90].
pub fn normalize_axis_angle(angle_deg: f64) -> f64 {
    let mut angle = angle_deg % 180.0;
    if angle > 90.0 {
        angle -= 180.0;
    } else if angle <= -90.0 {
        angle += 180.0;
    }
    angle
}

/// Thickness samples along the aligned object's long axis, in millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct ThicknessProfile {
    /// One sample per scanned position, ordered along the length axis
    pub samples_mm: Vec<f64>,
    /// Physical length the scan was calibrated against
    pub reference_length_mm: f64,
    /// Object extent along the length axis
    pub length_px: u32,
    pub mm_per_pixel: f64,
}

impl ThicknessProfile {
    pub fn pixels_per_mm(&self) -> f64 {
        1.0 / self.mm_per_pixel
    }

    pub fn len(&self) -> usize {
        self.samples_mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_mm.is_empty()
    }
}

/// Expected width bounds supplied with each batch row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExpectedWidths {
    /// Lower bound; also the sample filter when non-zero
    pub min_mm: f64,
    /// Upper bound, compared against only
    pub max_mm: f64,
}

/// Summary of one successfully measured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    #[serde(rename = "ID")]
    pub image_id: String,
    #[serde(rename = "Min Width (mm)")]
    pub min_width: f64,
    #[serde(rename = "Max Width (mm)")]
    pub max_width: f64,
    #[serde(rename = "Mean Width (mm)")]
    pub mean_width: f64,
    #[serde(rename = "Width Ratio")]
    pub width_ratio: f64,
    #[serde(rename = "Coefficient of Variation (%)")]
    pub coefficient_of_variation: f64,
    #[serde(rename = "Expected Min Width (mm)")]
    pub expected_min_width: f64,
    #[serde(rename = "Expected Max Width (mm)")]
    pub expected_max_width: f64,
    #[serde(rename = "Min Width Error (mm)")]
    pub min_width_error: f64,
    #[serde(rename = "Max Width Error (mm)")]
    pub max_width_error: f64,
}
