use geo::MinimumRotatedRect;
use geo_types::{Coord, LineString};
use image::{imageops, Luma};
use imageproc::geometric_transformations::{rotate, Interpolation};
use tracing::debug;
use crate::{
    algorithms::extraction::largest_outline,
    types::{BinaryMask, Outline, RotatedRect, ScanAxis, BACKGROUND},
};

/// Rotations smaller than this are treated as already aligned.
const ALIGNED_EPSILON_DEG: f64 = 1e-3;

/// Minimum-area bounding rectangle of an outline, or `None` when the outline
/// has no area to bound.
pub fn min_area_rect(outline: &Outline) -> Option<RotatedRect> {
    let coords: Vec<Coord<f64>> = outline.points
        .iter()
        .map(|p| Coord { x: p.x as f64, y: p.y as f64 })
        .collect();
    let polygon = LineString::new(coords).minimum_rotated_rect()?;

    let corners: Vec<Coord<f64>> = polygon.exterior().coords().take(4).copied().collect();
    if corners.len() < 4 {
        return None;
    }

    let edge = |a: Coord<f64>, b: Coord<f64>| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
    let width = edge(corners[0], corners[1]);
    let height = edge(corners[1], corners[2]);
    let angle_deg = (corners[1].y - corners[0].y)
        .atan2(corners[1].x - corners[0].x)
        .to_degrees();

    let cx = corners.iter().map(|c| c.x).sum::<f64>() / 4.0;
    let cy = corners.iter().map(|c| c.y).sum::<f64>() / 4.0;

    Some(RotatedRect {
        center: (cx as f32, cy as f32),
        width,
        height,
        angle_deg,
    })
}

/// Bounding rectangle of the largest object in the mask.
pub fn principal_rect(mask: &BinaryMask) -> Option<RotatedRect> {
    largest_outline(mask).as_ref().and_then(min_area_rect)
}

/// Angle of the largest object's long axis, in (-90, 90] degrees.
pub fn principal_axis_angle(mask: &BinaryMask) -> Option<f64> {
    principal_rect(mask).map(|rect| rect.long_axis_angle())
}

/// Rotate the mask about the largest object's bounding-rectangle center so
/// the object's long axis is horizontal.
///
/// Nearest-neighbour resampling keeps the mask two-valued and uncovered
/// border area is filled with background. A mask without any object comes
/// back unchanged, so callers must detect that case themselves.
pub fn align_horizontal(mask: &BinaryMask) -> BinaryMask {
    let Some(rect) = principal_rect(mask) else {
        return mask.clone();
    };

    let angle = rect.long_axis_angle();
    debug!(
        angle,
        width = rect.width,
        height = rect.height,
        center_x = rect.center.0,
        center_y = rect.center.1,
        "Aligning long axis"
    );

    if angle.abs() < ALIGNED_EPSILON_DEG {
        return mask.clone();
    }

    let rotated = rotate(
        mask.as_image(),
        rect.center,
        (-angle).to_radians() as f32,
        Interpolation::Nearest,
        Luma([BACKGROUND]),
    );
    BinaryMask::from_gray(rotated)
}

/// Align the largest object's long axis with `axis`.
///
/// Horizontal is [`align_horizontal`]; vertical turns that result a further
/// quarter turn so the length runs along y.
pub fn align_to_axis(mask: &BinaryMask, axis: ScanAxis) -> BinaryMask {
    let aligned = align_horizontal(mask);
    match axis {
        ScanAxis::Horizontal => aligned,
        ScanAxis::Vertical => BinaryMask::from_gray(imageops::rotate90(aligned.as_image())),
    }
}
