use image::{imageops, GrayImage};
use imageproc::{
    contours::{find_contours, BorderType},
    point::Point,
};
use crate::types::{BinaryMask, Outline};

/// All outermost object boundaries of a mask, in scan order.
///
/// Holes and objects nested inside holes are not reported. Objects touching
/// the image border are traced like any other.
pub fn external_outlines(mask: &BinaryMask) -> Vec<Outline> {
    // The tracer only opens an outer border after a background pixel, so
    // surround the mask with one
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut padded, mask.as_image(), 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| Outline {
            points: contour.points.iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect(),
        })
        .collect()
}

/// The external boundary enclosing the largest area.
///
/// Largest contour wins; on equal area the one found first in scan order is kept.
pub fn largest_outline(mask: &BinaryMask) -> Option<Outline> {
    let mut best: Option<(f64, Outline)> = None;
    for outline in external_outlines(mask) {
        let area = outline.area();
        match &best {
            Some((best_area, _)) if area <= *best_area => {}
            _ => best = Some((area, outline)),
        }
    }
    best.map(|(_, outline)| outline)
}
