use tracing::debug;
use crate::{
    algorithms::extraction::largest_outline,
    error::{MeasureError, Result},
    types::{BinaryMask, ScanAxis, ThicknessProfile},
};

/// Scan the largest object of an aligned mask and convert its per-position
/// thickness to millimetres.
///
/// The object's bounding-box extent along `axis` is taken to be
/// `reference_length_mm` long. Every position inside the bounding box
/// contributes one sample: the number of object pixels across the box at
/// that position, times the mm-per-pixel scale.
pub fn thickness_profile(
    mask: &BinaryMask,
    reference_length_mm: f64,
    axis: ScanAxis,
) -> Result<ThicknessProfile> {
    if !(reference_length_mm.is_finite() && reference_length_mm > 0.0) {
        return Err(MeasureError::InvalidReferenceLength(reference_length_mm));
    }

    let outline = largest_outline(mask).ok_or(MeasureError::NoContourFound)?;
    let bbox = outline.bounding_box();
    if bbox.width == 0 || bbox.height == 0 {
        return Err(MeasureError::DegenerateBoundingBox {
            width: bbox.width,
            height: bbox.height,
        });
    }

    let (length_px, across_px) = match axis {
        ScanAxis::Horizontal => (bbox.width, bbox.height),
        ScanAxis::Vertical => (bbox.height, bbox.width),
    };
    let mm_per_pixel = reference_length_mm / length_px as f64;
    debug!(?bbox, length_px, mm_per_pixel, "Scanning thickness");

    let samples_mm = (0..length_px)
        .map(|along| {
            let count = (0..across_px)
                .filter(|&across| {
                    let (x, y) = match axis {
                        ScanAxis::Horizontal => (bbox.x + along, bbox.y + across),
                        ScanAxis::Vertical => (bbox.x + across, bbox.y + along),
                    };
                    x < mask.width() && y < mask.height() && mask.is_object(x, y)
                })
                .count();
            count as f64 * mm_per_pixel
        })
        .collect();

    Ok(ThicknessProfile {
        samples_mm,
        reference_length_mm,
        length_px,
        mm_per_pixel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> BinaryMask {
        let image = GrayImage::from_fn(width, height, |x, y| {
            if (x0..x0 + w).contains(&x) && (y0..y0 + h).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        BinaryMask::from_gray(image)
    }

    #[test]
    fn test_rectangle_profile_is_constant() {
        let mask = rect_mask(300, 120, 40, 30, 200, 25);
        let profile = thickness_profile(&mask, 200.0, ScanAxis::Horizontal).unwrap();

        assert_eq!(profile.length_px, 200);
        assert_eq!(profile.len(), 200);
        assert!((profile.pixels_per_mm() - 1.0).abs() < 1e-12);
        assert!(profile.samples_mm.iter().all(|&s| (s - 25.0).abs() < 1e-9));
    }

    #[test]
    fn test_scale_follows_reference_length() {
        let mask = rect_mask(300, 120, 40, 30, 200, 25);
        let profile = thickness_profile(&mask, 50.0, ScanAxis::Horizontal).unwrap();

        assert!((profile.mm_per_pixel - 0.25).abs() < 1e-12);
        assert!((profile.pixels_per_mm() - 4.0).abs() < 1e-12);
        assert!((profile.samples_mm[100] - 6.25).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_scan_counts_rows() {
        let mask = rect_mask(120, 300, 30, 40, 25, 200);
        let profile = thickness_profile(&mask, 200.0, ScanAxis::Vertical).unwrap();

        assert_eq!(profile.len(), 200);
        assert!(profile.samples_mm.iter().all(|&s| (s - 25.0).abs() < 1e-9));
    }

    #[test]
    fn test_profile_preserves_taper_order() {
        // Right triangle growing from 1 px at the left to 20 px at the right
        let image = GrayImage::from_fn(60, 40, |x, y| {
            let inside = (10..30).contains(&x) && y >= 30 - (x - 9).min(20) && y < 30;
            if inside { Luma([255]) } else { Luma([0]) }
        });
        let mask = BinaryMask::from_gray(image);
        let profile = thickness_profile(&mask, 20.0, ScanAxis::Horizontal).unwrap();

        assert_eq!(profile.len(), 20);
        assert_eq!(profile.samples_mm[0], 1.0);
        assert_eq!(profile.samples_mm[19], 20.0);
        assert!(profile.samples_mm.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_mask_has_no_contour() {
        let mask = BinaryMask::empty(20, 20);
        let err = thickness_profile(&mask, 10.0, ScanAxis::Horizontal).unwrap_err();
        assert!(matches!(err, MeasureError::NoContourFound));
    }

    #[test]
    fn test_rejects_non_positive_reference_length() {
        let mask = rect_mask(50, 50, 10, 10, 20, 5);
        let err = thickness_profile(&mask, 0.0, ScanAxis::Horizontal).unwrap_err();
        assert!(matches!(err, MeasureError::InvalidReferenceLength(_)));
    }
}
