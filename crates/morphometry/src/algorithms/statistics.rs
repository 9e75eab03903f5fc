use crate::{
    error::{MeasureError, Result},
    types::{ExpectedWidths, MeasurementResult, ThicknessProfile},
};

/// Drop samples below the expected minimum width.
///
/// A zero (or negative) minimum keeps every sample, including zero-width
/// positions at tapered ends.
pub fn filter_samples(samples_mm: &[f64], expected_min_mm: f64) -> Vec<f64> {
    if expected_min_mm > 0.0 {
        samples_mm.iter().copied().filter(|&s| s >= expected_min_mm).collect()
    } else {
        samples_mm.to_vec()
    }
}

/// Coefficient of variation in percent.
///
/// Defined as 0 when the mean is 0 rather than NaN, so an all-zero profile
/// still yields a finite record.
pub fn coefficient_of_variation(mean: f64, std_dev: f64) -> f64 {
    if mean == 0.0 {
        0.0
    } else {
        100.0 * std_dev / mean
    }
}

/// Reduce a thickness profile to summary statistics and compare them with the
/// expected bounds.
pub fn summarize(
    image_id: &str,
    profile: &ThicknessProfile,
    expected: ExpectedWidths,
) -> Result<MeasurementResult> {
    let samples = filter_samples(&profile.samples_mm, expected.min_mm);
    if samples.is_empty() {
        return Err(MeasureError::NoValidSamples { expected_min_mm: expected.min_mm });
    }

    let n = samples.len() as f64;
    let min_width = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max_width = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_width = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean_width).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    Ok(MeasurementResult {
        image_id: image_id.to_string(),
        min_width,
        max_width,
        mean_width,
        width_ratio: mean_width / profile.reference_length_mm,
        coefficient_of_variation: coefficient_of_variation(mean_width, std_dev),
        expected_min_width: expected.min_mm,
        expected_max_width: expected.max_mm,
        min_width_error: (min_width - expected.min_mm).abs(),
        max_width_error: (max_width - expected.max_mm).abs(),
    })
}
