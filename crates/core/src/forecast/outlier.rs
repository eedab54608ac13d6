//! IQR outlier trimming applied to every series before a model is fitted.

pub const DEFAULT_IQR_FACTOR: f64 = 1.5;

/// Minimum series length for which quartiles are estimated.
const MIN_POINTS: usize = 4;

/// Returns the values inside `[Q1 - factor*IQR, Q3 + factor*IQR]`, in their
/// original order. Series shorter than four points are returned unchanged.
///
/// Quartiles are read by position from the sorted copy (`sorted[n/4]` and
/// `sorted[3n/4]`), which keeps the filter stable on the very short series
/// typical of seasonal retail history.
pub fn remove_outliers(values: &[f64], factor: f64) -> Vec<f64> {
    if values.len() < MIN_POINTS {
        return values.to_vec();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[(3 * n) / 4];
    let iqr = q3 - q1;
    let lower = q1 - factor * iqr;
    let upper = q3 + factor * iqr;

    values.iter().copied().filter(|value| *value >= lower && *value <= upper).collect()
}
