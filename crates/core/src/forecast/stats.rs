//! Small descriptive statistics shared by the forecasting models.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// `std / mean`, or `None` when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values);
    (m > f64::EPSILON).then(|| std_dev(values) / m)
}

/// Ordinary least squares fit of `y = intercept + slope * x` over `x = 0..n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn at(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }
}

/// Fits a line against the positional index. Returns `None` with fewer than
/// two points or when the result is not finite.
pub fn fit_line(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    if sxx <= f64::EPSILON {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 =
        values.iter().enumerate().map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2)).sum();
    // A flat series is fitted exactly by a flat line.
    let r_squared = if ss_tot <= f64::EPSILON { 1.0 } else { 1.0 - ss_res / ss_tot };

    let fit = LinearFit { intercept, slope, r_squared };
    (fit.intercept.is_finite() && fit.slope.is_finite() && fit.r_squared.is_finite()).then_some(fit)
}
