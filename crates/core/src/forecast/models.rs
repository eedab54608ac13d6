//! Statistical demand models.
//!
//! Every model sees the seasonal history of one product as a chronological
//! slice of units, trims outliers from the values, and produces a one-step
//! ahead prediction with a 0..=100 confidence. Dispatch goes through
//! [`ModelKind::fit`]; each variant reports its fitted parameters through
//! [`FittedModel`].
//!
//! None of the models can fail: a degenerate fit degrades to the mean of
//! the cleaned series with an explicit, reduced confidence.

use serde::{Deserialize, Serialize};

use crate::domain::forecast::TrendDirection;
use crate::forecast::outlier::{remove_outliers, DEFAULT_IQR_FACTOR};
use crate::forecast::stats::{coefficient_of_variation, fit_line, mean, std_dev, LinearFit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    WeightedMovingAverage,
    LinearRegression,
    HoltWinters,
    SeasonalDecomposition,
}

/// Tuning shared by all models.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelParams {
    pub outlier_factor: f64,
    /// Holt level smoothing.
    pub alpha: f64,
    /// Holt trend smoothing.
    pub beta: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self { outlier_factor: DEFAULT_IQR_FACTOR, alpha: 0.3, beta: 0.1 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Nothing left after outlier trimming.
    Empty,
    /// Too few points for the model's structure.
    InsufficientData,
    /// The fit produced no finite solution.
    DegenerateFit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FittedModel {
    WeightedMovingAverage { weights: Vec<f64>, trend: Option<TrendDirection> },
    LinearRegression(LinearFit),
    HoltWinters { level: f64, trend: f64, one_step_mae: f64 },
    SeasonalDecomposition { trend: LinearFit, seasonal: f64, residual_std: f64 },
    Mean { value: f64, reason: FallbackReason },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelFit {
    pub kind: ModelKind,
    /// Never negative.
    pub prediction: f64,
    /// Clamped to `[0, 100]`.
    pub confidence: f64,
    pub fitted: FittedModel,
}

/// Relative change between the last two points that counts as a trend.
const TREND_THRESHOLD: f64 = 0.10;

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::WeightedMovingAverage,
        ModelKind::LinearRegression,
        ModelKind::HoltWinters,
        ModelKind::SeasonalDecomposition,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::WeightedMovingAverage => "weighted_moving_average",
            Self::LinearRegression => "linear_regression",
            Self::HoltWinters => "holt_winters",
            Self::SeasonalDecomposition => "seasonal_decomposition",
        }
    }

    /// Seasons of history required before the model joins an ensemble.
    pub fn min_years(self) -> usize {
        match self {
            Self::WeightedMovingAverage | Self::LinearRegression => 1,
            Self::HoltWinters | Self::SeasonalDecomposition => 3,
        }
    }

    pub fn fit(self, values: &[f64], params: &ModelParams) -> ModelFit {
        let cleaned = remove_outliers(values, params.outlier_factor);
        if cleaned.is_empty() {
            return ModelFit {
                kind: self,
                prediction: 0.0,
                confidence: 0.0,
                fitted: FittedModel::Mean { value: 0.0, reason: FallbackReason::Empty },
            };
        }

        let fit = match self {
            Self::WeightedMovingAverage => weighted_moving_average(&cleaned),
            Self::LinearRegression => linear_regression(&cleaned),
            Self::HoltWinters => holt_winters(&cleaned, params.alpha, params.beta),
            Self::SeasonalDecomposition => seasonal_decomposition(&cleaned),
        };

        ModelFit {
            kind: self,
            prediction: fit.prediction.max(0.0),
            confidence: clamp_confidence(fit.confidence),
            fitted: fit.fitted,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

struct RawFit {
    prediction: f64,
    confidence: f64,
    fitted: FittedModel,
}

fn mean_fallback(values: &[f64], confidence: f64, reason: FallbackReason) -> RawFit {
    let value = mean(values);
    RawFit { prediction: value, confidence, fitted: FittedModel::Mean { value, reason } }
}

pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Direction of the last step of a series.
pub fn trend_direction(values: &[f64]) -> Option<TrendDirection> {
    let [.., previous, last] = values else {
        return None;
    };

    let direction = if *previous > f64::EPSILON {
        let change = (last - previous) / previous;
        if change > TREND_THRESHOLD {
            TrendDirection::Growing
        } else if change < -TREND_THRESHOLD {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        }
    } else if *last > *previous {
        TrendDirection::Growing
    } else {
        TrendDirection::Stable
    };
    Some(direction)
}

/// Exponentially weighted mean: the i-th oldest point weighs `2^i`.
fn weighted_moving_average(cleaned: &[f64]) -> RawFit {
    let raw: Vec<f64> = (0..cleaned.len()).map(|i| 2f64.powi(i as i32)).collect();
    let total: f64 = raw.iter().sum();
    let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();

    let prediction: f64 = cleaned.iter().zip(&weights).map(|(v, w)| v * w).sum();
    let confidence = coefficient_of_variation(cleaned).map_or(0.0, |cv| 100.0 * (1.0 - cv));

    RawFit {
        prediction,
        confidence,
        fitted: FittedModel::WeightedMovingAverage {
            weights,
            trend: trend_direction(cleaned),
        },
    }
}

fn linear_regression(cleaned: &[f64]) -> RawFit {
    if cleaned.len() < 2 {
        return mean_fallback(cleaned, 50.0, FallbackReason::InsufficientData);
    }
    let Some(fit) = fit_line(cleaned) else {
        return mean_fallback(cleaned, 30.0, FallbackReason::DegenerateFit);
    };

    let cv = coefficient_of_variation(cleaned).unwrap_or(1.0);
    RawFit {
        prediction: fit.at(cleaned.len() as f64),
        confidence: 100.0 * (0.8 * fit.r_squared - 0.2 * cv),
        fitted: FittedModel::LinearRegression(fit),
    }
}

/// Double exponential smoothing (level + trend, no seasonal term).
fn holt_winters(cleaned: &[f64], alpha: f64, beta: f64) -> RawFit {
    let mut level = cleaned[0];
    if cleaned.len() == 1 {
        return RawFit {
            prediction: level,
            confidence: 50.0,
            fitted: FittedModel::HoltWinters { level, trend: 0.0, one_step_mae: 0.0 },
        };
    }

    let mut trend = cleaned[1] - cleaned[0];
    let mut abs_error = 0.0;
    for &actual in &cleaned[1..] {
        abs_error += (actual - (level + trend)).abs();
        let previous_level = level;
        level = alpha * actual + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * trend;
    }

    let one_step_mae = abs_error / (cleaned.len() - 1) as f64;
    let scale = cleaned.iter().map(|v| v.abs()).sum::<f64>() / cleaned.len() as f64;
    let mape = if scale > f64::EPSILON {
        one_step_mae / scale * 100.0
    } else if one_step_mae > f64::EPSILON {
        100.0
    } else {
        0.0
    };

    RawFit {
        prediction: level + trend,
        confidence: 100.0 - mape,
        fitted: FittedModel::HoltWinters { level, trend, one_step_mae },
    }
}

/// Linear trend plus the mean detrended residual.
fn seasonal_decomposition(cleaned: &[f64]) -> RawFit {
    match cleaned.len() {
        0 | 1 => return mean_fallback(cleaned, 25.0, FallbackReason::InsufficientData),
        2 => return mean_fallback(cleaned, 30.0, FallbackReason::InsufficientData),
        _ => {}
    }
    let Some(trend) = fit_line(cleaned) else {
        return mean_fallback(cleaned, 25.0, FallbackReason::DegenerateFit);
    };

    let residuals: Vec<f64> =
        cleaned.iter().enumerate().map(|(i, value)| value - trend.at(i as f64)).collect();
    let seasonal = mean(&residuals);
    let residual_std = std_dev(&residuals);

    let level = mean(cleaned);
    let confidence =
        if level > f64::EPSILON { 100.0 - 100.0 * (residual_std / level) } else { 0.0 };

    RawFit {
        prediction: trend.at(cleaned.len() as f64) + seasonal,
        confidence,
        fitted: FittedModel::SeasonalDecomposition { trend, seasonal, residual_std },
    }
}

#[cfg(test)]
mod tests {
    use super::{trend_direction, FallbackReason, FittedModel, ModelKind, ModelParams};
    use crate::domain::forecast::TrendDirection;

    fn fit(kind: ModelKind, values: &[f64]) -> super::ModelFit {
        kind.fit(values, &ModelParams::default())
    }

    #[test]
    fn linear_regression_extrapolates_perfect_line() {
        let result = fit(ModelKind::LinearRegression, &[10.0, 20.0, 30.0, 40.0]);

        assert!((result.prediction - 50.0).abs() <= 1.0);
        match result.fitted {
            FittedModel::LinearRegression(line) => assert!((line.r_squared - 1.0).abs() < 1e-9),
            other => panic!("unexpected fit {other:?}"),
        }
        // 0.8 * R^2 - 0.2 * cv, with cv = 11.18 / 25.
        assert!((result.confidence - 71.06).abs() < 0.01);
    }

    #[test]
    fn linear_regression_single_point_falls_back_to_mean() {
        let result = fit(ModelKind::LinearRegression, &[7.0]);
        assert_eq!(result.prediction, 7.0);
        assert_eq!(result.confidence, 50.0);
        assert!(matches!(
            result.fitted,
            FittedModel::Mean { reason: FallbackReason::InsufficientData, .. }
        ));
    }

    #[test]
    fn holt_winters_single_point_returns_value_with_confidence_fifty() {
        let result = fit(ModelKind::HoltWinters, &[42.0]);
        assert_eq!(result.prediction, 42.0);
        assert_eq!(result.confidence, 50.0);
    }

    #[test]
    fn holt_winters_follows_a_steady_trend() {
        let result = fit(ModelKind::HoltWinters, &[100.0, 110.0, 120.0, 130.0]);
        assert!((result.prediction - 140.0).abs() < 1e-9);
        assert!(result.confidence > 99.999);
    }

    #[test]
    fn weighted_moving_average_favours_recent_years() {
        let result = fit(ModelKind::WeightedMovingAverage, &[100.0, 110.0, 121.0]);
        // (100*1 + 110*2 + 121*4) / 7
        assert!((result.prediction - 804.0 / 7.0).abs() < 1e-9);
        match result.fitted {
            FittedModel::WeightedMovingAverage { ref weights, trend } => {
                assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
                assert_eq!(trend, Some(TrendDirection::Stable));
            }
            ref other => panic!("unexpected fit {other:?}"),
        }
    }

    #[test]
    fn non_negative_predictions_and_clamped_confidence() {
        let collapsing = [500.0, 300.0, 100.0, 5.0];
        for kind in ModelKind::ALL {
            let result = fit(kind, &collapsing);
            assert!(result.prediction >= 0.0, "{kind} predicted {}", result.prediction);
            assert!((0.0..=100.0).contains(&result.confidence), "{kind}");
        }
    }

    #[test]
    fn seasonal_decomposition_needs_three_points() {
        let short = fit(ModelKind::SeasonalDecomposition, &[10.0, 20.0]);
        assert_eq!(short.prediction, 15.0);
        assert_eq!(short.confidence, 30.0);

        let single = fit(ModelKind::SeasonalDecomposition, &[10.0]);
        assert_eq!(single.confidence, 25.0);

        let full = fit(ModelKind::SeasonalDecomposition, &[10.0, 20.0, 30.0]);
        assert!((full.prediction - 40.0).abs() < 1e-9);
        assert!(full.confidence > 99.999);
    }

    #[test]
    fn empty_series_predicts_zero() {
        for kind in ModelKind::ALL {
            let result = fit(kind, &[]);
            assert_eq!(result.prediction, 0.0);
            assert_eq!(result.confidence, 0.0);
        }
    }

    #[test]
    fn trend_direction_thresholds() {
        assert_eq!(trend_direction(&[100.0, 115.0]), Some(TrendDirection::Growing));
        assert_eq!(trend_direction(&[100.0, 85.0]), Some(TrendDirection::Declining));
        assert_eq!(trend_direction(&[100.0, 105.0]), Some(TrendDirection::Stable));
        assert_eq!(trend_direction(&[0.0, 3.0]), Some(TrendDirection::Growing));
        assert_eq!(trend_direction(&[5.0]), None);
    }
}
