//! Inverse-error ensemble over the applicable demand models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::forecast::{AccuracyMetrics, ForecastMethod, TrendDirection};
use crate::forecast::aggregate::ProductSeries;
use crate::forecast::models::{clamp_confidence, trend_direction, FittedModel, ModelKind, ModelParams};
use crate::forecast::outlier::remove_outliers;
use crate::forecast::stats::{fit_line, mean};
use crate::forecast::validation::{walk_forward, ValidationMode};

/// Floor applied to a model's MAPE (in percent) before inverting it.
pub const MAPE_EPSILON: f64 = 0.01;

/// The blend is only trusted below this MAPE.
pub const BLEND_MAPE_LIMIT: f64 = 50.0;

/// Seasons of history needed for the full model set and for blending.
const FULL_HISTORY_YEARS: usize = 3;

/// Relative price moves smaller than this are ignored for elasticity.
const MIN_PRICE_MOVE: f64 = 0.01;

/// A single product's prediction, whichever tier produced it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub predicted_units: u64,
    pub confidence: f64,
    pub validation: AccuracyMetrics,
    pub method: ForecastMethod,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CandidateScore {
    pub kind: ModelKind,
    pub prediction: f64,
    /// Raw in-sample confidence of the model before rebanding.
    pub confidence: f64,
    pub validation: AccuracyMetrics,
    pub folds: usize,
    pub weight: f64,
    pub fitted: FittedModel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleOutcome {
    pub prediction: ModelPrediction,
    pub candidates: Vec<CandidateScore>,
    /// Whether the weighted blend was used rather than the best single model.
    pub blended: bool,
    pub trend_direction: Option<TrendDirection>,
    /// Fitted slope per season relative to the mean level.
    pub trend_score: Option<f64>,
    pub price_elasticity: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct EnsembleCombiner {
    params: ModelParams,
    mode: ValidationMode,
}

impl EnsembleCombiner {
    pub fn new(params: ModelParams, mode: ValidationMode) -> Self {
        Self { params, mode }
    }

    pub fn applicable_models(years: usize) -> Vec<ModelKind> {
        ModelKind::ALL.into_iter().filter(|kind| years >= kind.min_years()).collect()
    }

    pub fn combine(&self, series: &ProductSeries) -> EnsembleOutcome {
        let values = series.values();
        let years = series.years();

        let mut candidates: Vec<CandidateScore> = Self::applicable_models(years)
            .into_iter()
            .map(|kind| {
                let fit = kind.fit(&values, &self.params);
                let report = walk_forward(&values, kind, &self.params, self.mode);
                CandidateScore {
                    kind,
                    prediction: fit.prediction,
                    confidence: fit.confidence,
                    validation: report.metrics,
                    folds: report.folds,
                    weight: 0.0,
                    fitted: fit.fitted,
                }
            })
            .collect();

        let mapes: Vec<f64> = candidates.iter().map(|c| c.validation.mape).collect();
        for (candidate, weight) in candidates.iter_mut().zip(inverse_mape_weights(&mapes)) {
            candidate.weight = weight;
        }

        let blend = weighted_blend(&candidates);
        let use_blend = years >= FULL_HISTORY_YEARS
            && candidates.len() > 1
            && blend.validation.mape < BLEND_MAPE_LIMIT;

        let (raw_prediction, raw_confidence, validation, method) = if use_blend {
            (blend.prediction, blend.confidence, blend.validation, ForecastMethod::Ensemble)
        } else {
            match best_candidate(&candidates) {
                Some(best) => {
                    (best.prediction, best.confidence, best.validation, ForecastMethod::from(best.kind))
                }
                None => (
                    mean(&values),
                    0.0,
                    AccuracyMetrics { mape: 100.0, ..AccuracyMetrics::default() },
                    ForecastMethod::SimpleAverage,
                ),
            }
        };

        let (low, high) = confidence_band(years, validation.mape);
        let prediction = ModelPrediction {
            predicted_units: round_units(raw_prediction),
            confidence: clamp_confidence(raw_confidence).clamp(low, high),
            validation,
            method,
        };

        EnsembleOutcome {
            prediction,
            candidates,
            blended: use_blend,
            trend_direction: trend_direction(&remove_outliers(&values, self.params.outlier_factor)),
            trend_score: trend_score(&values),
            price_elasticity: price_elasticity(&series.units_by_year, &series.price_by_year()),
        }
    }
}

/// Normalised inverse-MAPE weights. A perfect model dominates
/// proportionally instead of taking all the weight.
pub fn inverse_mape_weights(mapes: &[f64]) -> Vec<f64> {
    let inverses: Vec<f64> = mapes.iter().map(|mape| 1.0 / mape.max(MAPE_EPSILON)).collect();
    let total: f64 = inverses.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return vec![1.0 / mapes.len().max(1) as f64; mapes.len()];
    }
    inverses.iter().map(|inverse| inverse / total).collect()
}

/// Confidence range allowed for a forecast given how much history backs it.
pub fn confidence_band(years: usize, mape: f64) -> (f64, f64) {
    if years >= 3 && mape < 30.0 {
        (75.0, 100.0)
    } else if years >= 2 && mape < 50.0 {
        (50.0, 74.0)
    } else {
        (30.0, 49.0)
    }
}

/// Mean elasticity across consecutive seasons: relative change in units over
/// relative change in price.
pub fn price_elasticity(units: &BTreeMap<i32, f64>, prices: &BTreeMap<i32, f64>) -> f64 {
    let points: Vec<(f64, f64)> = units
        .iter()
        .filter_map(|(year, quantity)| prices.get(year).map(|price| (*quantity, *price)))
        .collect();

    let ratios: Vec<f64> = points
        .windows(2)
        .filter_map(|pair| {
            let [(q0, p0), (q1, p1)] = pair else {
                return None;
            };
            if q0.abs() <= f64::EPSILON || p0.abs() <= f64::EPSILON {
                return None;
            }
            let price_move = (p1 - p0) / p0;
            if price_move.abs() < MIN_PRICE_MOVE {
                return None;
            }
            let ratio = ((q1 - q0) / q0) / price_move;
            ratio.is_finite().then_some(ratio)
        })
        .collect();

    mean(&ratios)
}

pub(crate) fn round_units(prediction: f64) -> u64 {
    if prediction.is_finite() && prediction > 0.0 {
        prediction.round() as u64
    } else {
        0
    }
}

fn trend_score(values: &[f64]) -> Option<f64> {
    let level = mean(values);
    if level.abs() <= f64::EPSILON {
        return None;
    }
    fit_line(values).map(|line| line.slope / level)
}

struct Blend {
    prediction: f64,
    confidence: f64,
    validation: AccuracyMetrics,
}

fn weighted_blend(candidates: &[CandidateScore]) -> Blend {
    let mut blend =
        Blend { prediction: 0.0, confidence: 0.0, validation: AccuracyMetrics::default() };
    for candidate in candidates {
        let w = candidate.weight;
        blend.prediction += w * candidate.prediction;
        blend.confidence += w * candidate.confidence;
        blend.validation.mape += w * candidate.validation.mape;
        blend.validation.mae += w * candidate.validation.mae;
        blend.validation.rmse += w * candidate.validation.rmse;
    }
    blend
}

/// Lowest MAPE wins; ties keep the earlier model.
fn best_candidate(candidates: &[CandidateScore]) -> Option<&CandidateScore> {
    candidates.iter().fold(None, |best: Option<&CandidateScore>, candidate| match best {
        Some(current) if current.validation.mape <= candidate.validation.mape => Some(current),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{confidence_band, inverse_mape_weights, price_elasticity, EnsembleCombiner};
    use crate::domain::forecast::ForecastMethod;
    use crate::domain::sales::SalesRecord;
    use crate::forecast::aggregate::aggregate_by_product;
    use crate::forecast::models::{ModelKind, ModelParams};
    use crate::forecast::validation::ValidationMode;

    fn series(points: &[(&str, f64)]) -> crate::forecast::aggregate::ProductSeries {
        let records: Vec<SalesRecord> = points
            .iter()
            .map(|&(label, units)| SalesRecord::new("SKU", "TOPS", label, units, Decimal::from(10)))
            .collect();
        aggregate_by_product(&records, "").remove(0)
    }

    #[test]
    fn weights_sum_to_one() {
        let weights = inverse_mape_weights(&[12.0, 3.5, 40.0, 0.0]);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(weights[3] > weights[1]);
        assert!(weights[3] < 1.0);
    }

    #[test]
    fn equally_accurate_models_split_evenly() {
        let weights = inverse_mape_weights(&[8.0, 8.0]);
        assert!((weights[0] - 0.5).abs() < 1e-12);
        assert!((weights[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn perfect_models_do_not_divide_by_zero() {
        let weights = inverse_mape_weights(&[0.0, 0.0]);
        assert!(weights.iter().all(|w| w.is_finite()));
        assert!((weights[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn short_history_only_runs_simple_models() {
        assert_eq!(
            EnsembleCombiner::applicable_models(2),
            vec![ModelKind::WeightedMovingAverage, ModelKind::LinearRegression]
        );
        assert_eq!(EnsembleCombiner::applicable_models(3).len(), 4);
    }

    #[test]
    fn steady_growth_is_blended_with_high_confidence() {
        let combiner = EnsembleCombiner::new(ModelParams::default(), ValidationMode::Full);
        let outcome = combiner.combine(&series(&[("PV21", 100.0), ("PV22", 110.0), ("PV23", 121.0)]));

        assert!(outcome.blended);
        assert_eq!(outcome.prediction.method, ForecastMethod::Ensemble);
        assert!((75.0..=100.0).contains(&outcome.prediction.confidence));
        assert!((125..=135).contains(&outcome.prediction.predicted_units));
        assert!((outcome.candidates.iter().map(|c| c.weight).sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn two_years_pick_the_best_single_model() {
        let combiner = EnsembleCombiner::new(ModelParams::default(), ValidationMode::Full);
        let outcome = combiner.combine(&series(&[("PV22", 100.0), ("PV23", 120.0)]));

        assert!(!outcome.blended);
        assert_eq!(outcome.candidates.len(), 2);
        assert_ne!(outcome.prediction.method, ForecastMethod::Ensemble);
        let (low, high) = confidence_band(2, outcome.prediction.validation.mape);
        assert!((low..=high).contains(&outcome.prediction.confidence));
    }

    #[test]
    fn confidence_bands_follow_history_depth() {
        assert_eq!(confidence_band(4, 10.0), (75.0, 100.0));
        assert_eq!(confidence_band(3, 35.0), (50.0, 74.0));
        assert_eq!(confidence_band(2, 10.0), (50.0, 74.0));
        assert_eq!(confidence_band(2, 60.0), (30.0, 49.0));
        assert_eq!(confidence_band(1, 0.0), (30.0, 49.0));
    }

    #[test]
    fn elasticity_ignores_flat_prices() {
        let units = BTreeMap::from([(2021, 100.0), (2022, 80.0), (2023, 80.0)]);
        let prices = BTreeMap::from([(2021, 10.0), (2022, 11.0), (2023, 11.05)]);

        // (-20%) / (+10%) = -2; the 0.45% move is ignored.
        assert!((price_elasticity(&units, &prices) + 2.0).abs() < 1e-9);
        assert_eq!(price_elasticity(&units, &BTreeMap::new()), 0.0);
    }
}
