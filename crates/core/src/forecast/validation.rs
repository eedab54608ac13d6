//! Walk-forward (expanding window) validation of the demand models.
//!
//! Fold `i` trains on seasons `0..i` and scores the prediction for season
//! `i`. Absolute percentage errors are capped so one collapsed season cannot
//! dominate the average.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::domain::forecast::AccuracyMetrics;
use crate::forecast::models::{ModelKind, ModelParams};

/// Upper bound for a single fold's absolute percentage error.
pub const APE_CAP: f64 = 200.0;

/// Most recent folds scored in [`ValidationMode::Reduced`].
const REDUCED_MAX_FOLDS: usize = 5;

/// MAPE reported when no fold could be scored.
const UNSCORED_MAPE: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Every fold from the third season on.
    #[default]
    Full,
    /// Only the most recent folds; a throughput opt-in for large batches.
    Reduced,
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "reduced" => Ok(Self::Reduced),
            other => Err(format!("unsupported validation mode `{other}` (expected full|reduced)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub kind: ModelKind,
    pub metrics: AccuracyMetrics,
    pub folds: usize,
}

/// Test indices scored for a series of `len` seasons.
///
/// With exactly two seasons both modes use a single hold-out split (train on
/// the first, test on the second) so short histories still get a score.
pub fn fold_indices(len: usize, mode: ValidationMode) -> Range<usize> {
    match (len, mode) {
        (0 | 1, _) => 0..0,
        (2, _) => 1..2,
        (_, ValidationMode::Full) => 2..len,
        (_, ValidationMode::Reduced) => len - REDUCED_MAX_FOLDS.min(len - 1)..len,
    }
}

pub fn absolute_percentage_error(actual: f64, predicted: f64) -> f64 {
    let error = (predicted - actual).abs();
    if actual.abs() <= f64::EPSILON {
        return if error <= f64::EPSILON { 0.0 } else { APE_CAP };
    }
    (error / actual.abs() * 100.0).min(APE_CAP)
}

pub fn walk_forward(
    values: &[f64],
    kind: ModelKind,
    params: &ModelParams,
    mode: ValidationMode,
) -> ValidationReport {
    let mut ape_sum = 0.0;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut folds = 0usize;

    for index in fold_indices(values.len(), mode) {
        let predicted = kind.fit(&values[..index], params).prediction;
        let actual = values[index];

        ape_sum += absolute_percentage_error(actual, predicted);
        abs_sum += (predicted - actual).abs();
        sq_sum += (predicted - actual).powi(2);
        folds += 1;
    }

    let metrics = if folds == 0 {
        AccuracyMetrics { mape: UNSCORED_MAPE, mae: 0.0, rmse: 0.0 }
    } else {
        let n = folds as f64;
        AccuracyMetrics { mape: ape_sum / n, mae: abs_sum / n, rmse: (sq_sum / n).sqrt() }
    };

    ValidationReport { kind, metrics, folds }
}
