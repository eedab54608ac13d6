use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::product::ProductCode;
use crate::domain::season::SeasonType;
use crate::forecast::models::ModelKind;

/// How a product's forecast was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Ensemble,
    WeightedMovingAverage,
    LinearRegression,
    HoltWinters,
    SeasonalDecomposition,
    SimpleAverage,
    #[serde(rename = "family_average_fallback")]
    FamilyAverage,
    #[serde(rename = "theme_average_fallback")]
    ThemeAverage,
}

impl ForecastMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ensemble => "ensemble",
            Self::WeightedMovingAverage => "weighted_moving_average",
            Self::LinearRegression => "linear_regression",
            Self::HoltWinters => "holt_winters",
            Self::SeasonalDecomposition => "seasonal_decomposition",
            Self::SimpleAverage => "simple_average",
            Self::FamilyAverage => "family_average_fallback",
            Self::ThemeAverage => "theme_average_fallback",
        }
    }
}

impl From<ModelKind> for ForecastMethod {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::WeightedMovingAverage => Self::WeightedMovingAverage,
            ModelKind::LinearRegression => Self::LinearRegression,
            ModelKind::HoltWinters => Self::HoltWinters,
            ModelKind::SeasonalDecomposition => Self::SeasonalDecomposition,
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MAPE (percent), MAE and RMSE (units) for one forecast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub mape: f64,
    pub mae: f64,
    pub rmse: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Growing,
    Declining,
    Stable,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastFeatures {
    pub avg_price: f64,
    pub avg_cost: f64,
    pub price_elasticity: f64,
    /// Fitted slope per season relative to the mean level.
    pub trend_score: Option<f64>,
    pub trend_direction: Option<TrendDirection>,
    pub seasonality_tag: Option<SeasonType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub product_code: ProductCode,
    pub family_code: String,
    pub theme: Option<String>,
    pub predicted_demand: u64,
    pub confidence: f64,
    pub method_used: ForecastMethod,
    pub historical_average: f64,
    pub years_of_history: usize,
    pub features: ForecastFeatures,
    pub validation: AccuracyMetrics,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateAccuracy {
    pub mape: f64,
    pub mae: f64,
    pub rmse: f64,
    pub coverage_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastBatchResult {
    pub target_season_label: String,
    pub target_year: i32,
    pub season_type: SeasonType,
    /// Sorted by predicted demand, highest first.
    pub forecasts: Vec<ForecastRecord>,
    pub aggregate_accuracy: AggregateAccuracy,
    pub historical_record_count: usize,
    pub candidate_count: usize,
    pub method_usage: BTreeMap<ForecastMethod, usize>,
    /// Set when the run stopped early; `forecasts` then holds the products
    /// finished before cancellation.
    pub cancelled: bool,
}

impl ForecastBatchResult {
    pub fn total_predicted_units(&self) -> u64 {
        self.forecasts.iter().map(|record| record.predicted_demand).sum()
    }
}
