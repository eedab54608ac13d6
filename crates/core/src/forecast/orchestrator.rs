//! Batch driver: season detection, per-product tiered pipeline on a worker
//! pool, and the single-threaded reduction into a [`ForecastBatchResult`].

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ForecastConfig, DEFAULT_EXCLUDED_FAMILY};
use crate::domain::forecast::{
    AccuracyMetrics, AggregateAccuracy, ForecastBatchResult, ForecastFeatures, ForecastMethod,
    ForecastRecord, TrendDirection,
};
use crate::domain::product::ProductCatalog;
use crate::domain::sales::{decimal_to_f64, SalesRecord};
use crate::domain::season::{SeasonSpec, SeasonType};
use crate::errors::ApplicationError;
use crate::forecast::aggregate::{aggregate_by_product, ProductSeries};
use crate::forecast::cancel::CancellationToken;
use crate::forecast::ensemble::{round_units, EnsembleCombiner, ModelPrediction};
use crate::forecast::fallback::{
    hierarchical_fallback, is_fallback_eligible, resolve_theme, HierarchyAverages,
    MIN_MODELLED_UNITS,
};
use crate::forecast::models::{ModelKind, ModelParams};
use crate::forecast::seasons::{
    detect_latest_season, filter_by_season_type, resolve_target, TargetSeason,
};
use crate::forecast::validation::ValidationMode;

const SIMPLE_AVERAGE_CONFIDENCE: f64 = 30.0;
const SIMPLE_AVERAGE_MAPE: f64 = 50.0;

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastSettings {
    pub params: ModelParams,
    pub validation_mode: ValidationMode,
    /// `0` lets the pool pick one thread per core.
    pub worker_threads: usize,
    pub progress_every: usize,
    pub excluded_family: String,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            params: ModelParams::default(),
            validation_mode: ValidationMode::Full,
            worker_threads: 0,
            progress_every: 10,
            excluded_family: DEFAULT_EXCLUDED_FAMILY.to_owned(),
        }
    }
}

impl From<&ForecastConfig> for ForecastSettings {
    fn from(config: &ForecastConfig) -> Self {
        Self {
            params: ModelParams {
                outlier_factor: config.outlier_factor,
                alpha: config.holt_alpha,
                beta: config.holt_beta,
            },
            validation_mode: config.validation_mode,
            worker_threads: config.worker_threads,
            progress_every: config.progress_every.max(1),
            excluded_family: config.excluded_family.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub percent_complete: f64,
    pub processed: usize,
    pub total: usize,
    pub estimated_seconds_remaining: f64,
}

impl ProgressUpdate {
    fn at(processed: usize, total: usize, started: Instant) -> Self {
        let percent_complete =
            if total == 0 { 100.0 } else { processed as f64 / total as f64 * 100.0 };
        let estimated_seconds_remaining = if processed == 0 {
            0.0
        } else {
            started.elapsed().as_secs_f64() / processed as f64 * (total - processed) as f64
        };
        Self { percent_complete, processed, total, estimated_seconds_remaining }
    }
}

/// Per-model line of a single-product validation report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateReport {
    pub model: ModelKind,
    pub prediction: f64,
    pub confidence: f64,
    pub weight: f64,
    pub validation: AccuracyMetrics,
    pub folds: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductValidation {
    pub product_code: String,
    pub family_code: String,
    pub target_season_label: String,
    pub units_by_year: BTreeMap<i32, f64>,
    pub candidates: Vec<CandidateReport>,
    pub blended: bool,
    pub selected: ModelPrediction,
}

pub struct ForecastOrchestrator {
    settings: ForecastSettings,
    pool: ThreadPool,
}

struct BatchContext<'a> {
    catalog: &'a ProductCatalog,
    averages: &'a HierarchyAverages,
    season_type: SeasonType,
}

impl ForecastOrchestrator {
    pub fn new(settings: ForecastSettings) -> Result<Self, ApplicationError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads)
            .thread_name(|index| format!("seasoncast-worker-{index}"))
            .build()
            .map_err(|error| ApplicationError::WorkerPool(error.to_string()))?;
        Ok(Self { settings, pool })
    }

    pub fn run(
        &self,
        records: &[SalesRecord],
        catalog: &ProductCatalog,
        target: TargetSeason,
    ) -> Option<ForecastBatchResult> {
        self.run_with(records, catalog, target, &mut |_| {}, &CancellationToken::new())
    }

    /// Forecasts every product for the season after the latest one in
    /// `records`. Returns `None` when no season label parses or the target
    /// season type has no earlier history.
    pub fn run_with(
        &self,
        records: &[SalesRecord],
        catalog: &ProductCatalog,
        target: TargetSeason,
        progress: &mut dyn FnMut(&ProgressUpdate),
        cancel: &CancellationToken,
    ) -> Option<ForecastBatchResult> {
        let target_season = self.target_season(records, target)?;
        let history =
            filter_by_season_type(records, target_season.season_type, target_season.year);
        if history.is_empty() {
            warn!(
                event_name = "forecast.batch.no_history",
                target_season = %target_season,
                "no earlier seasons of the target type; nothing to forecast"
            );
            return None;
        }

        let series = aggregate_by_product(&history, &self.settings.excluded_family);
        let averages = HierarchyAverages::build(&series, catalog);
        let context =
            BatchContext { catalog, averages: &averages, season_type: target_season.season_type };
        let total = series.len();

        info!(
            event_name = "forecast.batch.started",
            target_season = %target_season,
            historical_records = history.len(),
            products = total,
            validation_mode = ?self.settings.validation_mode,
            "forecast batch started"
        );

        let started = Instant::now();
        progress(&ProgressUpdate::at(0, total, started));

        let every = self.settings.progress_every.max(1);
        let mut outcomes: Vec<(usize, Option<ForecastRecord>)> = Vec::with_capacity(total);
        thread::scope(|scope| {
            let (sender, receiver) = mpsc::channel::<(usize, Option<ForecastRecord>)>();
            let series = &series;
            let context = &context;
            scope.spawn(move || {
                self.pool.install(|| {
                    series.par_iter().enumerate().for_each_with(sender, |sender, (index, product)| {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let outcome = self.forecast_product(product, context);
                        // Only fails once the coordinating loop has stopped receiving.
                        let _ = sender.send((index, outcome));
                    });
                });
            });

            for outcome in receiver {
                outcomes.push(outcome);
                let processed = outcomes.len();
                if processed % every == 0 || processed == total {
                    progress(&ProgressUpdate::at(processed, total, started));
                }
            }
        });

        let processed = outcomes.len();
        let cancelled = processed < total;
        if cancelled {
            progress(&ProgressUpdate::at(processed, total, started));
            warn!(
                event_name = "forecast.batch.cancelled",
                processed,
                total,
                "forecast batch cancelled before completion"
            );
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let forecasts: Vec<ForecastRecord> =
            outcomes.into_iter().filter_map(|(_, outcome)| outcome).collect();

        let result = reduce(target_season, history.len(), total, forecasts, cancelled);
        info!(
            event_name = "forecast.batch.completed",
            target_season = %target_season,
            forecasts = result.forecasts.len(),
            coverage_percent = result.aggregate_accuracy.coverage_percent,
            mape = result.aggregate_accuracy.mape,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "forecast batch completed"
        );
        Some(result)
    }

    /// Full walk-forward report for one product, regardless of the batch
    /// validation mode.
    pub fn validate_product(
        &self,
        records: &[SalesRecord],
        target: TargetSeason,
        product_code: &str,
        family_code: Option<&str>,
    ) -> Option<ProductValidation> {
        let target_season = self.target_season(records, target)?;
        let history =
            filter_by_season_type(records, target_season.season_type, target_season.year);
        let product = aggregate_by_product(&history, &self.settings.excluded_family)
            .into_iter()
            .find(|series| {
                series.product_code().0 == product_code
                    && family_code.map_or(true, |family| series.family_code() == family)
            })?;

        let outcome =
            EnsembleCombiner::new(self.settings.params, ValidationMode::Full).combine(&product);
        let candidates = outcome
            .candidates
            .iter()
            .map(|candidate| CandidateReport {
                model: candidate.kind,
                prediction: candidate.prediction,
                confidence: candidate.confidence,
                weight: candidate.weight,
                validation: candidate.validation,
                folds: candidate.folds,
            })
            .collect();

        Some(ProductValidation {
            product_code: product.product_code().0.clone(),
            family_code: product.family_code().to_owned(),
            target_season_label: target_season.label(),
            units_by_year: product.units_by_year.clone(),
            candidates,
            blended: outcome.blended,
            selected: outcome.prediction,
        })
    }

    fn target_season(&self, records: &[SalesRecord], target: TargetSeason) -> Option<SeasonSpec> {
        let Some(latest) = detect_latest_season(records) else {
            warn!(
                event_name = "forecast.batch.no_season",
                records = records.len(),
                "no parsable season label in sales history"
            );
            return None;
        };
        Some(resolve_target(latest, target))
    }

    fn forecast_product(
        &self,
        product: &ProductSeries,
        context: &BatchContext<'_>,
    ) -> Option<ForecastRecord> {
        let theme = resolve_theme(product, context.catalog);

        if is_fallback_eligible(product.total_units) {
            if let Some(prediction) =
                hierarchical_fallback(product, theme.as_deref(), context.averages)
            {
                let features = self.features(product, context, 0.0, None, None);
                return Some(record(product, theme, prediction, features));
            }
        }

        if product.total_units < MIN_MODELLED_UNITS {
            debug!(
                event_name = "forecast.product.skipped",
                product_code = %product.product_code(),
                total_units = product.total_units,
                "product below minimum history"
            );
            return None;
        }

        if product.years() < 2 {
            let prediction = ModelPrediction {
                predicted_units: round_units(product.yearly_average()),
                confidence: SIMPLE_AVERAGE_CONFIDENCE,
                validation: AccuracyMetrics { mape: SIMPLE_AVERAGE_MAPE, mae: 0.0, rmse: 0.0 },
                method: ForecastMethod::SimpleAverage,
            };
            let features = self.features(product, context, 0.0, None, None);
            return Some(record(product, theme, prediction, features));
        }

        let outcome = EnsembleCombiner::new(self.settings.params, self.settings.validation_mode)
            .combine(product);
        let features = self.features(
            product,
            context,
            outcome.price_elasticity,
            outcome.trend_score,
            outcome.trend_direction,
        );
        Some(record(product, theme, outcome.prediction, features))
    }

    fn features(
        &self,
        product: &ProductSeries,
        context: &BatchContext<'_>,
        price_elasticity: f64,
        trend_score: Option<f64>,
        trend_direction: Option<TrendDirection>,
    ) -> ForecastFeatures {
        let info = context.catalog.find(product.product_code());
        let or_catalog = |observed: f64, listed: Option<rust_decimal::Decimal>| {
            if observed > 0.0 {
                observed
            } else {
                listed.map(decimal_to_f64).unwrap_or(0.0)
            }
        };

        ForecastFeatures {
            avg_price: or_catalog(product.average_price(), info.and_then(|i| i.unit_price)),
            avg_cost: or_catalog(product.average_cost(), info.and_then(|i| i.unit_cost)),
            price_elasticity,
            trend_score,
            trend_direction,
            seasonality_tag: Some(context.season_type),
        }
    }
}

fn record(
    product: &ProductSeries,
    theme: Option<String>,
    prediction: ModelPrediction,
    features: ForecastFeatures,
) -> ForecastRecord {
    ForecastRecord {
        product_code: product.product_code().clone(),
        family_code: product.family_code().to_owned(),
        theme,
        predicted_demand: prediction.predicted_units,
        confidence: prediction.confidence,
        method_used: prediction.method,
        historical_average: product.yearly_average(),
        years_of_history: product.years(),
        features,
        validation: prediction.validation,
    }
}

fn reduce(
    target: SeasonSpec,
    historical_record_count: usize,
    candidate_count: usize,
    mut forecasts: Vec<ForecastRecord>,
    cancelled: bool,
) -> ForecastBatchResult {
    let mut method_usage: BTreeMap<ForecastMethod, usize> = BTreeMap::new();
    let mut accuracy = AggregateAccuracy::default();
    for forecast in &forecasts {
        *method_usage.entry(forecast.method_used).or_default() += 1;
        accuracy.mape += forecast.validation.mape;
        accuracy.mae += forecast.validation.mae;
        accuracy.rmse += forecast.validation.rmse;
    }

    let included = forecasts.len();
    if included > 0 {
        let n = included as f64;
        accuracy.mape /= n;
        accuracy.mae /= n;
        accuracy.rmse /= n;
    }
    if candidate_count > 0 {
        accuracy.coverage_percent = included as f64 / candidate_count as f64 * 100.0;
    }

    forecasts.sort_by(|a, b| {
        b.predicted_demand
            .cmp(&a.predicted_demand)
            .then_with(|| a.product_code.cmp(&b.product_code))
            .then_with(|| a.family_code.cmp(&b.family_code))
    });

    ForecastBatchResult {
        target_season_label: target.label(),
        target_year: target.year,
        season_type: target.season_type,
        forecasts,
        aggregate_accuracy: accuracy,
        historical_record_count,
        candidate_count,
        method_usage,
        cancelled,
    }
}
