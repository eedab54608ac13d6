use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::commands::{CommandResult, EXIT_NOTHING_TO_FORECAST};
use seasoncast_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use seasoncast_core::domain::forecast::ForecastBatchResult;
use seasoncast_core::errors::ApplicationError;
use seasoncast_core::forecast::cancel::CancellationToken;
use seasoncast_core::forecast::orchestrator::{
    ForecastOrchestrator, ForecastSettings, ProgressUpdate,
};
use seasoncast_core::forecast::plan::{build_purchase_plan, PurchasePlan};
use seasoncast_core::forecast::seasons::TargetSeason;
use seasoncast_core::forecast::validation::ValidationMode;
use seasoncast_core::snapshot::SalesSnapshot;

#[derive(Clone, Debug, Default)]
pub struct ForecastArgs {
    pub input: PathBuf,
    pub target: TargetSeason,
    pub reduced: bool,
    pub workers: Option<usize>,
    pub plan: bool,
    pub stores: Option<u32>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ForecastReport {
    batch: ForecastBatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<PurchasePlan>,
    rejected_rows: usize,
}

pub fn run(args: &ForecastArgs) -> CommandResult {
    match execute(args) {
        Ok(Some(report)) => {
            let message = format!(
                "forecast {} of {} products for {} ({} units)",
                report.batch.forecasts.len(),
                report.batch.candidate_count,
                report.batch.target_season_label,
                report.batch.total_predicted_units()
            );
            CommandResult::success_with("forecast", message, &report)
        }
        Ok(None) => CommandResult::failure(
            "forecast",
            "nothing_to_forecast",
            "no parsable season label or no earlier history for the target season",
            EXIT_NOTHING_TO_FORECAST,
        ),
        Err(error) => CommandResult::from_error("forecast", &error),
    }
}

fn execute(args: &ForecastArgs) -> Result<Option<ForecastReport>, ApplicationError> {
    let config = AppConfig::load(load_options(args))?;
    let snapshot = SalesSnapshot::load(&args.input)?;
    let orchestrator = ForecastOrchestrator::new(ForecastSettings::from(&config.forecast))?;

    let mut report_progress = |update: &ProgressUpdate| {
        info!(
            event_name = "forecast.batch.progress",
            percent_complete = update.percent_complete,
            processed = update.processed,
            total = update.total,
            eta_secs = update.estimated_seconds_remaining,
            "forecast progress"
        );
    };
    let Some(batch) = orchestrator.run_with(
        &snapshot.records,
        &snapshot.catalog,
        args.target,
        &mut report_progress,
        &CancellationToken::new(),
    ) else {
        return Ok(None);
    };

    let plan = args
        .plan
        .then(|| build_purchase_plan(&batch, &snapshot.catalog, config.plan.store_count));
    Ok(Some(ForecastReport { batch, plan, rejected_rows: snapshot.rejected_rows }))
}

fn load_options(args: &ForecastArgs) -> LoadOptions {
    LoadOptions {
        config_path: args.config_path.clone(),
        require_file: args.config_path.is_some(),
        overrides: ConfigOverrides {
            validation_mode: args.reduced.then_some(ValidationMode::Reduced),
            worker_threads: args.workers,
            store_count: args.stores,
            ..ConfigOverrides::default()
        },
    }
}
