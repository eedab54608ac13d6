use std::path::PathBuf;

use crate::commands::{CommandResult, EXIT_NOTHING_TO_FORECAST};
use seasoncast_core::config::{AppConfig, LoadOptions};
use seasoncast_core::errors::ApplicationError;
use seasoncast_core::forecast::orchestrator::{
    ForecastOrchestrator, ForecastSettings, ProductValidation,
};
use seasoncast_core::forecast::seasons::TargetSeason;
use seasoncast_core::snapshot::SalesSnapshot;

#[derive(Clone, Debug, Default)]
pub struct ValidateArgs {
    pub input: PathBuf,
    pub product: String,
    pub family: Option<String>,
    pub target: TargetSeason,
    pub config_path: Option<PathBuf>,
}

pub fn run(args: &ValidateArgs) -> CommandResult {
    match execute(args) {
        Ok(Some(report)) => {
            let best = report
                .candidates
                .iter()
                .min_by(|a, b| a.validation.mape.total_cmp(&b.validation.mape))
                .map(|c| format!("{} (mape {:.2}%)", c.model, c.validation.mape))
                .unwrap_or_else(|| "none".to_string());
            let message = format!(
                "validated {} models for {} / {} against {}; most accurate: {best}",
                report.candidates.len(),
                report.product_code,
                report.family_code,
                report.target_season_label
            );
            CommandResult::success_with("validate", message, &report)
        }
        Ok(None) => CommandResult::failure(
            "validate",
            "product_not_found",
            format!("no history for product `{}` in the target season type", args.product),
            EXIT_NOTHING_TO_FORECAST,
        ),
        Err(error) => CommandResult::from_error("validate", &error),
    }
}

fn execute(args: &ValidateArgs) -> Result<Option<ProductValidation>, ApplicationError> {
    let config = AppConfig::load(LoadOptions {
        config_path: args.config_path.clone(),
        require_file: args.config_path.is_some(),
        ..LoadOptions::default()
    })?;
    let snapshot = SalesSnapshot::load(&args.input)?;
    let orchestrator = ForecastOrchestrator::new(ForecastSettings::from(&config.forecast))?;

    Ok(orchestrator.validate_product(
        &snapshot.records,
        args.target,
        args.product.trim(),
        args.family.as_deref(),
    ))
}
