use std::env;
use std::fs;
use std::path::Path;

use seasoncast_core::config::{resolve_config_path, AppConfig, LoadOptions};
use seasoncast_core::errors::ApplicationError;
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options =
        LoadOptions { config_path: config_path.map(Path::to_path_buf), ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error("config", &ApplicationError::from(error)),
    };

    let config_file_path = resolve_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let forecast = &config.forecast;
    let entries = vec![
        entry(
            "forecast.outlier_factor",
            &forecast.outlier_factor.to_string(),
            source("forecast.outlier_factor", &["SEASONCAST_FORECAST_OUTLIER_FACTOR"]),
        ),
        entry(
            "forecast.holt_alpha",
            &forecast.holt_alpha.to_string(),
            source("forecast.holt_alpha", &["SEASONCAST_FORECAST_HOLT_ALPHA"]),
        ),
        entry(
            "forecast.holt_beta",
            &forecast.holt_beta.to_string(),
            source("forecast.holt_beta", &["SEASONCAST_FORECAST_HOLT_BETA"]),
        ),
        entry(
            "forecast.validation_mode",
            &format!("{:?}", forecast.validation_mode),
            source("forecast.validation_mode", &["SEASONCAST_FORECAST_VALIDATION_MODE"]),
        ),
        entry(
            "forecast.worker_threads",
            &worker_label(forecast.worker_threads),
            source("forecast.worker_threads", &["SEASONCAST_FORECAST_WORKER_THREADS"]),
        ),
        entry(
            "forecast.progress_every",
            &forecast.progress_every.to_string(),
            source("forecast.progress_every", &["SEASONCAST_FORECAST_PROGRESS_EVERY"]),
        ),
        entry(
            "forecast.excluded_family",
            &forecast.excluded_family,
            source("forecast.excluded_family", &["SEASONCAST_FORECAST_EXCLUDED_FAMILY"]),
        ),
        entry(
            "plan.store_count",
            &config.plan.store_count.to_string(),
            source("plan.store_count", &["SEASONCAST_PLAN_STORE_COUNT"]),
        ),
        entry(
            "logging.level",
            &config.logging.level,
            source("logging.level", &["SEASONCAST_LOGGING_LEVEL", "SEASONCAST_LOG_LEVEL"]),
        ),
        entry(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", &["SEASONCAST_LOGGING_FORMAT", "SEASONCAST_LOG_FORMAT"]),
        ),
    ];

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        &entries,
    )
}

fn worker_label(worker_threads: usize) -> String {
    if worker_threads == 0 {
        "0 (one per CPU)".to_string()
    } else {
        worker_threads.to_string()
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn entry(key: &'static str, value: &str, source: String) -> ConfigEntry {
    ConfigEntry { key, value: value.to_string(), source }
}
