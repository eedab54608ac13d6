use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::forecast::validation::ValidationMode;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub forecast: ForecastConfig,
    pub plan: PlanConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastConfig {
    pub outlier_factor: f64,
    pub holt_alpha: f64,
    pub holt_beta: f64,
    pub validation_mode: ValidationMode,
    /// Zero means one worker per available CPU.
    pub worker_threads: usize,
    pub progress_every: usize,
    /// Placeholder family whose rows never count as real demand.
    pub excluded_family: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanConfig {
    pub store_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub validation_mode: Option<ValidationMode>,
    pub worker_threads: Option<usize>,
    pub store_count: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_EXCLUDED_FAMILY: &str = "GR.ART.FICTICIO";

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            outlier_factor: 1.5,
            holt_alpha: 0.3,
            holt_beta: 0.1,
            validation_mode: ValidationMode::Full,
            worker_threads: 0,
            progress_every: 10,
            excluded_family: DEFAULT_EXCLUDED_FAMILY.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            forecast: ForecastConfig::default(),
            plan: PlanConfig { store_count: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("seasoncast.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(forecast) = patch.forecast {
            if let Some(outlier_factor) = forecast.outlier_factor {
                self.forecast.outlier_factor = outlier_factor;
            }
            if let Some(holt_alpha) = forecast.holt_alpha {
                self.forecast.holt_alpha = holt_alpha;
            }
            if let Some(holt_beta) = forecast.holt_beta {
                self.forecast.holt_beta = holt_beta;
            }
            if let Some(validation_mode) = forecast.validation_mode {
                self.forecast.validation_mode = validation_mode;
            }
            if let Some(worker_threads) = forecast.worker_threads {
                self.forecast.worker_threads = worker_threads;
            }
            if let Some(progress_every) = forecast.progress_every {
                self.forecast.progress_every = progress_every;
            }
            if let Some(excluded_family) = forecast.excluded_family {
                self.forecast.excluded_family = excluded_family;
            }
        }

        if let Some(plan) = patch.plan {
            if let Some(store_count) = plan.store_count {
                self.plan.store_count = store_count;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SEASONCAST_FORECAST_OUTLIER_FACTOR") {
            self.forecast.outlier_factor = parse_f64("SEASONCAST_FORECAST_OUTLIER_FACTOR", &value)?;
        }
        if let Some(value) = read_env("SEASONCAST_FORECAST_HOLT_ALPHA") {
            self.forecast.holt_alpha = parse_f64("SEASONCAST_FORECAST_HOLT_ALPHA", &value)?;
        }
        if let Some(value) = read_env("SEASONCAST_FORECAST_HOLT_BETA") {
            self.forecast.holt_beta = parse_f64("SEASONCAST_FORECAST_HOLT_BETA", &value)?;
        }
        if let Some(value) = read_env("SEASONCAST_FORECAST_VALIDATION_MODE") {
            self.forecast.validation_mode = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "SEASONCAST_FORECAST_VALIDATION_MODE".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("SEASONCAST_FORECAST_WORKER_THREADS") {
            self.forecast.worker_threads =
                parse_usize("SEASONCAST_FORECAST_WORKER_THREADS", &value)?;
        }
        if let Some(value) = read_env("SEASONCAST_FORECAST_PROGRESS_EVERY") {
            self.forecast.progress_every =
                parse_usize("SEASONCAST_FORECAST_PROGRESS_EVERY", &value)?;
        }
        if let Some(value) = read_env("SEASONCAST_FORECAST_EXCLUDED_FAMILY") {
            self.forecast.excluded_family = value;
        }

        if let Some(value) = read_env("SEASONCAST_PLAN_STORE_COUNT") {
            self.plan.store_count = parse_u32("SEASONCAST_PLAN_STORE_COUNT", &value)?;
        }

        let log_level =
            read_env("SEASONCAST_LOGGING_LEVEL").or_else(|| read_env("SEASONCAST_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SEASONCAST_LOGGING_FORMAT").or_else(|| read_env("SEASONCAST_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(validation_mode) = overrides.validation_mode {
            self.forecast.validation_mode = validation_mode;
        }
        if let Some(worker_threads) = overrides.worker_threads {
            self.forecast.worker_threads = worker_threads;
        }
        if let Some(store_count) = overrides.store_count {
            self.plan.store_count = store_count;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_forecast(&self.forecast)?;
        validate_plan(&self.plan)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("seasoncast.toml"), PathBuf::from("config/seasoncast.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_forecast(forecast: &ForecastConfig) -> Result<(), ConfigError> {
    if !(forecast.outlier_factor.is_finite() && forecast.outlier_factor > 0.0) {
        return Err(ConfigError::Validation(
            "forecast.outlier_factor must be a positive number".to_string(),
        ));
    }

    for (key, value) in
        [("forecast.holt_alpha", forecast.holt_alpha), ("forecast.holt_beta", forecast.holt_beta)]
    {
        if !(value > 0.0 && value <= 1.0) {
            return Err(ConfigError::Validation(format!("{key} must be in range (0, 1]")));
        }
    }

    if forecast.progress_every == 0 {
        return Err(ConfigError::Validation(
            "forecast.progress_every must be greater than zero".to_string(),
        ));
    }

    if forecast.worker_threads > 256 {
        return Err(ConfigError::Validation(
            "forecast.worker_threads must be in range 0..=256 (0 = one per CPU)".to_string(),
        ));
    }

    Ok(())
}

fn validate_plan(plan: &PlanConfig) -> Result<(), ConfigError> {
    if plan.store_count == 0 {
        return Err(ConfigError::Validation(
            "plan.store_count must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    forecast: Option<ForecastPatch>,
    plan: Option<PlanPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastPatch {
    outlier_factor: Option<f64>,
    holt_alpha: Option<f64>,
    holt_beta: Option<f64>,
    validation_mode: Option<ValidationMode>,
    worker_threads: Option<usize>,
    progress_every: Option<usize>,
    excluded_family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlanPatch {
    store_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::forecast::validation::ValidationMode;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_any_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let config = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.forecast.outlier_factor == 1.5, "default outlier factor should be 1.5")?;
        ensure(config.forecast.holt_alpha == 0.3, "default alpha should be 0.3")?;
        ensure(config.forecast.holt_beta == 0.1, "default beta should be 0.1")?;
        ensure(
            config.forecast.validation_mode == ValidationMode::Full,
            "full walk-forward validation should be the default",
        )?;
        ensure(config.forecast.progress_every == 10, "progress cadence should default to 10")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SEASONCAST_EXCLUDED", "PLACEHOLDER");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("seasoncast.toml");
            fs::write(
                &path,
                r#"
[forecast]
excluded_family = "${TEST_SEASONCAST_EXCLUDED}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.forecast.excluded_family == "PLACEHOLDER",
                "excluded family should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_SEASONCAST_EXCLUDED"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SEASONCAST_LOG_LEVEL", "warn");
        env::set_var("SEASONCAST_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["SEASONCAST_LOG_LEVEL", "SEASONCAST_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SEASONCAST_FORECAST_HOLT_ALPHA", "0.5");
        env::set_var("SEASONCAST_FORECAST_VALIDATION_MODE", "reduced");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("seasoncast.toml");
            fs::write(
                &path,
                r#"
[forecast]
holt_alpha = 0.2
holt_beta = 0.25
worker_threads = 2

[plan]
store_count = 12

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    worker_threads: Some(4),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.forecast.holt_alpha == 0.5, "env alpha should win over file")?;
            ensure(config.forecast.holt_beta == 0.25, "file beta should win over default")?;
            ensure(
                config.forecast.validation_mode == ValidationMode::Reduced,
                "env validation mode should be applied",
            )?;
            ensure(config.forecast.worker_threads == 4, "override worker count should win")?;
            ensure(config.plan.store_count == 12, "file store count should be applied")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")
        })();

        clear_vars(&["SEASONCAST_FORECAST_HOLT_ALPHA", "SEASONCAST_FORECAST_VALIDATION_MODE"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SEASONCAST_FORECAST_HOLT_BETA", "1.7");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("forecast.holt_beta")
            );
            ensure(has_message, "validation failure should mention forecast.holt_beta")
        })();

        clear_vars(&["SEASONCAST_FORECAST_HOLT_BETA"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SEASONCAST_PLAN_STORE_COUNT", "many");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "SEASONCAST_PLAN_STORE_COUNT"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["SEASONCAST_PLAN_STORE_COUNT"]);
        result
    }
}
