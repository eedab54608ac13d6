pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use seasoncast_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use seasoncast_core::forecast::seasons::TargetSeason;

use crate::commands::forecast::ForecastArgs;
use crate::commands::validate::ValidateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "seasoncast",
    about = "Seasonal demand forecasting CLI",
    long_about = "Forecast next-season demand per product from a sales snapshot, validate models for a single product, and inspect configuration.",
    after_help = "Examples:\n  seasoncast forecast --input sales.json\n  seasoncast forecast --input sales.json --target next-b --plan\n  seasoncast validate --input sales.json --product 1234\n  seasoncast config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a seasoncast.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Forecast demand for every product in a sales snapshot")]
    Forecast {
        #[arg(long, help = "Sales snapshot JSON ({\"records\": [...], \"catalog\": [...]})")]
        input: PathBuf,
        #[arg(long, default_value = "next", value_parser = parse_target, help = "next | next-a | next-b")]
        target: TargetSeason,
        #[arg(long, help = "Validate only the most recent folds for faster batches")]
        reduced: bool,
        #[arg(long, help = "Worker threads (0 = one per CPU)")]
        workers: Option<usize>,
        #[arg(long, help = "Also build the per-family purchase plan")]
        plan: bool,
        #[arg(long, help = "Store count used for units per store in the plan")]
        stores: Option<u32>,
    },
    #[command(about = "Run full walk-forward validation for a single product")]
    Validate {
        #[arg(long, help = "Sales snapshot JSON")]
        input: PathBuf,
        #[arg(long, help = "Product code to validate")]
        product: String,
        #[arg(long, help = "Restrict to one family when the code appears in several")]
        family: Option<String>,
        #[arg(long, default_value = "next", value_parser = parse_target, help = "next | next-a | next-b")]
        target: TargetSeason,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

fn parse_target(value: &str) -> Result<TargetSeason, String> {
    value.parse::<TargetSeason>()
}

/// Logs go to stderr so stdout stays a single JSON payload.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let result = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = result {
        eprintln!("logging already initialised: {error}");
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let logging_options = LoadOptions {
        config_path: cli.config.clone(),
        overrides: ConfigOverrides {
            log_level: cli.log_level.clone(),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    };
    // A broken config is reported by the command itself; logging falls back to defaults.
    let logging_config = AppConfig::load(logging_options).unwrap_or_default();
    init_logging(&logging_config);

    let result = match cli.command {
        Command::Forecast { input, target, reduced, workers, plan, stores } => {
            commands::forecast::run(&ForecastArgs {
                input,
                target,
                reduced,
                workers,
                plan,
                stores,
                config_path: cli.config,
            })
        }
        Command::Validate { input, product, family, target } => {
            commands::validate::run(&ValidateArgs {
                input,
                product,
                family,
                target,
                config_path: cli.config,
            })
        }
        Command::Config => commands::config::run(cli.config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
