pub mod config;
pub mod domain;
pub mod errors;
pub mod forecast;
pub mod snapshot;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::forecast::{
    AccuracyMetrics, AggregateAccuracy, ForecastBatchResult, ForecastFeatures, ForecastMethod,
    ForecastRecord, TrendDirection,
};
pub use domain::product::{ProductCatalog, ProductCode, ProductInfo};
pub use domain::sales::{ProductKey, RawSalesRow, SalesRecord};
pub use domain::season::{SeasonSpec, SeasonType};
pub use errors::{ApplicationError, DomainError};
pub use forecast::cancel::CancellationToken;
pub use forecast::ensemble::{EnsembleCombiner, EnsembleOutcome, ModelPrediction};
pub use forecast::models::{ModelKind, ModelParams};
pub use forecast::orchestrator::{
    ForecastOrchestrator, ForecastSettings, ProductValidation, ProgressUpdate,
};
pub use forecast::plan::{build_purchase_plan, PlanSection, PurchasePlan};
pub use forecast::seasons::TargetSeason;
pub use forecast::validation::ValidationMode;
pub use snapshot::{LoadedSnapshot, SalesSnapshot};
