//! The demand-forecasting engine, leaf to root: outlier trimming, season
//! handling, per-product aggregation, the four models, walk-forward
//! validation, the inverse-error ensemble, hierarchy fallback and the batch
//! orchestrator.

pub mod aggregate;
pub mod cancel;
pub mod ensemble;
pub mod fallback;
pub mod models;
pub mod orchestrator;
pub mod outlier;
pub mod plan;
pub mod seasons;
pub mod stats;
pub mod validation;
