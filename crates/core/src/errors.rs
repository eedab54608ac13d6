use thiserror::Error;

use crate::config::ConfigError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unrecognised season label `{0}`")]
    InvalidSeasonLabel(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("ingestion failure: {0}")]
    Ingestion(String),
    #[error("worker pool failure: {0}")]
    WorkerPool(String),
}

impl ApplicationError {
    /// Stable machine-readable class used in structured command output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain_validation",
            Self::Configuration(_) => "config_validation",
            Self::Ingestion(_) => "ingestion",
            Self::WorkerPool(_) => "runtime",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) | Self::Ingestion(_) => {
                "The sales snapshot could not be processed. Check the input file and try again."
            }
            Self::Configuration(_) => "The configuration is invalid. Run `seasoncast config`.",
            Self::WorkerPool(_) => "The forecast runtime could not be started.",
        }
    }
}
