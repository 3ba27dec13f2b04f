use std::path::PathBuf;
use thiserror::Error;

pub type InsightsResult<T> = Result<T, InsightsError>;

/// Terminal failures of a report run. Zero denominators are not errors:
/// ratio fields come back as `None` instead.
#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input unavailable: {collection} at {}: {reason}", .path.display())]
    InputUnavailable {
        collection: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl InsightsError {
    pub fn input_unavailable(
        collection: &'static str,
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        Self::InputUnavailable {
            collection,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for InsightsError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
