pub mod config;
pub mod error;
pub mod month;
pub mod types;

pub use config::{AppConfig, PipelineOptions};
pub use error::{InsightsError, InsightsResult};
pub use month::{AnalysisWindow, CohortMonth};
