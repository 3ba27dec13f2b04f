use crate::error::{InsightsError, InsightsResult};
use crate::month::{AnalysisWindow, CohortMonth};
use crate::types::OrderStatus;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Longest months-since-first horizon a run may request.
pub const MAX_HORIZON_MONTHS: u32 = 120;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `STOREFRONT_INSIGHTS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default = "default_qualifying_statuses")]
    pub qualifying_statuses: Vec<OrderStatus>,
    #[serde(default)]
    pub cohorts: CohortConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_start")]
    pub start: NaiveDate,
    #[serde(default = "default_window_end")]
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CohortConfig {
    /// First cohort month included in the report slice.
    #[serde(default = "default_cohort_from")]
    pub from: Option<CohortMonth>,
    /// Last cohort month included in the report slice (inclusive).
    #[serde(default = "default_cohort_to")]
    pub to: Option<CohortMonth>,
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    #[serde(default)]
    pub fill_empty_buckets: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_orders_path")]
    pub orders_path: PathBuf,
    #[serde(default = "default_order_items_path")]
    pub order_items_path: PathBuf,
    #[serde(default)]
    pub customers_path: Option<PathBuf>,
    #[serde(default)]
    pub format: InputFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub report: ReportKind,
    #[serde(default)]
    pub format: ExportFormat,
    /// Destination file; standard output when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Which view of the pipeline output gets exported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// One row per (cohort, months-since-first).
    #[default]
    Metrics,
    /// One row per cohort with its size and first-month value.
    Cohorts,
    /// One row per cohort with a retention rate column per month.
    Matrix,
}

macro_rules! impl_from_str {
    ($ty:ty, $what:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = InsightsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(InsightsError::Config(format!(
                        concat!("unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

impl_from_str!(InputFormat, "input format", { "json" => InputFormat::Json, "csv" => InputFormat::Csv });
impl_from_str!(ExportFormat, "export format", { "json" => ExportFormat::Json, "csv" => ExportFormat::Csv });
impl_from_str!(ReportKind, "report kind", {
    "metrics" => ReportKind::Metrics,
    "cohorts" => ReportKind::Cohorts,
    "matrix" => ReportKind::Matrix,
});

// Default functions
fn default_window_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or(NaiveDate::MIN)
}
fn default_window_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MAX)
}
fn default_qualifying_statuses() -> Vec<OrderStatus> {
    vec![OrderStatus::Complete, OrderStatus::Shipped]
}
fn default_cohort_from() -> Option<CohortMonth> {
    CohortMonth::new(2023, 1).ok()
}
fn default_cohort_to() -> Option<CohortMonth> {
    CohortMonth::new(2023, 12).ok()
}
fn default_horizon_months() -> u32 {
    12
}
fn default_orders_path() -> PathBuf {
    PathBuf::from("data/orders.json")
}
fn default_order_items_path() -> PathBuf {
    PathBuf::from("data/order_items.json")
}
fn default_decimal_places() -> u32 {
    2
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: default_window_start(),
            end: default_window_end(),
        }
    }
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            from: default_cohort_from(),
            to: default_cohort_to(),
            horizon_months: default_horizon_months(),
            fill_empty_buckets: false,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            orders_path: default_orders_path(),
            order_items_path: default_order_items_path(),
            customers_path: None,
            format: InputFormat::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report: ReportKind::default(),
            format: ExportFormat::default(),
            path: None,
            decimal_places: default_decimal_places(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            qualifying_statuses: default_qualifying_statuses(),
            cohorts: CohortConfig::default(),
            snapshot: SnapshotConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables, later sources overriding earlier ones.
    pub fn load(file: Option<&Path>) -> InsightsResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("STOREFRONT_INSIGHTS")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("qualifying_statuses"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        tracing::debug!(
            file = ?file,
            orders = %config.snapshot.orders_path.display(),
            report = ?config.output.report,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Check the run parameters and turn them into engine options.
    pub fn pipeline_options(&self) -> InsightsResult<PipelineOptions> {
        let window = AnalysisWindow::new(self.window.start, self.window.end)?;
        let options = PipelineOptions::new(window, self.qualifying_statuses.iter().copied())?
            .with_cohort_range(self.cohorts.from, self.cohorts.to)?
            .with_horizon(self.cohorts.horizon_months)?;
        Ok(options.fill_empty_buckets(self.cohorts.fill_empty_buckets))
    }

    /// Validate everything checkable before any input is read.
    pub fn validate(&self) -> InsightsResult<()> {
        self.pipeline_options()?;
        if self.output.decimal_places > 10 {
            return Err(InsightsError::Config(format!(
                "decimal_places {} exceeds 10",
                self.output.decimal_places
            )));
        }
        Ok(())
    }
}

/// Validated parameters of one cohort report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    window: AnalysisWindow,
    qualifying_statuses: BTreeSet<OrderStatus>,
    cohort_from: Option<CohortMonth>,
    cohort_to: Option<CohortMonth>,
    horizon_months: u32,
    fill_empty_buckets: bool,
}

impl PipelineOptions {
    /// All cohorts in the window, horizon 12, sparse buckets.
    pub fn new(
        window: AnalysisWindow,
        statuses: impl IntoIterator<Item = OrderStatus>,
    ) -> InsightsResult<Self> {
        let qualifying_statuses: BTreeSet<OrderStatus> = statuses.into_iter().collect();
        if qualifying_statuses.is_empty() {
            return Err(InsightsError::Config(
                "qualifying status set must not be empty".into(),
            ));
        }
        Ok(Self {
            window,
            qualifying_statuses,
            cohort_from: None,
            cohort_to: None,
            horizon_months: default_horizon_months(),
            fill_empty_buckets: false,
        })
    }

    pub fn with_cohort_range(
        mut self,
        from: Option<CohortMonth>,
        to: Option<CohortMonth>,
    ) -> InsightsResult<Self> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(InsightsError::Config(format!(
                    "cohort range {from}..={to} is empty"
                )));
            }
        }
        self.cohort_from = from;
        self.cohort_to = to;
        Ok(self)
    }

    pub fn with_horizon(mut self, months: u32) -> InsightsResult<Self> {
        if months == 0 || months > MAX_HORIZON_MONTHS {
            return Err(InsightsError::Config(format!(
                "horizon of {months} months outside 1..={MAX_HORIZON_MONTHS}"
            )));
        }
        self.horizon_months = months;
        Ok(self)
    }

    pub fn fill_empty_buckets(mut self, fill: bool) -> Self {
        self.fill_empty_buckets = fill;
        self
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    pub fn is_qualifying(&self, status: OrderStatus) -> bool {
        self.qualifying_statuses.contains(&status)
    }

    pub fn qualifying_statuses(&self) -> &BTreeSet<OrderStatus> {
        &self.qualifying_statuses
    }

    /// Whether a cohort month falls inside the report slice.
    pub fn includes_cohort(&self, month: &CohortMonth) -> bool {
        self.cohort_from.is_none_or(|from| *month >= from)
            && self.cohort_to.is_none_or(|to| *month <= to)
    }

    pub fn horizon_months(&self) -> u32 {
        self.horizon_months
    }

    pub fn fills_empty_buckets(&self) -> bool {
        self.fill_empty_buckets
    }
}
