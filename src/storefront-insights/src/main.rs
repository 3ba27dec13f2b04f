//! Storefront Insights: cohort retention and lifetime value reports.
//!
//! Loads an orders/order-items snapshot, runs the retention pipeline and
//! writes the requested report as JSON or CSV.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use storefront_analytics::{FileSnapshotSource, SnapshotLoader};
use storefront_core::config::{AppConfig, ExportFormat, InputFormat, ReportKind};
use storefront_core::{CohortMonth, PipelineOptions};
use storefront_reporting::{CohortAnalyzer, ReportBuilder};
use tracing::{error, info, Instrument};

#[derive(Parser, Debug)]
#[command(name = "storefront-insights")]
#[command(about = "Cohort retention and lifetime value reports over an order snapshot")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Orders file (overrides config)
    #[arg(long, env = "STOREFRONT_INSIGHTS__SNAPSHOT__ORDERS_PATH")]
    orders: Option<PathBuf>,

    /// Order items file (overrides config)
    #[arg(long, env = "STOREFRONT_INSIGHTS__SNAPSHOT__ORDER_ITEMS_PATH")]
    order_items: Option<PathBuf>,

    /// Customers file (optional)
    #[arg(long)]
    customers: Option<PathBuf>,

    /// Input file format: json or csv
    #[arg(long)]
    input_format: Option<InputFormat>,

    /// Inclusive start of the analysis window (YYYY-MM-DD)
    #[arg(long)]
    window_start: Option<NaiveDate>,

    /// Exclusive end of the analysis window (YYYY-MM-DD)
    #[arg(long)]
    window_end: Option<NaiveDate>,

    /// First cohort month in the report (YYYY-MM)
    #[arg(long)]
    cohort_from: Option<CohortMonth>,

    /// Last cohort month in the report, inclusive (YYYY-MM)
    #[arg(long)]
    cohort_to: Option<CohortMonth>,

    /// Report every cohort in the window
    #[arg(long, default_value_t = false, conflicts_with_all = ["cohort_from", "cohort_to"])]
    all_cohorts: bool,

    /// Largest months-since-first to report
    #[arg(long)]
    horizon: Option<u32>,

    /// Report kind: metrics, cohorts or matrix
    #[arg(long)]
    report: Option<ReportKind>,

    /// Output format: json or csv
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Output file; standard output when absent
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Emit buckets with no activity as explicit zero rows
    #[arg(long, default_value_t = false)]
    fill_empty_buckets: bool,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(path) = self.orders {
            config.snapshot.orders_path = path;
        }
        if let Some(path) = self.order_items {
            config.snapshot.order_items_path = path;
        }
        if self.customers.is_some() {
            config.snapshot.customers_path = self.customers;
        }
        if let Some(format) = self.input_format {
            config.snapshot.format = format;
        }
        if let Some(start) = self.window_start {
            config.window.start = start;
        }
        if let Some(end) = self.window_end {
            config.window.end = end;
        }
        if self.all_cohorts {
            config.cohorts.from = None;
            config.cohorts.to = None;
        }
        if self.cohort_from.is_some() {
            config.cohorts.from = self.cohort_from;
        }
        if self.cohort_to.is_some() {
            config.cohorts.to = self.cohort_to;
        }
        if let Some(horizon) = self.horizon {
            config.cohorts.horizon_months = horizon;
        }
        if self.fill_empty_buckets {
            config.cohorts.fill_empty_buckets = true;
        }
        if let Some(report) = self.report {
            config.output.report = report;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.output.is_some() {
            config.output.path = self.output;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "storefront_insights=info,storefront_reporting=info,storefront_analytics=info"
                    .into()
            }),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;
    let options = config.pipeline_options()?;

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("report_run", %run_id);

    let result = run(config, options).instrument(span).await;
    if let Err(e) = &result {
        error!(%run_id, error = %e, "Report run failed");
    }
    result
}

async fn run(config: AppConfig, options: PipelineOptions) -> anyhow::Result<()> {
    info!(
        window_start = %config.window.start,
        window_end = %config.window.end,
        statuses = ?options.qualifying_statuses(),
        horizon = options.horizon_months(),
        report = ?config.output.report,
        format = ?config.output.format,
        "Configuration loaded"
    );

    let loader = SnapshotLoader::new(FileSnapshotSource::from_config(&config.snapshot));
    let snapshot = loader.load().await?;

    let report = CohortAnalyzer::new(options).analyze(&snapshot);
    let rendered = ReportBuilder::from_config(&config.output).render(
        &report,
        config.output.report,
        config.output.format,
    )?;

    match &config.output.path {
        Some(path) => {
            tokio::fs::write(path, rendered.as_bytes())
                .await
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), bytes = rendered.len(), "Report written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
