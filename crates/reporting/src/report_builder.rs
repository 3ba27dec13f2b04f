//! Report builder: turn a cohort report into a table and export it as CSV or
//! JSON. Output is deterministic for a given report and settings.

use crate::cohort::CohortReport;
use csv::{QuoteStyle, WriterBuilder};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use storefront_core::config::{ExportFormat, OutputConfig, ReportKind};
use storefront_core::{InsightsError, InsightsResult};

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Integer(u64),
    Decimal(Decimal),
    Missing,
}

impl Cell {
    fn text(value: impl ToString) -> Self {
        Cell::Text(value.to_string())
    }

    fn opt_text(value: Option<impl ToString>) -> Self {
        value.map_or(Cell::Missing, |v| Cell::text(v))
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Integer(n) => serializer.serialize_u64(*n),
            Cell::Decimal(d) => serialize_decimal(d, serializer),
            Cell::Missing => serializer.serialize_none(),
        }
    }
}

/// A rendered table: named columns and rows of cells in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutput {
    pub kind: ReportKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub decimal_places: u32,
}

impl ReportOutput {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

struct Record<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

struct Records<'a>(&'a ReportOutput);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let output = self.0;
        let mut seq = serializer.serialize_seq(Some(output.rows.len()))?;
        for row in &output.rows {
            seq.serialize_element(&Record {
                columns: &output.columns,
                cells: row,
            })?;
        }
        seq.end()
    }
}

/// Largest mantissa whose digits survive a trip through `f64` unchanged.
const F64_EXACT_MANTISSA: u128 = 1_000_000_000_000_000;

/// Decimals go out as JSON numbers when the shortest `f64` form prints the
/// same digits, and as strings otherwise so that no digits are lost.
fn serialize_decimal<S: Serializer>(d: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let text = d.normalize().to_string();
    if d.mantissa().unsigned_abs() < F64_EXACT_MANTISSA {
        if let Ok(f) = text.parse::<f64>() {
            return serializer.serialize_f64(f);
        }
    }
    serializer.serialize_str(&text)
}

// ─── Report Builder ─────────────────────────────────────────────────────────

pub struct ReportBuilder {
    decimal_places: u32,
}

impl ReportBuilder {
    pub fn new(decimal_places: u32) -> Self {
        Self { decimal_places }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.decimal_places)
    }

    /// Generate the table for `kind` and export it in `format`.
    pub fn render(
        &self,
        report: &CohortReport,
        kind: ReportKind,
        format: ExportFormat,
    ) -> InsightsResult<String> {
        let output = self.generate(report, kind);
        match format {
            ExportFormat::Csv => self.export_csv(&output),
            ExportFormat::Json => self.export_json(&output),
        }
    }

    pub fn generate(&self, report: &CohortReport, kind: ReportKind) -> ReportOutput {
        let (columns, rows) = match kind {
            ReportKind::Metrics => self.gen_metrics(report),
            ReportKind::Cohorts => self.gen_cohorts(report),
            ReportKind::Matrix => self.gen_matrix(report),
        };
        ReportOutput {
            kind,
            columns,
            rows,
            decimal_places: self.decimal_places,
        }
    }

    /// Text cells and headers are always quoted. Numbers and missing values
    /// are written bare, so a missing value is an empty field.
    pub fn export_csv(&self, output: &ReportOutput) -> InsightsResult<String> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Never)
            .from_writer(Vec::new());
        writer.write_record(output.columns.iter().map(|c| quoted(c)))?;
        for row in &output.rows {
            writer.write_record(row.iter().map(|cell| csv_field(cell, output.decimal_places)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| InsightsError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| InsightsError::Internal(e.into()))
    }

    pub fn export_json(&self, output: &ReportOutput) -> InsightsResult<String> {
        Ok(serde_json::to_string_pretty(&Records(output))?)
    }

    fn round(&self, value: Decimal) -> Cell {
        let rounded =
            value.round_dp_with_strategy(self.decimal_places, RoundingStrategy::MidpointAwayFromZero);
        // no "-0.00" in the output
        Cell::Decimal(if rounded.is_zero() { Decimal::ZERO } else { rounded })
    }

    fn opt_round(&self, value: Option<Decimal>) -> Cell {
        value.map_or(Cell::Missing, |v| self.round(v))
    }

    // ─── Table generators ───────────────────────────────────────────────────

    fn gen_metrics(&self, report: &CohortReport) -> (Vec<String>, Vec<Vec<Cell>>) {
        let cols = vec![
            "cohort_month",
            "months_since_first",
            "cohort_size",
            "retained_customers",
            "retention_rate_pct",
            "churn_rate_pct",
            "total_orders_in_month",
            "total_revenue_in_month",
            "avg_revenue_per_retained_customer",
            "cumulative_revenue",
            "cumulative_ltv_per_customer",
            "retention_phase",
            "retention_change_from_prior_month",
            "benchmark",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let rows = report
            .metrics
            .iter()
            .map(|m| {
                vec![
                    Cell::text(m.cohort_month),
                    Cell::Integer(m.months_since_first as u64),
                    Cell::Integer(m.cohort_size),
                    Cell::Integer(m.retained_customers),
                    self.opt_round(m.retention_rate_pct),
                    self.opt_round(m.churn_rate_pct),
                    Cell::Integer(m.total_orders_in_month),
                    self.round(m.total_revenue_in_month),
                    self.opt_round(m.avg_revenue_per_retained_customer),
                    self.round(m.cumulative_revenue),
                    self.opt_round(m.cumulative_ltv_per_customer),
                    Cell::text(m.retention_phase),
                    self.opt_round(m.retention_change_from_prior_month),
                    Cell::opt_text(m.benchmark),
                ]
            })
            .collect();

        (cols, rows)
    }

    fn gen_cohorts(&self, report: &CohortReport) -> (Vec<String>, Vec<Vec<Cell>>) {
        let cols = vec!["cohort_month", "cohort_size", "avg_first_order_value"]
            .into_iter()
            .map(String::from)
            .collect();

        let rows = report
            .cohorts
            .iter()
            .map(|c| {
                vec![
                    Cell::text(c.cohort_month),
                    Cell::Integer(c.cohort_size),
                    self.opt_round(c.avg_first_order_value),
                ]
            })
            .collect();

        (cols, rows)
    }

    fn gen_matrix(&self, report: &CohortReport) -> (Vec<String>, Vec<Vec<Cell>>) {
        let mut cols: Vec<String> = vec!["cohort_month".into(), "initial_size".into()];
        cols.extend((0..=report.horizon_months).map(|k| format!("month_{k}")));

        let rows = report
            .retention_matrix()
            .into_iter()
            .map(|row| {
                let mut cells = vec![Cell::text(row.cohort_month), Cell::Integer(row.initial_size)];
                cells.extend(row.retention_rates.into_iter().map(|r| self.opt_round(r)));
                cells
            })
            .collect();

        (cols, rows)
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(2)
    }
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn csv_field(cell: &Cell, decimal_places: u32) -> String {
    match cell {
        Cell::Text(s) => quoted(s),
        Cell::Integer(n) => n.to_string(),
        Cell::Decimal(d) => format!("{:.*}", decimal_places as usize, d),
        Cell::Missing => String::new(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
