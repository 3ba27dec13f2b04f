//! Cohort analysis: retention curves and lifetime value by acquisition month.

use crate::activity::bucket_activity;
use crate::assignment::{assign_cohorts, qualifying_orders, size_cohorts, Cohort};
use crate::retention::{accumulate_ltv, aggregate_buckets, annotate, CohortMetric};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use storefront_core::types::Snapshot;
use storefront_core::{CohortMonth, PipelineOptions};
use tracing::{debug, info};

/// Output of one run: cohort sizes and the annotated retention rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortReport {
    pub horizon_months: u32,
    /// Last calendar month the analysis window reaches into.
    pub observed_until: CohortMonth,
    /// Cohort month descending.
    pub cohorts: Vec<Cohort>,
    /// Cohort month descending, then months-since-first ascending.
    pub metrics: Vec<CohortMetric>,
}

/// One line of the retention matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortRow {
    pub cohort_month: CohortMonth,
    pub initial_size: u64,
    /// Index `k` holds the retention rate at months-since-first `k`.
    pub retention_rates: Vec<Option<Decimal>>,
}

impl CohortReport {
    /// Pivot the metric rows into one row per cohort with `horizon + 1`
    /// rates. Buckets without a row had nobody active and read as zero;
    /// months past `observed_until` have not happened yet and read as `None`.
    pub fn retention_matrix(&self) -> Vec<CohortRow> {
        let mut rates: BTreeMap<(CohortMonth, u32), Option<Decimal>> = BTreeMap::new();
        for m in &self.metrics {
            rates.insert((m.cohort_month, m.months_since_first), m.retention_rate_pct);
        }

        self.cohorts
            .iter()
            .map(|c| CohortRow {
                cohort_month: c.cohort_month,
                initial_size: c.cohort_size,
                retention_rates: (0..=self.horizon_months)
                    .map(|k| {
                        if c.cohort_month.plus_months(k) > self.observed_until {
                            return None;
                        }
                        rates
                            .get(&(c.cohort_month, k))
                            .copied()
                            .unwrap_or(Some(Decimal::ZERO))
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn metrics_for(&self, cohort_month: &CohortMonth) -> impl Iterator<Item = &CohortMetric> {
        let month = *cohort_month;
        self.metrics.iter().filter(move |m| m.cohort_month == month)
    }
}

/// Runs the retention pipeline over a snapshot:
/// qualify → assign → size → bucket → aggregate → accumulate → annotate.
pub struct CohortAnalyzer {
    options: PipelineOptions,
}

impl CohortAnalyzer {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn analyze(&self, snapshot: &Snapshot) -> CohortReport {
        let started = Instant::now();
        let options = &self.options;

        let orders = qualifying_orders(snapshot, options);
        debug!(qualifying_orders = orders.len(), "Qualifying orders selected");

        // Assignment is global so that earlier purchases outside the slice
        // still decide a customer's cohort.
        let assignment = assign_cohorts(&orders);
        let in_slice = assignment.restricted_to(|m| options.includes_cohort(m));
        debug!(
            customers = assignment.len(),
            in_slice = in_slice.len(),
            "Cohorts assigned"
        );

        let cohorts = size_cohorts(&in_slice, &orders);
        let activity = bucket_activity(&in_slice, &orders, options.horizon_months());
        debug!(cohorts = cohorts.len(), activity_records = activity.len(), "Activity bucketed");

        let dense_until = if options.fills_empty_buckets() {
            self.observable_months(&cohorts)
        } else {
            BTreeMap::new()
        };
        let buckets = aggregate_buckets(&cohorts, &activity, &dense_until);

        let mut rows = Vec::new();
        for cohort_buckets in buckets.values().rev() {
            let cumulative = accumulate_ltv(cohort_buckets);
            rows.extend(annotate(cohort_buckets, &cumulative));
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::counter!("cohort.cohorts_computed").increment(cohorts.len() as u64);
        metrics::counter!("cohort.rows_emitted").increment(rows.len() as u64);
        metrics::histogram!("cohort.pipeline_duration_ms").record(elapsed_ms);
        info!(
            cohorts = cohorts.len(),
            rows = rows.len(),
            elapsed_ms,
            "Cohort retention computed"
        );

        CohortReport {
            horizon_months: options.horizon_months(),
            observed_until: options.window().last_month(),
            cohorts: cohorts.into_values().rev().collect(),
            metrics: rows,
        }
    }

    /// Last months-since-first each cohort could have been observed at,
    /// capped by the horizon.
    fn observable_months(&self, cohorts: &BTreeMap<CohortMonth, Cohort>) -> BTreeMap<CohortMonth, u32> {
        let last = self.options.window().last_month();
        cohorts
            .keys()
            .filter_map(|month| {
                let elapsed = u32::try_from(month.months_until(&last)).ok()?;
                Some((*month, elapsed.min(self.options.horizon_months())))
            })
            .collect()
    }
}
