//! Per-bucket retention metrics, cumulative lifetime value, and the
//! month-over-month annotations layered on top.

use crate::activity::ActivityRecord;
use crate::assignment::{ratio, Cohort};
use crate::labels::{Benchmark, RetentionPhase};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storefront_core::CohortMonth;

/// Aggregates for one (cohort, months-since-first) bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketMetric {
    pub cohort_month: CohortMonth,
    pub months_since_first: u32,
    pub cohort_size: u64,
    pub retained_customers: u64,
    pub retention_rate_pct: Option<Decimal>,
    pub churn_rate_pct: Option<Decimal>,
    pub total_orders_in_month: u64,
    pub total_revenue_in_month: Decimal,
    pub avg_revenue_per_retained_customer: Option<Decimal>,
    pub retention_phase: RetentionPhase,
}

/// `100 × part / whole`, undefined when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> Option<Decimal> {
    ratio(Decimal::from(part) * Decimal::ONE_HUNDRED, whole)
}

impl BucketMetric {
    fn new(
        cohort: &Cohort,
        months_since_first: u32,
        retained_customers: u64,
        total_orders_in_month: u64,
        total_revenue_in_month: Decimal,
    ) -> Self {
        let size = cohort.cohort_size;
        Self {
            cohort_month: cohort.cohort_month,
            months_since_first,
            cohort_size: size,
            retained_customers,
            retention_rate_pct: percentage(retained_customers, size),
            churn_rate_pct: percentage(size.saturating_sub(retained_customers), size),
            total_orders_in_month,
            total_revenue_in_month,
            avg_revenue_per_retained_customer: ratio(total_revenue_in_month, retained_customers),
            retention_phase: RetentionPhase::for_month(months_since_first),
        }
    }
}

/// Group activity records into buckets, one `Vec` per cohort, each ordered by
/// ascending months-since-first. Cohort sizes come from `cohorts` and are
/// never recomputed from the activity. Records whose cohort is not in
/// `cohorts` are ignored.
///
/// `dense_until` maps a cohort to the last months-since-first to emit even
/// when nobody was active; cohorts missing from it get sparse output.
pub fn aggregate_buckets(
    cohorts: &BTreeMap<CohortMonth, Cohort>,
    activity: &[ActivityRecord],
    dense_until: &BTreeMap<CohortMonth, u32>,
) -> BTreeMap<CohortMonth, Vec<BucketMetric>> {
    #[derive(Default)]
    struct Totals {
        customers: u64,
        orders: u64,
        revenue: Decimal,
    }

    let mut totals: BTreeMap<(CohortMonth, u32), Totals> = BTreeMap::new();
    for record in activity {
        let entry = totals
            .entry((record.cohort_month, record.months_since_first))
            .or_default();
        // one record per customer and bucket
        entry.customers += 1;
        entry.orders += record.order_count;
        entry.revenue += record.revenue;
    }

    for (month, last) in dense_until {
        for k in 0..=*last {
            totals.entry((*month, k)).or_default();
        }
    }

    let mut by_cohort: BTreeMap<CohortMonth, Vec<BucketMetric>> = BTreeMap::new();
    for ((month, k), t) in totals {
        let Some(cohort) = cohorts.get(&month) else {
            continue;
        };
        by_cohort
            .entry(month)
            .or_default()
            .push(BucketMetric::new(cohort, k, t.customers, t.orders, t.revenue));
    }
    by_cohort
}

/// Running revenue totals at one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CumulativeValue {
    pub cumulative_revenue: Decimal,
    /// Cumulative revenue over the initial cohort size.
    pub cumulative_ltv_per_customer: Option<Decimal>,
}

/// Prefix sum of monthly revenue over one cohort's buckets, which must be
/// ordered by ascending months-since-first.
pub fn accumulate_ltv(buckets: &[BucketMetric]) -> Vec<CumulativeValue> {
    buckets
        .iter()
        .scan(Decimal::ZERO, |running, bucket| {
            *running += bucket.total_revenue_in_month;
            Some(CumulativeValue {
                cumulative_revenue: *running,
                cumulative_ltv_per_customer: ratio(*running, bucket.cohort_size),
            })
        })
        .collect()
}

/// A fully annotated row of the retention report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortMetric {
    pub cohort_month: CohortMonth,
    pub months_since_first: u32,
    pub cohort_size: u64,
    pub retained_customers: u64,
    pub retention_rate_pct: Option<Decimal>,
    pub churn_rate_pct: Option<Decimal>,
    pub total_orders_in_month: u64,
    pub total_revenue_in_month: Decimal,
    pub avg_revenue_per_retained_customer: Option<Decimal>,
    pub cumulative_revenue: Decimal,
    pub cumulative_ltv_per_customer: Option<Decimal>,
    pub retention_phase: RetentionPhase,
    pub retention_change_from_prior_month: Option<Decimal>,
    pub benchmark: Option<Benchmark>,
}

/// Attach cumulative value, month-over-month retention change and benchmark
/// verdict to one cohort's buckets.
///
/// The prior month of bucket `k` is bucket `k - 1`. A bucket missing from
/// sparse output had nobody active, so its retention counts as zero.
pub fn annotate(buckets: &[BucketMetric], cumulative: &[CumulativeValue]) -> Vec<CohortMetric> {
    let rate_at: BTreeMap<u32, Option<Decimal>> = buckets
        .iter()
        .map(|b| (b.months_since_first, b.retention_rate_pct))
        .collect();

    buckets
        .iter()
        .zip(cumulative)
        .map(|(b, c)| {
            let retention_change_from_prior_month = match b.months_since_first {
                0 => None,
                k => {
                    let prior = rate_at.get(&(k - 1)).copied().unwrap_or(Some(Decimal::ZERO));
                    b.retention_rate_pct.zip(prior).map(|(now, before)| now - before)
                }
            };
            CohortMetric {
                cohort_month: b.cohort_month,
                months_since_first: b.months_since_first,
                cohort_size: b.cohort_size,
                retained_customers: b.retained_customers,
                retention_rate_pct: b.retention_rate_pct,
                churn_rate_pct: b.churn_rate_pct,
                total_orders_in_month: b.total_orders_in_month,
                total_revenue_in_month: b.total_revenue_in_month,
                avg_revenue_per_retained_customer: b.avg_revenue_per_retained_customer,
                cumulative_revenue: c.cumulative_revenue,
                cumulative_ltv_per_customer: c.cumulative_ltv_per_customer,
                retention_phase: b.retention_phase,
                retention_change_from_prior_month,
                benchmark: Benchmark::classify(b.months_since_first, b.retention_rate_pct),
            }
        })
        .collect()
}
