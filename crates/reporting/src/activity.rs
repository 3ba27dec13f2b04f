//! Monthly activity bucketing.

use crate::assignment::{CohortAssignment, QualifyingOrder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use storefront_core::types::{CustomerId, OrderId};
use storefront_core::CohortMonth;

/// What one customer did in one calendar month after acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub cohort_month: CohortMonth,
    pub customer_id: CustomerId,
    pub activity_month: CohortMonth,
    pub months_since_first: u32,
    pub order_count: u64,
    pub revenue: Decimal,
}

#[derive(Default)]
struct Bucket {
    orders: BTreeSet<OrderId>,
    revenue: Decimal,
}

/// One record per (customer, activity month) with months-since-first in
/// `0..=horizon`. Customers outside `assignment` are ignored. Output is
/// ordered by cohort month, months-since-first, then customer.
pub fn bucket_activity(
    assignment: &CohortAssignment,
    orders: &[QualifyingOrder],
    horizon_months: u32,
) -> Vec<ActivityRecord> {
    let mut buckets: BTreeMap<(CohortMonth, u32, CustomerId), Bucket> = BTreeMap::new();

    for order in orders {
        let Some(cohort) = assignment.get(&order.customer_id) else {
            continue;
        };
        if order.created_at < cohort.first_purchase_at {
            continue;
        }
        let activity_month = CohortMonth::of(&order.created_at);
        let Ok(months_since_first) = u32::try_from(cohort.cohort_month.months_until(&activity_month))
        else {
            continue;
        };
        if months_since_first > horizon_months {
            continue;
        }

        let bucket = buckets
            .entry((cohort.cohort_month, months_since_first, order.customer_id))
            .or_default();
        bucket.orders.insert(order.order_id);
        bucket.revenue += order.revenue;
    }

    buckets
        .into_iter()
        .map(|((cohort_month, months_since_first, customer_id), bucket)| ActivityRecord {
            cohort_month,
            customer_id,
            activity_month: cohort_month.plus_months(months_since_first),
            months_since_first,
            order_count: bucket.orders.len() as u64,
            revenue: bucket.revenue,
        })
        .collect()
}
