//! Cohort assignment and sizing: who belongs to which acquisition month, how
//! big each cohort is, and what its members spent in that first month.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use storefront_core::types::{CustomerId, OrderId, Snapshot};
use storefront_core::{CohortMonth, PipelineOptions};

/// An order that counts toward retention, with its item revenue attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifyingOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub revenue: Decimal,
}

/// Orders with a qualifying status inside the analysis window. Item revenue
/// is joined by order id; an order without items has zero revenue.
pub fn qualifying_orders(snapshot: &Snapshot, options: &PipelineOptions) -> Vec<QualifyingOrder> {
    let mut revenue_by_order: HashMap<OrderId, Decimal> = HashMap::new();
    for item in &snapshot.order_items {
        *revenue_by_order.entry(item.order_id).or_default() += item.sale_price;
    }

    let mut orders: Vec<QualifyingOrder> = snapshot
        .orders
        .iter()
        .filter(|o| options.is_qualifying(o.status) && options.window().contains(&o.created_at))
        .map(|o| QualifyingOrder {
            order_id: o.id,
            customer_id: o.customer_id,
            created_at: o.created_at,
            revenue: revenue_by_order.get(&o.id).copied().unwrap_or_default(),
        })
        .collect();
    orders.sort_by_key(|o| (o.customer_id, o.created_at, o.order_id));
    orders
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCohort {
    pub cohort_month: CohortMonth,
    pub first_purchase_at: DateTime<Utc>,
}

/// Customer → cohort mapping. Customers without qualifying orders are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortAssignment {
    customers: BTreeMap<CustomerId, CustomerCohort>,
}

impl CohortAssignment {
    pub fn get(&self, customer: &CustomerId) -> Option<&CustomerCohort> {
        self.customers.get(customer)
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CustomerId, &CustomerCohort)> {
        self.customers.iter()
    }

    /// Keep only customers whose cohort satisfies `keep`.
    pub fn restricted_to(&self, keep: impl Fn(&CohortMonth) -> bool) -> Self {
        Self {
            customers: self
                .customers
                .iter()
                .filter(|(_, c)| keep(&c.cohort_month))
                .map(|(id, c)| (*id, *c))
                .collect(),
        }
    }
}

/// Each customer's cohort is the month of their earliest qualifying order.
pub fn assign_cohorts(orders: &[QualifyingOrder]) -> CohortAssignment {
    let mut first: BTreeMap<CustomerId, DateTime<Utc>> = BTreeMap::new();
    for order in orders {
        first
            .entry(order.customer_id)
            .and_modify(|ts| *ts = (*ts).min(order.created_at))
            .or_insert(order.created_at);
    }

    CohortAssignment {
        customers: first
            .into_iter()
            .map(|(customer, first_purchase_at)| {
                (
                    customer,
                    CustomerCohort {
                        cohort_month: CohortMonth::of(&first_purchase_at),
                        first_purchase_at,
                    },
                )
            })
            .collect(),
    }
}

/// Size and first-month value of one acquisition cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub cohort_month: CohortMonth,
    pub cohort_size: u64,
    /// Mean over members of their revenue across all qualifying orders in the
    /// cohort month, not just the single first transaction.
    pub avg_first_order_value: Option<Decimal>,
}

/// Cohorts keyed by month, ascending.
pub fn size_cohorts(
    assignment: &CohortAssignment,
    orders: &[QualifyingOrder],
) -> BTreeMap<CohortMonth, Cohort> {
    let mut members: BTreeMap<CohortMonth, u64> = BTreeMap::new();
    for (_, cohort) in assignment.iter() {
        *members.entry(cohort.cohort_month).or_default() += 1;
    }

    let mut first_month_revenue: BTreeMap<CohortMonth, Decimal> = BTreeMap::new();
    for order in orders {
        let Some(cohort) = assignment.get(&order.customer_id) else {
            continue;
        };
        if CohortMonth::of(&order.created_at) == cohort.cohort_month {
            *first_month_revenue.entry(cohort.cohort_month).or_default() += order.revenue;
        }
    }

    members
        .into_iter()
        .map(|(month, size)| {
            let revenue = first_month_revenue.get(&month).copied().unwrap_or_default();
            (
                month,
                Cohort {
                    cohort_month: month,
                    cohort_size: size,
                    avg_first_order_value: ratio(revenue, size),
                },
            )
        })
        .collect()
}

/// `numerator / denominator`, undefined for an empty denominator.
pub(crate) fn ratio(numerator: Decimal, denominator: u64) -> Option<Decimal> {
    numerator.checked_div(Decimal::from(denominator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use storefront_core::types::OrderStatus;

    #[test]
    fn test_qualifying_filters_status_and_window() {
        let snapshot = SnapshotBuilder::new()
            .order(1, 10, OrderStatus::Complete, ts(2023, 1, 5), &[dec("10.00")])
            .order(2, 10, OrderStatus::Cancelled, ts(2023, 1, 6), &[dec("99.00")])
            .order(3, 11, OrderStatus::Shipped, ts(2018, 12, 31), &[dec("5.00")])
            .order(4, 12, OrderStatus::Shipped, ts(2025, 1, 1), &[dec("5.00")])
            .order(5, 13, OrderStatus::Processing, ts(2023, 3, 1), &[dec("5.00")])
            .build();
        let orders = qualifying_orders(&snapshot, &default_options());
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, 1);
        assert_eq!(orders[0].revenue, dec("10.00"));
    }

    #[test]
    fn test_order_without_items_has_zero_revenue() {
        let snapshot = SnapshotBuilder::new()
            .order(1, 10, OrderStatus::Complete, ts(2023, 1, 5), &[])
            .build();
        let orders = qualifying_orders(&snapshot, &default_options());
        assert_eq!(orders[0].revenue, Decimal::ZERO);
    }

    #[test]
    fn test_cohort_is_month_of_earliest_order() {
        let snapshot = SnapshotBuilder::new()
            .order(1, 10, OrderStatus::Complete, ts(2023, 3, 20), &[dec("1")])
            .order(2, 10, OrderStatus::Shipped, ts(2023, 2, 27), &[dec("1")])
            .order(3, 11, OrderStatus::Complete, ts(2023, 3, 1), &[dec("1")])
            .order(4, 12, OrderStatus::Returned, ts(2023, 1, 1), &[dec("1")])
            .build();
        let assignment = assign_cohorts(&qualifying_orders(&snapshot, &default_options()));
        assert_eq!(assignment.len(), 2);
        let c10 = assignment.get(&10).unwrap();
        assert_eq!(c10.cohort_month, month("2023-02"));
        assert_eq!(c10.first_purchase_at, ts(2023, 2, 27));
        assert_eq!(assignment.get(&11).unwrap().cohort_month, month("2023-03"));
        assert!(assignment.get(&12).is_none());
    }

    #[test]
    fn test_first_month_value_counts_every_order_in_cohort_month() {
        let snapshot = SnapshotBuilder::new()
            .order(1, 10, OrderStatus::Complete, ts(2023, 1, 2), &[dec("30"), dec("10")])
            .order(2, 10, OrderStatus::Complete, ts(2023, 1, 25), &[dec("20")])
            .order(3, 10, OrderStatus::Complete, ts(2023, 2, 1), &[dec("500")])
            .order(4, 11, OrderStatus::Shipped, ts(2023, 1, 9), &[])
            .build();
        let orders = qualifying_orders(&snapshot, &default_options());
        let cohorts = size_cohorts(&assign_cohorts(&orders), &orders);
        let jan = &cohorts[&month("2023-01")];
        assert_eq!(jan.cohort_size, 2);
        // (60 + 0) / 2
        assert_eq!(jan.avg_first_order_value, Some(dec("30")));
    }

    #[test]
    fn test_restricted_to_slice() {
        let snapshot = SnapshotBuilder::new()
            .order(1, 10, OrderStatus::Complete, ts(2022, 12, 2), &[])
            .order(2, 11, OrderStatus::Complete, ts(2023, 1, 2), &[])
            .build();
        let assignment = assign_cohorts(&qualifying_orders(&snapshot, &default_options()));
        let slice = assignment.restricted_to(|m| m.year() == 2023);
        assert_eq!(slice.len(), 1);
        assert!(slice.get(&11).is_some());
    }

    #[test]
    fn test_ratio_with_zero_denominator() {
        assert_eq!(ratio(dec("10"), 0), None);
        assert_eq!(ratio(dec("10"), 4), Some(dec("2.5")));
    }
}
