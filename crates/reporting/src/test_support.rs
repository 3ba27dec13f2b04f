//! Fixtures shared by the unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use storefront_core::types::{Order, OrderItem, OrderStatus, Snapshot};
use storefront_core::{AnalysisWindow, CohortMonth, PipelineOptions};

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn month(s: &str) -> CohortMonth {
    s.parse().unwrap()
}

pub fn window_until(y: i32, m: u32, d: u32) -> AnalysisWindow {
    AnalysisWindow::new(
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(y, m, d).unwrap(),
    )
    .unwrap()
}

/// [2019-01-01, 2025-01-01), Complete + Shipped, every cohort, horizon 12.
pub fn default_options() -> PipelineOptions {
    PipelineOptions::new(
        window_until(2025, 1, 1),
        [OrderStatus::Complete, OrderStatus::Shipped],
    )
    .unwrap()
}

#[derive(Default)]
pub struct SnapshotBuilder {
    orders: Vec<Order>,
    items: Vec<OrderItem>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an order with one item per price.
    pub fn order(
        mut self,
        id: u64,
        customer_id: u64,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        prices: &[Decimal],
    ) -> Self {
        self.orders.push(Order {
            id,
            customer_id,
            status,
            created_at,
        });
        for price in prices {
            self.items.push(OrderItem {
                id: self.items.len() as u64 + 1,
                order_id: id,
                customer_id,
                sale_price: *price,
                created_at,
            });
        }
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot::new(self.orders, self.items)
    }
}
