use crate::error::InsightsError;
use crate::month::deserialize_timestamp;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type CustomerId = u64;
pub type OrderId = u64;
pub type OrderItemId = u64;

/// Fulfilment status of an order. Parsing is case-insensitive so that both
/// `"Complete"` and `"complete"` are accepted from files and environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum OrderStatus {
    Complete,
    Shipped,
    Cancelled,
    Returned,
    Processing,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Complete,
        OrderStatus::Shipped,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Complete => "Complete",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
            OrderStatus::Processing => "Processing",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InsightsError::Config(format!("unknown order status '{s}'")))
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = InsightsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A customer order as found in the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// One line of an order. `customer_id` duplicates the owning order's customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub sale_price: Decimal,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A customer row. Only the identifier matters for retention; the remaining
/// columns (age, country, traffic source, ...) are kept as opaque values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Immutable in-memory copy of the tables a report run reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl Snapshot {
    pub fn new(orders: Vec<Order>, order_items: Vec<OrderItem>) -> Self {
        Self {
            orders,
            order_items,
            customers: Vec::new(),
        }
    }

    pub fn with_customers(mut self, customers: Vec<Customer>) -> Self {
        self.customers = customers;
        self
    }
}
