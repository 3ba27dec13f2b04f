//! Loads a snapshot from a source and drops item rows the pipeline cannot
//! join or sum.

use crate::source::SnapshotSource;
use std::collections::HashSet;
use storefront_core::types::Snapshot;
use storefront_core::InsightsResult;
use tracing::{info, warn};

/// Front door for snapshot input. Wraps a [`SnapshotSource`] and reports
/// what was loaded.
pub struct SnapshotLoader<S> {
    source: S,
}

impl<S: SnapshotSource> SnapshotLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Read the whole snapshot. Any read or parse failure aborts the load.
    pub async fn load(&self) -> InsightsResult<Snapshot> {
        let snapshot = self.source.load().await?;
        let snapshot = drop_negative_prices(drop_orphan_items(snapshot));

        metrics::counter!("snapshot.orders_loaded").increment(snapshot.orders.len() as u64);
        metrics::counter!("snapshot.items_loaded").increment(snapshot.order_items.len() as u64);
        info!(
            source = %self.source.describe(),
            orders = snapshot.orders.len(),
            order_items = snapshot.order_items.len(),
            customers = snapshot.customers.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }
}

/// Remove items whose order is not in the snapshot.
pub fn drop_orphan_items(snapshot: Snapshot) -> Snapshot {
    let order_ids: HashSet<_> = snapshot.orders.iter().map(|o| o.id).collect();
    let before = snapshot.order_items.len();
    let Snapshot {
        orders,
        order_items,
        customers,
    } = snapshot;
    let order_items: Vec<_> = order_items
        .into_iter()
        .filter(|item| order_ids.contains(&item.order_id))
        .collect();

    let orphans = before - order_items.len();
    if orphans > 0 {
        metrics::counter!("snapshot.orphan_items").increment(orphans as u64);
        warn!(orphans, "Skipping order items that reference unknown orders");
    }

    Snapshot {
        orders,
        order_items,
        customers,
    }
}

/// Remove items with a negative sale price. Revenue only ever accumulates,
/// so refunds and corrections are not accepted as items.
pub fn drop_negative_prices(mut snapshot: Snapshot) -> Snapshot {
    let before = snapshot.order_items.len();
    snapshot
        .order_items
        .retain(|item| !item.sale_price.is_sign_negative() || item.sale_price.is_zero());

    let negative = before - snapshot.order_items.len();
    if negative > 0 {
        metrics::counter!("snapshot.negative_price_items").increment(negative as u64);
        warn!(negative, "Skipping order items with a negative sale price");
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use storefront_core::types::{Order, OrderItem, OrderStatus};

    fn snapshot_with_orphan() -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2023, 1, 10, 12, 0, 0).unwrap();
        let orders = vec![Order {
            id: 1,
            customer_id: 7,
            status: OrderStatus::Complete,
            created_at: ts,
        }];
        let items = vec![
            OrderItem {
                id: 10,
                order_id: 1,
                customer_id: 7,
                sale_price: Decimal::from(20),
                created_at: ts,
            },
            OrderItem {
                id: 11,
                order_id: 99,
                customer_id: 7,
                sale_price: Decimal::from(5),
                created_at: ts,
            },
        ];
        Snapshot::new(orders, items)
    }

    #[test]
    fn test_drop_orphan_items() {
        let snapshot = drop_orphan_items(snapshot_with_orphan());
        assert_eq!(snapshot.order_items.len(), 1);
        assert_eq!(snapshot.order_items[0].id, 10);
    }

    #[test]
    fn test_drop_negative_prices() {
        let mut snapshot = snapshot_with_orphan();
        snapshot.order_items[0].sale_price = Decimal::new(-1999, 2);
        snapshot.order_items[1].sale_price = Decimal::ZERO;
        let snapshot = drop_negative_prices(snapshot);
        assert_eq!(snapshot.order_items.len(), 1);
        assert_eq!(snapshot.order_items[0].id, 11);
    }

    #[tokio::test]
    async fn test_loader_sanitizes() {
        let mut snapshot = snapshot_with_orphan();
        let mut refund = snapshot.order_items[0].clone();
        refund.id = 12;
        refund.sale_price = Decimal::from(-20);
        snapshot.order_items.push(refund);

        let loader = SnapshotLoader::new(InMemorySource::new(snapshot));
        let snapshot = loader.load().await.unwrap();
        assert_eq!(snapshot.orders.len(), 1);
        assert_eq!(snapshot.order_items.len(), 1);
        assert_eq!(snapshot.order_items[0].id, 10);
        assert!(snapshot.order_items.iter().all(|i| !i.sale_price.is_sign_negative()));
    }
}
