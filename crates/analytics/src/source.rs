//! Where a snapshot comes from.

use crate::decode::{decode_collection, decode_customers};
use std::future::Future;
use std::path::{Path, PathBuf};
use storefront_core::config::{InputFormat, SnapshotConfig};
use storefront_core::types::Snapshot;
use storefront_core::{InsightsError, InsightsResult};
use tracing::debug;

/// A provider of the immutable tables a report run reads. Loading is the
/// only point where a run may suspend.
pub trait SnapshotSource {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    fn load(&self) -> impl Future<Output = InsightsResult<Snapshot>> + Send;
}

/// Snapshot already materialized in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    snapshot: Snapshot,
}

impl InMemorySource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

impl SnapshotSource for InMemorySource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> InsightsResult<Snapshot> {
        Ok(self.snapshot.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub orders: PathBuf,
    pub order_items: PathBuf,
    pub customers: Option<PathBuf>,
}

/// One file per table, all in the same format.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    paths: SnapshotPaths,
    format: InputFormat,
}

impl FileSnapshotSource {
    pub fn new(paths: SnapshotPaths, format: InputFormat) -> Self {
        Self { paths, format }
    }

    pub fn json(paths: SnapshotPaths) -> Self {
        Self::new(paths, InputFormat::Json)
    }

    pub fn csv(paths: SnapshotPaths) -> Self {
        Self::new(paths, InputFormat::Csv)
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(
            SnapshotPaths {
                orders: config.orders_path.clone(),
                order_items: config.order_items_path.clone(),
                customers: config.customers_path.clone(),
            },
            config.format,
        )
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn describe(&self) -> String {
        format!(
            "{:?} files {} + {}",
            self.format,
            self.paths.orders.display(),
            self.paths.order_items.display()
        )
    }

    async fn load(&self) -> InsightsResult<Snapshot> {
        let (orders, items, customers) = tokio::try_join!(
            read_file("orders", &self.paths.orders),
            read_file("order_items", &self.paths.order_items),
            read_optional("customers", self.paths.customers.as_deref()),
        )?;

        let format = self.format;
        let orders = decode_collection(format, "orders", &self.paths.orders, &orders)?;
        let order_items =
            decode_collection(format, "order_items", &self.paths.order_items, &items)?;
        let customers = match (customers, &self.paths.customers) {
            (Some(bytes), Some(path)) => decode_customers(format, path, &bytes)?,
            _ => Vec::new(),
        };

        Ok(Snapshot::new(orders, order_items).with_customers(customers))
    }
}

async fn read_file(collection: &'static str, path: &Path) -> InsightsResult<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| InsightsError::input_unavailable(collection, path, e))?;
    debug!(collection, path = %path.display(), bytes = bytes.len(), "Read snapshot file");
    Ok(bytes)
}

async fn read_optional(
    collection: &'static str,
    path: Option<&Path>,
) -> InsightsResult<Option<Vec<u8>>> {
    match path {
        Some(path) => read_file(collection, path).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::types::OrderStatus;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("storefront-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_load_json_files() {
        let orders = temp_path("orders.json");
        let items = temp_path("items.json");
        std::fs::write(
            &orders,
            r#"[{"id": 1, "customer_id": 5, "status": "Shipped", "created_at": "2023-03-01T00:00:00Z"}]"#,
        )
        .unwrap();
        std::fs::write(
            &items,
            r#"[{"id": 9, "order_id": 1, "customer_id": 5, "sale_price": "12.50", "created_at": "2023-03-01T00:00:00Z"}]"#,
        )
        .unwrap();

        let source = FileSnapshotSource::json(SnapshotPaths {
            orders: orders.clone(),
            order_items: items.clone(),
            customers: None,
        });
        let snapshot = source.load().await.unwrap();
        assert_eq!(snapshot.orders.len(), 1);
        assert_eq!(snapshot.orders[0].status, OrderStatus::Shipped);
        assert_eq!(snapshot.order_items.len(), 1);
        assert!(snapshot.customers.is_empty());

        let _ = std::fs::remove_file(orders);
        let _ = std::fs::remove_file(items);
    }

    #[tokio::test]
    async fn test_missing_file_is_input_unavailable() {
        let source = FileSnapshotSource::csv(SnapshotPaths {
            orders: temp_path("absent-orders.csv"),
            order_items: temp_path("absent-items.csv"),
            customers: None,
        });
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, InsightsError::InputUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemorySource::new(Snapshot::default());
        assert_eq!(source.describe(), "memory");
        assert!(source.load().await.unwrap().orders.is_empty());
    }
}
