//! Byte-level decoding of snapshot collections.

use serde::de::DeserializeOwned;
use std::path::Path;
use storefront_core::config::InputFormat;
use storefront_core::types::Customer;
use storefront_core::{InsightsError, InsightsResult};

/// Decode one collection file. `collection` and `path` only feed the error.
pub fn decode_collection<T: DeserializeOwned>(
    format: InputFormat,
    collection: &'static str,
    path: &Path,
    bytes: &[u8],
) -> InsightsResult<Vec<T>> {
    match format {
        InputFormat::Json => decode_json(collection, path, bytes),
        InputFormat::Csv => decode_csv(collection, path, bytes),
    }
}

pub fn decode_json<T: DeserializeOwned>(
    collection: &'static str,
    path: &Path,
    bytes: &[u8],
) -> InsightsResult<Vec<T>> {
    serde_json::from_slice(bytes)
        .map_err(|e| InsightsError::input_unavailable(collection, path, e))
}

pub fn decode_csv<T: DeserializeOwned>(
    collection: &'static str,
    path: &Path,
    bytes: &[u8],
) -> InsightsResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(strip_bom(bytes));

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| {
                InsightsError::input_unavailable(collection, path, format!("row {}: {e}", i + 1))
            })
        })
        .collect()
}

/// Customers carry arbitrary extra columns, so CSV rows are mapped by header
/// instead of through a fixed struct.
pub fn decode_customers(
    format: InputFormat,
    path: &Path,
    bytes: &[u8],
) -> InsightsResult<Vec<Customer>> {
    const COLLECTION: &str = "customers";
    if format == InputFormat::Json {
        return decode_json(COLLECTION, path, bytes);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(strip_bom(bytes));
    let headers = reader
        .headers()
        .map_err(|e| InsightsError::input_unavailable(COLLECTION, path, e))?
        .clone();
    let id_index = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("id"))
        .ok_or_else(|| InsightsError::input_unavailable(COLLECTION, path, "missing 'id' column"))?;

    let mut customers = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| InsightsError::input_unavailable(COLLECTION, path, e))?;
        let id = record
            .get(id_index)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                InsightsError::input_unavailable(COLLECTION, path, format!("row {}: bad id", i + 1))
            })?;
        let attributes = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(idx, (_, value))| *idx != id_index && !value.is_empty())
            .map(|(_, (name, value))| (name.to_string(), serde_json::Value::from(value)))
            .collect();
        customers.push(Customer { id, attributes });
    }
    Ok(customers)
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use storefront_core::types::{Order, OrderItem, OrderStatus};

    const ORDERS_CSV: &str = "\
id,customer_id,status,created_at
1,10,Complete,2023-01-05 10:00:00 UTC
2,10,cancelled,2023-02-01T08:00:00Z
";

    const ITEMS_CSV: &str = "\
id,order_id,customer_id,sale_price,created_at
100,1,10,19.99,2023-01-05 10:00:00 UTC
101,1,10,5,2023-01-05 10:00:00 UTC
";

    #[test]
    fn test_decode_orders_csv() {
        let orders: Vec<Order> =
            decode_csv("orders", Path::new("orders.csv"), ORDERS_CSV.as_bytes()).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].status, OrderStatus::Complete);
        assert_eq!(orders[1].status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_decode_items_csv_keeps_exact_prices() {
        let items: Vec<OrderItem> =
            decode_csv("order_items", Path::new("items.csv"), ITEMS_CSV.as_bytes()).unwrap();
        assert_eq!(items[0].sale_price, Decimal::from_str("19.99").unwrap());
        assert_eq!(items[1].sale_price, Decimal::from(5));
    }

    #[test]
    fn test_csv_and_json_agree() {
        let json = r#"[
            {"id": 1, "customer_id": 10, "status": "Complete", "created_at": "2023-01-05T10:00:00Z"},
            {"id": 2, "customer_id": 10, "status": "Cancelled", "created_at": "2023-02-01T08:00:00Z"}
        ]"#;
        let from_json: Vec<Order> =
            decode_collection(InputFormat::Json, "orders", Path::new("o.json"), json.as_bytes())
                .unwrap();
        let from_csv: Vec<Order> =
            decode_collection(InputFormat::Csv, "orders", Path::new("o.csv"), ORDERS_CSV.as_bytes())
                .unwrap();
        assert_eq!(from_json, from_csv);
    }

    #[test]
    fn test_bad_row_is_input_unavailable() {
        let bad = "id,customer_id,status,created_at\n1,10,Lost,2023-01-05\n";
        let err = decode_csv::<Order>("orders", Path::new("orders.csv"), bad.as_bytes())
            .unwrap_err();
        match err {
            InsightsError::InputUnavailable { collection, reason, .. } => {
                assert_eq!(collection, "orders");
                assert!(reason.starts_with("row 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_customers_csv() {
        let csv = "\u{FEFF}id,age,country\n1,31,Brasil\n2,,Japan\n";
        let customers = decode_customers(InputFormat::Csv, Path::new("u.csv"), csv.as_bytes())
            .unwrap();
        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].attributes["age"], "31");
        assert!(!customers[1].attributes.contains_key("age"));
    }
}
