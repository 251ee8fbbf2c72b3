//! Document types served by the data-access layer
//!
//! These mirror the stored documents. Field names serialize in camelCase so the
//! resolution layer can hand them to any JSON serializer unchanged.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub inventory: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<String>,
    pub product_id: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// Dangling or absent references are treated as missing data
    #[serde(default)]
    pub customer_id: Option<String>,
    pub order_date: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    pub total_amount: f64,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_reference: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Order {
    /// Only shipped or delivered orders carry tracking data
    pub fn is_trackable(&self) -> bool {
        matches!(self.status, OrderStatus::Shipped | OrderStatus::Delivered)
    }

    /// Reference to hand to the shipping tracker, preferring the carrier tracking number
    pub fn tracking_reference(&self) -> Option<&str> {
        let usable = |s: &&str| !s.trim().is_empty();
        self.tracking_number
            .as_deref()
            .filter(usable)
            .or_else(|| self.shipping_reference.as_deref().filter(usable))
    }
}

/// A single recommendation as returned by the recommendation engine
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product_id: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingEvent {
    pub date: String,
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub tracking_id: String,
    pub carrier: String,
    pub status: String,
    #[serde(default)]
    pub estimated_delivery: Option<String>,
    #[serde(default)]
    pub history: Vec<ShippingEvent>,
}

pub const UNKNOWN_CARRIER: &str = "Unknown";
pub const PENDING_STATUS: &str = "Pending";

impl TrackingInfo {
    /// Same-shaped stand-in used when the shipping tracker cannot answer
    pub fn placeholder(reference: &str) -> Self {
        Self {
            tracking_id: reference.to_string(),
            carrier: UNKNOWN_CARRIER.to_string(),
            status: PENDING_STATUS.to_string(),
            estimated_delivery: None,
            history: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.carrier == UNKNOWN_CARRIER && self.status == PENDING_STATUS && self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_deserializes_from_camel_case() {
        let order: Order = serde_json::from_value(json!({
            "id": "o1",
            "customerId": "c1",
            "orderDate": "2024-01-01",
            "status": "shipped",
            "items": [{ "productId": "p1", "quantity": 2, "price": 9.5 }],
            "totalAmount": 19.0,
            "trackingNumber": "TRK-1"
        }))
        .unwrap();

        assert_eq!(order.customer_id.as_deref(), Some("c1"));
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.items[0].product_id, "p1");
        assert!(order.is_trackable());
        assert_eq!(order.tracking_reference(), Some("TRK-1"));
    }

    #[test]
    fn test_tracking_reference_falls_back_to_shipping_reference() {
        let mut order = Order {
            shipping_reference: Some("SHIP-9".to_string()),
            ..Default::default()
        };
        assert_eq!(order.tracking_reference(), Some("SHIP-9"));

        order.tracking_number = Some("  ".to_string());
        assert_eq!(order.tracking_reference(), Some("SHIP-9"));

        order.tracking_number = None;
        order.shipping_reference = None;
        assert_eq!(order.tracking_reference(), None);
    }

    #[test]
    fn test_pending_orders_are_not_trackable() {
        for status in [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Cancelled] {
            let order = Order {
                status,
                ..Default::default()
            };
            assert!(!order.is_trackable());
        }
    }

    #[test]
    fn test_placeholder_has_full_shape() {
        let info = TrackingInfo::placeholder("TRK-1");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["carrier"], "Unknown");
        assert_eq!(value["status"], "Pending");
        assert_eq!(value["trackingId"], "TRK-1");
        assert!(value["history"].as_array().unwrap().is_empty());
        assert!(info.is_placeholder());
    }
}
