//! Core traits for shopgraph collaborators
//!
//! These interfaces decouple the batching and degradation logic from the
//! document store and the two third-party style dependencies.

use async_trait::async_trait;

use super::error::DataResult;
use crate::model::{Customer, Order, Product, Recommendation, TrackingInfo};

/// Document store queried by identifier sets and foreign-key filters.
///
/// Results may come back in any order and may omit ids that do not exist;
/// the loaders re-order and fill misses.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find customers whose id is in `ids`
    async fn find_customers(&self, ids: &[String]) -> DataResult<Vec<Customer>>;

    /// Find orders whose id is in `ids`
    async fn find_orders(&self, ids: &[String]) -> DataResult<Vec<Order>>;

    /// Find products whose id is in `ids`
    async fn find_products(&self, ids: &[String]) -> DataResult<Vec<Product>>;

    /// Find orders whose customer reference is in `customer_ids`
    async fn find_orders_by_customers(&self, customer_ids: &[String]) -> DataResult<Vec<Order>>;
}

/// Recommendation engine collaborator
#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn get_recommendations(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> DataResult<Vec<Recommendation>>;
}

/// Shipping tracker collaborator
#[async_trait]
pub trait ShippingTracker: Send + Sync {
    /// `Ok(None)` means the carrier has no record for the reference
    async fn get_tracking_info(&self, reference: &str) -> DataResult<Option<TrackingInfo>>;
}
