//! Request context management
//!
//! A `RequestContext` owns every loader and proxy one inbound request uses.
//! Nothing in it is shared with any other request, apart from caches the
//! factory deliberately hands to every context.

use std::time::{Duration, Instant};

use log::debug;

use crate::{
    config,
    loader::{BatchLoader, LoaderStats, RelationshipLoader},
    model::{Customer, Order, Product},
    proxy::{ProxyStats, RecommendationProxy, ShippingProxy},
};

/// Entity loaders scoped to one request
pub struct Loaders {
    pub customer: BatchLoader<String, Customer>,
    pub order: BatchLoader<String, Order>,
    pub product: BatchLoader<String, Product>,
    /// Orders grouped by their customer reference
    pub customer_orders: RelationshipLoader<String, Order>,
}

pub struct Proxies {
    pub recommendations: RecommendationProxy,
    pub shipping: ShippingProxy,
}

/// Per-request state handed to every resolver of one request
pub struct RequestContext {
    pub request_id: String,
    pub loaders: Loaders,
    pub proxies: Proxies,
    /// Limit used when a resolver asks for recommendations without one
    pub recommendation_limit: usize,
    request_start: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, loaders: Loaders, proxies: Proxies) -> Self {
        Self {
            request_id: request_id.into(),
            loaders,
            proxies,
            recommendation_limit: config::Recommendations::default().default_limit,
            request_start: Instant::now(),
        }
    }

    pub fn with_recommendation_limit(mut self, limit: usize) -> Self {
        self.recommendation_limit = limit;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.request_start.elapsed()
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            customer: self.loaders.customer.stats(),
            order: self.loaders.order.stats(),
            product: self.loaders.product.stats(),
            customer_orders: self.loaders.customer_orders.stats(),
            recommendations: self.proxies.recommendations.stats(),
            shipping: self.proxies.shipping.stats(),
        }
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        let stats = self.stats();
        debug!(
            "request {} done in {}ms: {} store round trips, {} downstream calls",
            self.request_id,
            self.elapsed().as_millis(),
            stats.store_round_trips(),
            stats.recommendations.calls + stats.shipping.calls,
        );
    }
}

/// Snapshot of the work one request issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    pub customer: LoaderStats,
    pub order: LoaderStats,
    pub product: LoaderStats,
    pub customer_orders: LoaderStats,
    pub recommendations: ProxyStats,
    pub shipping: ProxyStats,
}

impl ContextStats {
    pub fn store_round_trips(&self) -> u64 {
        self.customer.batches
            + self.order.batches
            + self.product.batches
            + self.customer_orders.batches
    }
}
