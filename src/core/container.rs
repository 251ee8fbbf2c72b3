//! Dependency injection container
//!
//! `ContextFactory` is built once at startup and owns the long-lived
//! collaborators. It hands out a fresh `RequestContext` per inbound request,
//! so nothing batches or caches across requests unless configured to.

use std::{sync::Arc, time::Duration};

use log::debug;

use super::{
    context::{Loaders, Proxies, RequestContext},
    traits::{DocumentStore, RecommendationEngine, ShippingTracker},
};
use crate::{
    config::{CacheScope, Config},
    loader::{
        BatchLoader, CustomerBatch, LoaderOptions, OrderBatch, OrdersByCustomer, ProductBatch,
        RelationshipLoader,
    },
    model::Recommendation,
    proxy::{RecommendationProxy, ShippingProxy, TtlCache},
};

pub struct ContextFactory {
    config: Arc<Config>,
    store: Arc<dyn DocumentStore>,
    recommendation_engine: Option<Arc<dyn RecommendationEngine>>,
    shipping_tracker: Option<Arc<dyn ShippingTracker>>,
    /// Present only when recommendation caching is process-wide
    shared_recommendations: Option<Arc<TtlCache<Vec<Recommendation>>>>,
}

impl ContextFactory {
    /// Create a factory without external dependencies; proxies will serve fallbacks
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let shared_recommendations = match config.recommendations.cache_scope {
            CacheScope::Shared => Some(Arc::new(TtlCache::new(Duration::from_secs(
                config.recommendations.ttl_secs,
            )))),
            CacheScope::Request => None,
        };

        Self {
            config: Arc::new(config),
            store,
            recommendation_engine: None,
            shipping_tracker: None,
            shared_recommendations,
        }
    }

    pub fn with_recommendation_engine(mut self, engine: Arc<dyn RecommendationEngine>) -> Self {
        self.recommendation_engine = Some(engine);
        self
    }

    pub fn with_shipping_tracker(mut self, tracker: Arc<dyn ShippingTracker>) -> Self {
        self.shipping_tracker = Some(tracker);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live entries in the process-wide recommendation cache
    pub fn shared_cache_len(&self) -> usize {
        self.shared_recommendations
            .as_ref()
            .map_or(0, |cache| cache.len())
    }

    pub fn create_context(&self) -> RequestContext {
        self.create_context_with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create a context reusing an id assigned upstream, e.g. from a request header
    pub fn create_context_with_id(&self, request_id: impl Into<String>) -> RequestContext {
        let request_id = request_id.into();
        debug!("creating request context {request_id}");

        let loader_cfg = &self.config.loader;
        let loaders = Loaders {
            customer: BatchLoader::with_options(
                Arc::new(CustomerBatch::new(self.store.clone())),
                LoaderOptions::from_config("customer", loader_cfg),
            ),
            order: BatchLoader::with_options(
                Arc::new(OrderBatch::new(self.store.clone())),
                LoaderOptions::from_config("order", loader_cfg),
            ),
            product: BatchLoader::with_options(
                Arc::new(ProductBatch::new(self.store.clone())),
                LoaderOptions::from_config("product", loader_cfg),
            ),
            customer_orders: RelationshipLoader::with_options(
                Arc::new(OrdersByCustomer::new(self.store.clone())),
                LoaderOptions::from_config("customer_orders", loader_cfg),
            ),
        };

        let rec_cfg = &self.config.recommendations;
        let recommendation_cache = self.shared_recommendations.clone().unwrap_or_else(|| {
            Arc::new(TtlCache::new(Duration::from_secs(rec_cfg.ttl_secs)))
        });
        let ship_cfg = &self.config.shipping;
        let proxies = Proxies {
            recommendations: RecommendationProxy::from_config(
                self.recommendation_engine.clone(),
                rec_cfg,
                recommendation_cache,
            ),
            shipping: ShippingProxy::from_config(
                self.shipping_tracker.clone(),
                ship_cfg,
                Arc::new(TtlCache::new(Duration::from_secs(ship_cfg.ttl_secs))),
            ),
        };

        RequestContext::new(request_id, loaders, proxies)
            .with_recommendation_limit(rec_cfg.default_limit)
    }
}
