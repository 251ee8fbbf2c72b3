use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use super::{
    cache::TtlCache,
    resilient::{Downstream, ProxyOptions, ResilientProxy},
};
use crate::{
    config,
    core::{
        error::{DataError, DataResult},
        traits::RecommendationEngine,
    },
    model::Recommendation,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecommendationKey {
    pub customer_id: String,
    pub limit: usize,
}

impl RecommendationKey {
    pub fn new(customer_id: impl Into<String>, limit: usize) -> Self {
        Self {
            customer_id: customer_id.into(),
            limit,
        }
    }
}

pub struct RecommendationDownstream {
    engine: Option<Arc<dyn RecommendationEngine>>,
}

impl RecommendationDownstream {
    pub fn new(engine: Option<Arc<dyn RecommendationEngine>>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Downstream for RecommendationDownstream {
    type Key = RecommendationKey;
    type Value = Vec<Recommendation>;

    fn name(&self) -> &'static str {
        "recommendations"
    }

    fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    fn cache_key(&self, key: &RecommendationKey) -> String {
        format!("recommendations_{}_{}", key.customer_id, key.limit)
    }

    fn validate(&self, key: &RecommendationKey) -> DataResult<()> {
        if key.customer_id.trim().is_empty() {
            return Err(DataError::Validation("customer id is empty".to_string()));
        }
        if key.limit == 0 {
            return Err(DataError::Validation("limit must be positive".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, key: &RecommendationKey) -> DataResult<Vec<Recommendation>> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| DataError::Unavailable("recommendation engine".to_string()))?;

        let mut recommendations = engine
            .get_recommendations(&key.customer_id, key.limit)
            .await?;
        recommendations.truncate(key.limit);
        Ok(recommendations)
    }

    fn degraded(&self, _key: &RecommendationKey) -> Vec<Recommendation> {
        Vec::new()
    }
}

pub type RecommendationProxy = ResilientProxy<RecommendationDownstream>;

impl RecommendationProxy {
    pub fn from_config(
        engine: Option<Arc<dyn RecommendationEngine>>,
        cfg: &config::Recommendations,
        cache: Arc<TtlCache<Vec<Recommendation>>>,
    ) -> Self {
        let options = ProxyOptions {
            timeout: Duration::from_millis(cfg.timeout_ms),
            enabled: cfg.enabled,
        };
        ResilientProxy::new(RecommendationDownstream::new(engine), options, cache)
    }

    /// Recommendations for a customer; empty whenever the engine cannot answer
    pub async fn recommendations(&self, customer_id: &str, limit: usize) -> Vec<Recommendation> {
        self.call(&RecommendationKey::new(customer_id, limit))
            .await
            .into_value()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::proxy::resilient::{DegradeReason, Resilient};

    struct FixedEngine {
        count: usize,
        delay: Option<Duration>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl FixedEngine {
        fn new(count: usize) -> Self {
            Self {
                count,
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RecommendationEngine for FixedEngine {
        async fn get_recommendations(
            &self,
            customer_id: &str,
            limit: usize,
        ) -> DataResult<Vec<Recommendation>> {
            self.calls
                .lock()
                .unwrap()
                .push((customer_id.to_string(), limit));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok((0..self.count)
                .map(|i| Recommendation {
                    product_id: format!("p{i}"),
                    score: Some(1.0 - i as f64 / 10.0),
                    reason: None,
                })
                .collect())
        }
    }

    fn proxy(engine: Option<Arc<FixedEngine>>) -> RecommendationProxy {
        let engine = engine.map(|e| e as Arc<dyn RecommendationEngine>);
        let cfg = config::Recommendations::default();
        let cache = Arc::new(TtlCache::new(Duration::from_secs(cfg.ttl_secs)));
        RecommendationProxy::from_config(engine, &cfg, cache)
    }

    #[tokio::test]
    async fn test_results_truncated_to_limit() {
        let engine = Arc::new(FixedEngine::new(8));
        let proxy = proxy(Some(engine.clone()));

        let recs = proxy.recommendations("c1", 3).await;
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].product_id, "p0");
    }

    #[tokio::test]
    async fn test_cache_key_includes_limit() {
        let engine = Arc::new(FixedEngine::new(8));
        let proxy = proxy(Some(engine.clone()));

        proxy.recommendations("c1", 3).await;
        proxy.recommendations("c1", 3).await;
        proxy.recommendations("c1", 5).await;

        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![("c1".to_string(), 3), ("c1".to_string(), 5)]
        );
    }

    #[tokio::test]
    async fn test_missing_engine_yields_empty_list() {
        let proxy = proxy(None);

        let result = proxy.call(&RecommendationKey::new("c1", 5)).await;
        assert_eq!(
            result,
            Resilient::Degraded {
                value: Vec::new(),
                reason: DegradeReason::Unavailable
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_keys_skip_engine() {
        let engine = Arc::new(FixedEngine::new(2));
        let proxy = proxy(Some(engine.clone()));

        assert_eq!(proxy.call(&RecommendationKey::new(" ", 5)).await, Resilient::Invalid);
        assert_eq!(proxy.call(&RecommendationKey::new("c1", 0)).await, Resilient::Invalid);
        assert!(proxy.recommendations("", 5).await.is_empty());
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_engine_degrades_then_retries() {
        let mut engine = FixedEngine::new(2);
        engine.delay = Some(Duration::from_secs(5));
        let engine = Arc::new(engine);
        let proxy = proxy(Some(engine.clone()));

        assert!(proxy.recommendations("c1", 5).await.is_empty());
        assert!(proxy.recommendations("c1", 5).await.is_empty());
        assert_eq!(engine.calls.lock().unwrap().len(), 2);
        assert_eq!(proxy.stats().timeouts, 2);
    }
}
