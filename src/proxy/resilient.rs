//! Timeout, fallback and caching wrapper for external dependencies
//!
//! A proxy never fails its caller. Every call ends in one of the
//! [`Resilient`] outcomes, and the degraded ones carry a fallback value with
//! the same shape as a real answer.

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, trace, warn};

use super::cache::TtlCache;
use crate::{core::error::DataResult, metrics};

/// An external service reached through a [`ResilientProxy`]
#[async_trait]
pub trait Downstream: Send + Sync {
    type Key: Debug + Send + Sync;
    type Value: Clone + Send + Sync + 'static;

    /// Label used in logs and metrics
    fn name(&self) -> &'static str;

    /// Whether the service was configured at all
    fn is_available(&self) -> bool;

    fn cache_key(&self, key: &Self::Key) -> String;

    /// Reject keys that must never reach the service
    fn validate(&self, key: &Self::Key) -> DataResult<()>;

    async fn fetch(&self, key: &Self::Key) -> DataResult<Self::Value>;

    /// Stand-in value returned whenever the service cannot answer
    fn degraded(&self, key: &Self::Key) -> Self::Value;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    Unavailable,
    Timeout,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resilient<V> {
    /// Fresh answer from the service
    Live(V),
    /// Answer served from the TTL cache
    Cached(V),
    Degraded { value: V, reason: DegradeReason },
    /// Key rejected before any call was made
    Invalid,
}

impl<V> Resilient<V> {
    pub fn value(&self) -> Option<&V> {
        match self {
            Resilient::Live(v) | Resilient::Cached(v) => Some(v),
            Resilient::Degraded { value, .. } => Some(value),
            Resilient::Invalid => None,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Resilient::Live(v) | Resilient::Cached(v) => Some(v),
            Resilient::Degraded { value, .. } => Some(value),
            Resilient::Invalid => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Resilient::Degraded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub timeout: Duration,
    /// A disabled proxy behaves as if the service were not configured
    pub enabled: bool,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyStats {
    /// Calls that actually reached the service
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub cache_hits: u64,
    pub unavailable: u64,
    pub invalid: u64,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    cache_hits: AtomicU64,
    unavailable: AtomicU64,
    invalid: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub struct ResilientProxy<D: Downstream> {
    downstream: D,
    options: ProxyOptions,
    cache: Arc<TtlCache<D::Value>>,
    available: bool,
    counters: Counters,
}

impl<D: Downstream> ResilientProxy<D> {
    pub fn new(downstream: D, options: ProxyOptions, cache: Arc<TtlCache<D::Value>>) -> Self {
        // decided once, a proxy never starts using a service mid-request
        let available = options.enabled && downstream.is_available();
        if !available {
            debug!("{}: dependency not available, serving fallbacks", downstream.name());
        }
        Self {
            downstream,
            options,
            cache,
            available,
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.downstream.name()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub async fn call(&self, key: &D::Key) -> Resilient<D::Value> {
        let name = self.downstream.name();

        if let Err(e) = self.downstream.validate(key) {
            debug!("{name}: rejected key {key:?}: {e}");
            bump(&self.counters.invalid);
            metrics::record_downstream(name, "invalid");
            return Resilient::Invalid;
        }

        if !self.available {
            bump(&self.counters.unavailable);
            metrics::record_downstream(name, "unavailable");
            return Resilient::Degraded {
                value: self.downstream.degraded(key),
                reason: DegradeReason::Unavailable,
            };
        }

        let cache_key = self.downstream.cache_key(key);
        if let Some(value) = self.cache.get(&cache_key) {
            trace!("{name}: cache hit for {cache_key}");
            bump(&self.counters.cache_hits);
            metrics::record_downstream(name, "cached");
            return Resilient::Cached(value);
        }

        bump(&self.counters.calls);
        match tokio::time::timeout(self.options.timeout, self.downstream.fetch(key)).await {
            Ok(Ok(value)) => {
                bump(&self.counters.successes);
                metrics::record_downstream(name, "success");
                self.cache.insert(cache_key, value.clone());
                Resilient::Live(value)
            }
            Ok(Err(e)) => {
                warn!("{name}: call for {key:?} failed: {e}");
                bump(&self.counters.failures);
                metrics::record_downstream(name, "failure");
                Resilient::Degraded {
                    value: self.downstream.degraded(key),
                    reason: DegradeReason::Failure(e.to_string()),
                }
            }
            Err(_) => {
                warn!(
                    "{name}: call for {key:?} timed out after {}ms",
                    self.options.timeout.as_millis()
                );
                bump(&self.counters.timeouts);
                metrics::record_downstream(name, "timeout");
                Resilient::Degraded {
                    value: self.downstream.degraded(key),
                    reason: DegradeReason::Timeout,
                }
            }
        }
    }

    pub fn stats(&self) -> ProxyStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ProxyStats {
            calls: load(&self.counters.calls),
            successes: load(&self.counters.successes),
            failures: load(&self.counters.failures),
            timeouts: load(&self.counters.timeouts),
            cache_hits: load(&self.counters.cache_hits),
            unavailable: load(&self.counters.unavailable),
            invalid: load(&self.counters.invalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::core::error::DataError;

    /// Echo service with a scripted delay or failure
    struct Echo {
        available: bool,
        delay: Mutex<Option<Duration>>,
        fail: Mutex<Option<DataError>>,
        fetched: AtomicU64,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                available: true,
                delay: Mutex::new(None),
                fail: Mutex::new(None),
                fetched: AtomicU64::new(0),
            }
        }

        fn fetched(&self) -> u64 {
            self.fetched.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Downstream for Arc<Echo> {
        type Key = String;
        type Value = String;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn cache_key(&self, key: &String) -> String {
            format!("echo_{key}")
        }

        fn validate(&self, key: &String) -> DataResult<()> {
            if key.is_empty() {
                return Err(DataError::Validation("empty key".to_string()));
            }
            Ok(())
        }

        async fn fetch(&self, key: &String) -> DataResult<String> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let fail = self.fail.lock().unwrap().clone();
            match fail {
                Some(e) => Err(e),
                None => Ok(key.to_uppercase()),
            }
        }

        fn degraded(&self, _key: &String) -> String {
            "fallback".to_string()
        }
    }

    fn proxy(echo: &Arc<Echo>, ttl: Duration) -> ResilientProxy<Arc<Echo>> {
        let options = ProxyOptions {
            timeout: Duration::from_secs(1),
            enabled: true,
        };
        ResilientProxy::new(echo.clone(), options, Arc::new(TtlCache::new(ttl)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_cached_until_ttl() {
        let echo = Arc::new(Echo::new());
        let proxy = proxy(&echo, Duration::from_secs(60));

        assert_eq!(proxy.call(&"a".to_string()).await, Resilient::Live("A".to_string()));
        assert_eq!(proxy.call(&"a".to_string()).await, Resilient::Cached("A".to_string()));
        assert_eq!(echo.fetched(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(proxy.call(&"a".to_string()).await, Resilient::Live("A".to_string()));
        assert_eq!(echo.fetched(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_and_is_not_cached() {
        let echo = Arc::new(Echo::new());
        *echo.delay.lock().unwrap() = Some(Duration::from_secs(5));
        let proxy = proxy(&echo, Duration::from_secs(3600));

        let first = proxy.call(&"a".to_string()).await;
        assert_eq!(
            first,
            Resilient::Degraded {
                value: "fallback".to_string(),
                reason: DegradeReason::Timeout
            }
        );

        // the next call must try again instead of replaying the fallback
        *echo.delay.lock().unwrap() = None;
        assert_eq!(proxy.call(&"a".to_string()).await, Resilient::Live("A".to_string()));
        assert_eq!(echo.fetched(), 2);

        let stats = proxy.stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.successes, 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_with_reason() {
        let echo = Arc::new(Echo::new());
        *echo.fail.lock().unwrap() = Some(DataError::Downstream("503".to_string()));
        let proxy = proxy(&echo, Duration::from_secs(60));

        let result = proxy.call(&"a".to_string()).await;
        assert!(result.is_degraded());
        assert_eq!(result.value(), Some(&"fallback".to_string()));
        match result {
            Resilient::Degraded {
                reason: DegradeReason::Failure(msg),
                ..
            } => assert!(msg.contains("503")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(proxy.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_unavailable_never_calls_service() {
        let mut echo = Echo::new();
        echo.available = false;
        let echo = Arc::new(echo);
        let proxy = proxy(&echo, Duration::from_secs(60));

        assert!(!proxy.is_available());
        let result = proxy.call(&"a".to_string()).await;
        assert_eq!(
            result,
            Resilient::Degraded {
                value: "fallback".to_string(),
                reason: DegradeReason::Unavailable
            }
        );
        assert_eq!(echo.fetched(), 0);
        assert_eq!(proxy.stats().unavailable, 1);
    }

    #[tokio::test]
    async fn test_disabled_proxy_is_unavailable() {
        let echo = Arc::new(Echo::new());
        let options = ProxyOptions {
            enabled: false,
            ..Default::default()
        };
        let proxy = ResilientProxy::new(
            echo.clone(),
            options,
            Arc::new(TtlCache::new(Duration::from_secs(1))),
        );

        assert!(proxy.call(&"a".to_string()).await.is_degraded());
        assert_eq!(echo.fetched(), 0);
    }

    #[tokio::test]
    async fn test_invalid_key_short_circuits_without_failure() {
        let echo = Arc::new(Echo::new());
        let proxy = proxy(&echo, Duration::from_secs(60));

        let result = proxy.call(&String::new()).await;
        assert_eq!(result, Resilient::Invalid);
        assert_eq!(result.into_value(), None);
        assert_eq!(echo.fetched(), 0);

        let stats = proxy.stats();
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.calls, 0);
    }

    #[tokio::test]
    async fn test_outcomes_are_counted_in_metrics() {
        let echo = Arc::new(Echo::new());
        let proxy = proxy(&echo, Duration::from_secs(60));

        let before = metrics::downstream_count("echo", "invalid");
        proxy.call(&String::new()).await;
        assert!(metrics::downstream_count("echo", "invalid") > before);
    }
}
