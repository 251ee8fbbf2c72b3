use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    cache::TtlCache,
    resilient::{Downstream, ProxyOptions, ResilientProxy},
};
use crate::{
    config,
    core::{
        error::{DataError, DataResult},
        traits::ShippingTracker,
    },
    model::TrackingInfo,
};

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid reference pattern"));

pub struct ShippingDownstream {
    tracker: Option<Arc<dyn ShippingTracker>>,
}

impl ShippingDownstream {
    pub fn new(tracker: Option<Arc<dyn ShippingTracker>>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Downstream for ShippingDownstream {
    type Key = String;
    /// `None` when the carrier has no record for the reference
    type Value = Option<TrackingInfo>;

    fn name(&self) -> &'static str {
        "shipping"
    }

    fn is_available(&self) -> bool {
        self.tracker.is_some()
    }

    fn cache_key(&self, reference: &String) -> String {
        format!("shipping_{reference}")
    }

    fn validate(&self, reference: &String) -> DataResult<()> {
        if !REFERENCE_PATTERN.is_match(reference) {
            return Err(DataError::Validation(format!(
                "malformed shipping reference {reference:?}"
            )));
        }
        Ok(())
    }

    async fn fetch(&self, reference: &String) -> DataResult<Option<TrackingInfo>> {
        let tracker = self
            .tracker
            .as_ref()
            .ok_or_else(|| DataError::Unavailable("shipping tracker".to_string()))?;
        tracker.get_tracking_info(reference).await
    }

    fn degraded(&self, reference: &String) -> Option<TrackingInfo> {
        Some(TrackingInfo::placeholder(reference))
    }
}

pub type ShippingProxy = ResilientProxy<ShippingDownstream>;

impl ShippingProxy {
    pub fn from_config(
        tracker: Option<Arc<dyn ShippingTracker>>,
        cfg: &config::Shipping,
        cache: Arc<TtlCache<Option<TrackingInfo>>>,
    ) -> Self {
        let options = ProxyOptions {
            timeout: Duration::from_millis(cfg.timeout_ms),
            enabled: cfg.enabled,
        };
        ResilientProxy::new(ShippingDownstream::new(tracker), options, cache)
    }

    /// Tracking info for a reference, or a placeholder when the tracker cannot answer.
    /// `None` for malformed references and for references the carrier does not know.
    pub async fn tracking(&self, reference: &str) -> Option<TrackingInfo> {
        self.call(&reference.to_string()).await.into_value().flatten()
    }
}
