//! Resilient access to external dependencies
//!
//! Each dependency sits behind a [`ResilientProxy`] that applies a timeout,
//! serves answers from a TTL cache and falls back to a same-shaped value
//! when the dependency is missing or misbehaves.

pub mod cache;
pub mod recommendation;
pub mod resilient;
pub mod shipping;

pub use cache::TtlCache;
pub use recommendation::{RecommendationKey, RecommendationProxy};
pub use resilient::{DegradeReason, Downstream, ProxyOptions, ProxyStats, Resilient, ResilientProxy};
pub use shipping::ShippingProxy;
