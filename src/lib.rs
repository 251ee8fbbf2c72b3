//! Batched, per-request data access for the e-commerce backend.
//!
//! Resolvers get a fresh `RequestContext` per inbound request. Its loaders
//! coalesce sibling lookups into one store query per entity kind, and its
//! proxies keep slow or missing dependencies from failing the response.

pub mod assemble;
pub mod config;
pub mod core;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod proxy;
pub mod store;
