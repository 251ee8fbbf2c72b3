//! Core abstractions and interfaces for shopgraph
//!
//! Collaborator traits, the error type, and the per-request context with the
//! factory that builds it.

pub mod container;
pub mod context;
pub mod error;
pub mod traits;


// Re-export commonly used types
pub use container::ContextFactory;
pub use context::{ContextStats, Loaders, Proxies, RequestContext};
pub use error::{DataError, DataResult};
pub use traits::*;
