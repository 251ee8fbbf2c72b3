//! Batched, deduplicated loaders
//!
//! `BatchLoader` is the primitive; `RelationshipLoader` specializes it for
//! one-to-many lookups and `entity` supplies the store-backed batch functions.

pub mod batch;
pub mod entity;
pub mod relationship;

pub use batch::{BatchFn, BatchLoader, ErrorPolicy, LoaderOptions, LoaderStats, Slot};
pub use entity::{CustomerBatch, OrderBatch, OrdersByCustomer, ProductBatch};
pub use relationship::{GroupFn, RelationshipLoader};
