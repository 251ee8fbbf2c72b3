//! Document store implementations
//!
//! Production deployments plug their own `DocumentStore`; the in-memory store
//! backs tests and local development.

pub mod memory;

pub use memory::MemoryStore;
