//! Common types module for the dispatch service.
//!
//! This module defines the core data types and structures shared by all
//! dispatch components: the order aggregate and its stops, shop and courier
//! records, inbound/outbound chat events, storage key namespaces, and the
//! configuration validation framework.

/// Inbound chat events and outbound reply types.
pub mod events;
/// Geographic primitives.
pub mod geo;
/// Order aggregate, stops, and status lifecycles.
pub mod order;
/// Shop and courier records.
pub mod party;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage key namespaces for persistent data.
pub mod storage;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use events::*;
pub use geo::*;
pub use order::*;
pub use party::*;
pub use registry::*;
pub use storage::*;
pub use validation::*;
