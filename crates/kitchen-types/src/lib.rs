//! Common types for the kitchen order pipeline.
//!
//! This crate defines the domain types shared by every pipeline component:
//! item statuses, orders and their line items, the realtime and local event
//! vocabularies, and the small configuration-validation framework used by
//! pluggable backend and realtime implementations.

/// Event types flowing in from the realtime channel and out over the local bus.
pub mod events;
/// Orders, line items and their menu references.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Order item statuses.
pub mod status;
/// Helpers for formatting identifiers.
pub mod utils;
/// Configuration validation types for implementation-specific tables.
pub mod validation;

pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use status::{ItemStatus, ParseStatusError};
pub use utils::truncate_id;
pub use validation::*;
