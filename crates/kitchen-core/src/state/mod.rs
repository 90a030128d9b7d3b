//! Status model for order items.
//!
//! Defines which status changes the board may request. Bulk board moves are
//! restricted to strict forward steps; rejection and serving are separate,
//! single-purpose paths.

pub mod status;

pub use status::{can_transition, ItemStateMachine};
