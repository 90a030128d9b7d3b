//! Core of the kitchen order pipeline.
//!
//! Coordinates order items as they move across the kitchen board
//! (ACCEPTED → PREPARING → READY) while many displays watch the same orders.
//! Each board holds a [`store::PipelineStore`] replica of the server state.
//! Status changes are applied optimistically, confirmed or rolled back
//! against the authoritative backend, and reconciled by refetching. Realtime
//! notifications from the server invalidate buckets so every replica
//! converges without polling.

pub mod builder;
pub mod engine;
pub mod gate;
pub mod handlers;
pub mod monitoring;
pub mod overdue;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use builder::{BuilderError, KitchenBuilder, KitchenFactories};
pub use engine::{event_bus::EventBus, EngineError, KitchenEngine};
pub use gate::{DragGate, DropDecision, IgnoreReason};
pub use handlers::{
	NoOpReason, RejectionError, ServeError, TransitionError, TransitionOutcome,
};
pub use monitoring::OverdueItem;
pub use overdue::{elapsed_label, Clock, FixedClock, OverdueEvaluator, SystemClock};
pub use state::ItemStateMachine;
pub use store::{MutationContext, PipelineStore, RollbackReport};
