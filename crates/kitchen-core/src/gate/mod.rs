//! Drag-and-drop gate in front of the transition coordinator.
//!
//! Keeps the in-progress drag (which order, from which column, what is
//! hovered) and turns a drop into either nothing or a transition request.

pub mod drag;

pub use drag::{DragGate, DropDecision, IgnoreReason};
