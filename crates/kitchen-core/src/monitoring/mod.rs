//! Background checks run by the engine on a timer.

pub mod overdue;

pub use overdue::{OverdueItem, OverdueMonitor};
