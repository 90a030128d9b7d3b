//! Item status transition table.
//!
//! Only two board moves exist: ACCEPTED → PREPARING and PREPARING → READY.
//! Anything else a board asks for (same-column drops, skipping a column,
//! moving backwards) is refused here and treated by callers as a silent no-op.

use kitchen_types::ItemStatus;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Static transition table; each status maps to the statuses a board move may reach.
static TRANSITIONS: Lazy<HashMap<ItemStatus, HashSet<ItemStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(ItemStatus::Accepted, HashSet::from([ItemStatus::Preparing]));
	m.insert(ItemStatus::Preparing, HashSet::from([ItemStatus::Ready]));
	// READY leaves the board through "mark served", not a board move.
	m.insert(ItemStatus::Ready, HashSet::new());
	m.insert(ItemStatus::Served, HashSet::new()); // terminal
	m.insert(ItemStatus::Rejected, HashSet::new()); // terminal
	m
});

/// Pure lookups over the item lifecycle.
pub struct ItemStateMachine;

impl ItemStateMachine {
	/// Whether a bulk board move from `from` to `to` is legal.
	pub fn can_transition(from: ItemStatus, to: ItemStatus) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|allowed| allowed.contains(&to))
	}

	/// The single legal board move out of `status`, if any.
	pub fn next(status: ItemStatus) -> Option<ItemStatus> {
		TRANSITIONS
			.get(&status)
			.and_then(|allowed| allowed.iter().next().copied())
	}

	/// Whether a single item in `status` may still be rejected.
	pub fn can_reject(status: ItemStatus) -> bool {
		matches!(status, ItemStatus::Accepted | ItemStatus::Preparing)
	}

	/// Whether an item in `status` may be marked served.
	pub fn can_serve(status: ItemStatus) -> bool {
		status == ItemStatus::Ready
	}
}

/// Shorthand for [`ItemStateMachine::can_transition`].
pub fn can_transition(from: ItemStatus, to: ItemStatus) -> bool {
	ItemStateMachine::can_transition(from, to)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_forward_board_steps_are_legal() {
		let legal = [
			(ItemStatus::Accepted, ItemStatus::Preparing),
			(ItemStatus::Preparing, ItemStatus::Ready),
		];
		for from in ItemStatus::all() {
			for to in ItemStatus::all() {
				assert_eq!(
					can_transition(from, to),
					legal.contains(&(from, to)),
					"{} -> {}",
					from,
					to
				);
			}
		}
	}

	#[test]
	fn test_next_step() {
		assert_eq!(
			ItemStateMachine::next(ItemStatus::Accepted),
			Some(ItemStatus::Preparing)
		);
		assert_eq!(
			ItemStateMachine::next(ItemStatus::Preparing),
			Some(ItemStatus::Ready)
		);
		assert_eq!(ItemStateMachine::next(ItemStatus::Ready), None);
		assert_eq!(ItemStateMachine::next(ItemStatus::Rejected), None);
	}

	#[test]
	fn test_reject_and_serve_paths() {
		assert!(ItemStateMachine::can_reject(ItemStatus::Accepted));
		assert!(ItemStateMachine::can_reject(ItemStatus::Preparing));
		assert!(!ItemStateMachine::can_reject(ItemStatus::Ready));
		assert!(!ItemStateMachine::can_reject(ItemStatus::Rejected));

		assert!(ItemStateMachine::can_serve(ItemStatus::Ready));
		assert!(!ItemStateMachine::can_serve(ItemStatus::Preparing));
		// Neither path is reachable through a bulk board move.
		assert!(!can_transition(ItemStatus::Ready, ItemStatus::Served));
		assert!(!can_transition(ItemStatus::Accepted, ItemStatus::Rejected));
	}
}
