//! Event types for the kitchen pipeline.
//!
//! Two vocabularies live here. [`RealtimeEvent`] is what the server pushes to
//! every connected viewer; its payload is only a hint about which buckets went
//! stale and is never applied to the local cache directly. [`KitchenEvent`]
//! is published on the in-process event bus so views and loggers can follow
//! what the board engine does.

use crate::ItemStatus;
use serde::{Deserialize, Serialize};

/// Events pushed by the server over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RealtimeEvent {
	/// New items were released to the kitchen.
	NewItemsForKitchen { order_id: String },
	/// Front-of-house accepted an order.
	OrderAccepted { order_id: String },
	/// Another viewer changed the status of items of an order.
	OrderUpdated { order_id: String, status: ItemStatus },
}

impl RealtimeEvent {
	/// Board buckets made stale by this event.
	pub fn stale_buckets(&self) -> Vec<ItemStatus> {
		match self {
			RealtimeEvent::NewItemsForKitchen { .. } | RealtimeEvent::OrderAccepted { .. } => {
				vec![ItemStatus::Accepted]
			}
			// The items left the column before `status`; clear it before showing them again.
			RealtimeEvent::OrderUpdated { status, .. } if status.is_board_status() => {
				match status.previous_board_status() {
					Some(source) => vec![source, *status],
					None => vec![*status],
				}
			}
			// The item left the board; we cannot tell which column it came from.
			RealtimeEvent::OrderUpdated { .. } => ItemStatus::board_statuses().to_vec(),
		}
	}

	/// Id of the order the event refers to.
	pub fn order_id(&self) -> &str {
		match self {
			RealtimeEvent::NewItemsForKitchen { order_id }
			| RealtimeEvent::OrderAccepted { order_id }
			| RealtimeEvent::OrderUpdated { order_id, .. } => order_id,
		}
	}
}

/// Events published by the board engine on the local event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KitchenEvent {
	/// A bucket was replaced with an authoritative fetch.
	BucketRefreshed { status: ItemStatus, orders: usize },
	/// An optimistic bulk transition was confirmed by the server.
	TransitionApplied {
		mutation_id: String,
		from: ItemStatus,
		to: ItemStatus,
		item_ids: Vec<String>,
	},
	/// An optimistic bulk transition failed and was undone.
	TransitionRolledBack {
		mutation_id: String,
		from: ItemStatus,
		to: ItemStatus,
		error: String,
	},
	/// The refetch after a transition differed from the optimistic guess.
	ReconciliationDrift { status: ItemStatus },
	/// An item was rejected by the kitchen.
	ItemRejected {
		order_id: String,
		item_id: String,
		reason: String,
	},
	/// The ready items of an order were handed to the table.
	OrderServed {
		order_id: String,
		item_ids: Vec<String>,
	},
	/// A preparing item exceeded its preparation budget.
	ItemOverdue {
		order_id: String,
		item_id: String,
		elapsed_minutes: i64,
		budget_minutes: u32,
	},
}
