//! Order item statuses.
//!
//! Only ACCEPTED, PREPARING and READY occupy a column on the kitchen board.
//! SERVED and REJECTED items leave the board entirely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a single order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
	/// Accepted by front-of-house, waiting for the kitchen.
	Accepted,
	/// Being cooked.
	Preparing,
	/// Cooked and waiting to be picked up.
	Ready,
	/// Delivered to the table.
	Served,
	/// Refused by the kitchen, with a reason.
	Rejected,
}

/// Error returned when a string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown item status: {0}")]
pub struct ParseStatusError(pub String);

impl ItemStatus {
	/// Board columns, in the order they are displayed.
	pub const fn board_statuses() -> [ItemStatus; 3] {
		[ItemStatus::Accepted, ItemStatus::Preparing, ItemStatus::Ready]
	}

	/// Returns every status, board columns first.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Accepted,
			Self::Preparing,
			Self::Ready,
			Self::Served,
			Self::Rejected,
		]
		.into_iter()
	}

	/// Whether items in this status are shown on the kitchen board.
	pub fn is_board_status(&self) -> bool {
		matches!(self, Self::Accepted | Self::Preparing | Self::Ready)
	}

	/// Board column items reach this column from.
	pub fn previous_board_status(&self) -> Option<ItemStatus> {
		match self {
			Self::Preparing => Some(Self::Accepted),
			Self::Ready => Some(Self::Preparing),
			_ => None,
		}
	}

	/// Whether this status ends the item's life in the pipeline.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Served | Self::Rejected)
	}

	/// Upper-case wire name of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Accepted => "ACCEPTED",
			Self::Preparing => "PREPARING",
			Self::Ready => "READY",
			Self::Served => "SERVED",
			Self::Rejected => "REJECTED",
		}
	}
}

impl fmt::Display for ItemStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ItemStatus {
	type Err = ParseStatusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| ParseStatusError(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_board_statuses() {
		let board = ItemStatus::board_statuses();
		assert_eq!(
			board,
			[ItemStatus::Accepted, ItemStatus::Preparing, ItemStatus::Ready]
		);
		assert!(board.iter().all(|s| s.is_board_status() && !s.is_terminal()));
		assert!(ItemStatus::Served.is_terminal());
		assert!(ItemStatus::Rejected.is_terminal());
		assert!(!ItemStatus::Rejected.is_board_status());

		assert_eq!(ItemStatus::Accepted.previous_board_status(), None);
		assert_eq!(
			ItemStatus::Ready.previous_board_status(),
			Some(ItemStatus::Preparing)
		);
		assert_eq!(ItemStatus::Served.previous_board_status(), None);
	}

	#[test]
	fn test_parse_and_display() {
		for status in ItemStatus::all() {
			assert_eq!(status.to_string().parse::<ItemStatus>().unwrap(), status);
		}
		assert_eq!("preparing".parse::<ItemStatus>().unwrap(), ItemStatus::Preparing);
		assert!("COOKING".parse::<ItemStatus>().is_err());
	}

	#[test]
	fn test_serde_uses_upper_case_names() {
		let json = serde_json::to_string(&ItemStatus::Ready).unwrap();
		assert_eq!(json, "\"READY\"");
		let parsed: ItemStatus = serde_json::from_str("\"ACCEPTED\"").unwrap();
		assert_eq!(parsed, ItemStatus::Accepted);
	}
}
