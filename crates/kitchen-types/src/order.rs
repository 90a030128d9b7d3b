//! Order and order item types.
//!
//! An [`Order`] groups the line items placed for one table. Items of the same
//! order can sit in different statuses at once, so board buckets hold partial
//! copies of an order restricted to the items of that bucket's status.

use crate::ItemStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reference to the menu entry an item was ordered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemRef {
	/// Menu item identifier.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Preparation budget in minutes. Unset or zero means the board default applies.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub prep_time_minutes: Option<u32>,
}

/// Modifier option selected for an item (extra cheese, no onions, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierOption {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub price: Decimal,
}

/// One line item of a customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
	/// Unique item identifier.
	pub id: String,
	/// Identifier of the parent order.
	pub order_id: String,
	pub menu_item: MenuItemRef,
	pub quantity: u32,
	pub unit_price: Decimal,
	/// Free-text note from the waiter.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub note: Option<String>,
	#[serde(default)]
	pub modifiers: Vec<ModifierOption>,
	/// Assigned once when the order is accepted.
	pub created_at: DateTime<Utc>,
	pub status: ItemStatus,
}

/// Table an order was placed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
	pub number: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location: Option<String>,
}

/// A customer order and the items it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	/// Unique order identifier.
	pub id: String,
	/// Human-readable order number shown on tickets.
	pub order_number: String,
	pub table: TableRef,
	pub created_at: DateTime<Utc>,
	pub items: Vec<OrderItem>,
}

impl Order {
	/// Returns a copy of this order keeping only the items in `status`.
	///
	/// Returns `None` when no item of the order is in that status.
	pub fn with_items_in(&self, status: ItemStatus) -> Option<Order> {
		let items: Vec<OrderItem> = self
			.items
			.iter()
			.filter(|item| item.status == status)
			.cloned()
			.collect();
		if items.is_empty() {
			return None;
		}
		Some(Order {
			items,
			..self.clone_header()
		})
	}

	/// Ids of every item in the order.
	pub fn item_ids(&self) -> impl Iterator<Item = &str> {
		self.items.iter().map(|item| item.id.as_str())
	}

	/// Whether the order holds an item with the given id.
	pub fn contains_item(&self, item_id: &str) -> bool {
		self.items.iter().any(|item| item.id == item_id)
	}

	/// Copies the order's header fields with an empty item list.
	pub fn clone_header(&self) -> Order {
		Order {
			id: self.id.clone(),
			order_number: self.order_number.clone(),
			table: self.table.clone(),
			created_at: self.created_at,
			items: Vec::new(),
		}
	}
}
