//! In-memory authoritative backend.
//!
//! Holds every order in process memory and enforces the server side of the
//! item lifecycle. Useful for development, demos and tests. Orders can be
//! seeded from a JSON file, and an optional realtime hub is notified after
//! every successful write so other viewers converge.

use crate::{BackendError, BackendFactory, BackendInterface, BackendRegistry};
use async_trait::async_trait;
use kitchen_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, ItemStatus, Order, RealtimeEvent,
	Schema, ValidationError,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// In-memory backend.
pub struct MemoryBackend {
	/// Orders in acceptance order, with every item at its current status.
	orders: Arc<RwLock<Vec<Order>>>,
	/// Rejection reasons by item id.
	rejections: Arc<RwLock<HashMap<String, String>>>,
	/// Realtime hub notified after writes.
	notifier: Option<broadcast::Sender<RealtimeEvent>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::with_orders(Vec::new())
	}

	/// Creates a backend holding the given orders.
	pub fn with_orders(orders: Vec<Order>) -> Self {
		Self {
			orders: Arc::new(RwLock::new(orders)),
			rejections: Arc::new(RwLock::new(HashMap::new())),
			notifier: None,
		}
	}

	/// Publishes realtime events on `notifier` after each write.
	pub fn with_notifier(mut self, notifier: broadcast::Sender<RealtimeEvent>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	/// Reads seed orders from a JSON array file.
	pub fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<Order>, BackendError> {
		let path = path.as_ref();
		let bytes = std::fs::read(path).map_err(|e| {
			BackendError::Configuration(format!("Cannot read seed file {}: {}", path.display(), e))
		})?;
		serde_json::from_slice(&bytes).map_err(|e| BackendError::Serialization(e.to_string()))
	}

	/// Records a newly accepted order, as front-of-house would.
	///
	/// Every item enters the pipeline as ACCEPTED regardless of the status it
	/// was submitted with.
	pub async fn accept_order(&self, mut order: Order) -> Result<(), BackendError> {
		{
			let mut orders = self.orders.write().await;
			if orders.iter().any(|existing| existing.id == order.id) {
				return Err(BackendError::Conflict(format!(
					"Order {} already exists",
					order.id
				)));
			}
			for item in &mut order.items {
				item.status = ItemStatus::Accepted;
				item.order_id = order.id.clone();
			}
			orders.push(order.clone());
		}

		tracing::debug!(order_id = %order.id, items = order.items.len(), "Order accepted");
		self.notify(RealtimeEvent::OrderAccepted { order_id: order.id });
		Ok(())
	}

	/// Reason recorded when an item was rejected.
	pub async fn rejection_reason(&self, item_id: &str) -> Option<String> {
		self.rejections.read().await.get(item_id).cloned()
	}

	/// Current status of an item.
	pub async fn item_status(&self, item_id: &str) -> Option<ItemStatus> {
		self.orders
			.read()
			.await
			.iter()
			.flat_map(|order| order.items.iter())
			.find(|item| item.id == item_id)
			.map(|item| item.status)
	}

	/// Checks every item before applying any change, so a write is all or nothing.
	///
	/// Returns the ids of the orders touched.
	fn apply_all<F>(
		orders: &mut [Order],
		item_ids: &[String],
		to: ItemStatus,
		allowed: F,
	) -> Result<BTreeSet<String>, BackendError>
	where
		F: Fn(ItemStatus) -> bool,
	{
		for item_id in item_ids {
			let item = orders
				.iter()
				.flat_map(|order| order.items.iter())
				.find(|item| &item.id == item_id)
				.ok_or_else(|| BackendError::NotFound(item_id.clone()))?;
			if !allowed(item.status) {
				return Err(BackendError::InvalidTransition {
					item_id: item_id.clone(),
					from: item.status,
					to,
				});
			}
		}

		let mut touched = BTreeSet::new();
		for order in orders.iter_mut() {
			for item in order.items.iter_mut() {
				if item_ids.contains(&item.id) {
					item.status = to;
					touched.insert(order.id.clone());
				}
			}
		}
		Ok(touched)
	}

	fn notify(&self, event: RealtimeEvent) {
		if let Some(notifier) = &self.notifier {
			// No subscribers is fine.
			notifier.send(event).ok();
		}
	}

	fn notify_updated(&self, order_ids: BTreeSet<String>, status: ItemStatus) {
		for order_id in order_ids {
			self.notify(RealtimeEvent::OrderUpdated { order_id, status });
		}
	}
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl BackendInterface for MemoryBackend {
	async fn fetch_orders_by_status(&self, status: ItemStatus) -> Result<Vec<Order>, BackendError> {
		let orders = self.orders.read().await;
		Ok(orders
			.iter()
			.filter_map(|order| order.with_items_in(status))
			.collect())
	}

	async fn bulk_update_status(
		&self,
		item_ids: &[String],
		new_status: ItemStatus,
	) -> Result<(), BackendError> {
		// Items only ever move forward; terminal statuses have their own writes.
		if !new_status.is_board_status() {
			return Err(BackendError::Conflict(format!(
				"Bulk update cannot target {}",
				new_status
			)));
		}
		let touched = {
			let mut orders = self.orders.write().await;
			Self::apply_all(&mut orders, item_ids, new_status, |from| {
				from.is_board_status() && from < new_status
			})?
		};
		self.notify_updated(touched, new_status);
		Ok(())
	}

	async fn reject_item(&self, item_id: &str, reason: &str) -> Result<(), BackendError> {
		let item_ids = [item_id.to_string()];
		let touched = {
			let mut orders = self.orders.write().await;
			Self::apply_all(&mut orders, &item_ids, ItemStatus::Rejected, |from| {
				matches!(from, ItemStatus::Accepted | ItemStatus::Preparing)
			})?
		};
		self.rejections
			.write()
			.await
			.insert(item_id.to_string(), reason.to_string());
		self.notify_updated(touched, ItemStatus::Rejected);
		Ok(())
	}

	async fn mark_served(&self, item_ids: &[String]) -> Result<(), BackendError> {
		let touched = {
			let mut orders = self.orders.write().await;
			Self::apply_all(&mut orders, item_ids, ItemStatus::Served, |from| {
				from == ItemStatus::Ready
			})?
		};
		self.notify_updated(touched, ItemStatus::Served);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryBackendSchema)
	}
}

/// Configuration schema for [`MemoryBackend`].
pub struct MemoryBackendSchema;

impl ConfigSchema for MemoryBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("seed_file", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("seed_file cannot be empty".to_string())
						}
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory backend from configuration.
///
/// Configuration parameters:
/// - `seed_file` (optional): JSON file with an array of orders to start from
pub fn create_backend(config: &toml::Value) -> Result<Box<dyn BackendInterface>, BackendError> {
	Ok(Box::new(memory_backend_from(config)?))
}

/// Like [`create_backend`], but publishes realtime events on `hub` after writes.
pub fn create_backend_with_notifier(
	config: &toml::Value,
	hub: broadcast::Sender<RealtimeEvent>,
) -> Result<Box<dyn BackendInterface>, BackendError> {
	Ok(Box::new(memory_backend_from(config)?.with_notifier(hub)))
}

fn memory_backend_from(config: &toml::Value) -> Result<MemoryBackend, BackendError> {
	MemoryBackendSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(format!("Invalid configuration: {}", e)))?;

	let orders = match config.get("seed_file").and_then(|v| v.as_str()) {
		Some(path) => MemoryBackend::load_seed_file(path)?,
		None => Vec::new(),
	};
	tracing::info!(orders = orders.len(), "Memory backend ready");
	Ok(MemoryBackend::with_orders(orders))
}

/// Registry for the memory backend implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{DateTime, Utc};
	use kitchen_types::{MenuItemRef, OrderItem, TableRef};
	use rust_decimal::Decimal;

	fn item(id: &str, order_id: &str, status: ItemStatus) -> OrderItem {
		OrderItem {
			id: id.to_string(),
			order_id: order_id.to_string(),
			menu_item: MenuItemRef {
				id: "m1".to_string(),
				name: "Bun cha".to_string(),
				prep_time_minutes: Some(10),
			},
			quantity: 1,
			unit_price: Decimal::new(1200, 2),
			note: None,
			modifiers: Vec::new(),
			created_at: DateTime::<Utc>::UNIX_EPOCH,
			status,
		}
	}

	fn order(id: &str, items: Vec<OrderItem>) -> Order {
		Order {
			id: id.to_string(),
			order_number: format!("#{}", id),
			table: TableRef {
				number: 1,
				location: None,
			},
			created_at: DateTime::<Utc>::UNIX_EPOCH,
			items,
		}
	}

	fn split_order() -> Order {
		order(
			"O1",
			vec![
				item("i1", "O1", ItemStatus::Preparing),
				item("i2", "O1", ItemStatus::Preparing),
				item("i3", "O1", ItemStatus::Ready),
			],
		)
	}

	#[tokio::test]
	async fn test_fetch_splits_orders_by_status() {
		let backend = MemoryBackend::with_orders(vec![split_order()]);

		let preparing = backend
			.fetch_orders_by_status(ItemStatus::Preparing)
			.await
			.unwrap();
		assert_eq!(preparing.len(), 1);
		assert_eq!(preparing[0].items.len(), 2);

		let ready = backend.fetch_orders_by_status(ItemStatus::Ready).await.unwrap();
		assert_eq!(ready[0].items[0].id, "i3");

		assert!(backend
			.fetch_orders_by_status(ItemStatus::Accepted)
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test]
	async fn test_bulk_update_is_all_or_nothing() {
		let backend = MemoryBackend::with_orders(vec![split_order()]);

		// i3 is already READY, so moving it to READY again is refused and i1 stays put.
		let result = backend
			.bulk_update_status(&["i1".to_string(), "i3".to_string()], ItemStatus::Ready)
			.await;
		assert!(matches!(result, Err(BackendError::InvalidTransition { .. })));
		assert_eq!(backend.item_status("i1").await, Some(ItemStatus::Preparing));

		backend
			.bulk_update_status(&["i1".to_string(), "i2".to_string()], ItemStatus::Ready)
			.await
			.unwrap();
		assert_eq!(backend.item_status("i2").await, Some(ItemStatus::Ready));

		let result = backend
			.bulk_update_status(&["missing".to_string()], ItemStatus::Ready)
			.await;
		assert!(matches!(result, Err(BackendError::NotFound(id)) if id == "missing"));

		let err = backend
			.bulk_update_status(&["i3".to_string()], ItemStatus::Served)
			.await
			.unwrap_err();
		assert!(matches!(err, BackendError::Conflict(_)));
		assert!(!err.is_retryable());
		assert_eq!(backend.item_status("i3").await, Some(ItemStatus::Ready));
	}

	#[tokio::test]
	async fn test_reject_and_serve_rules() {
		let backend = MemoryBackend::with_orders(vec![split_order()]);

		let result = backend.reject_item("i3", "too late").await;
		assert!(matches!(result, Err(BackendError::InvalidTransition { .. })));

		backend.reject_item("i1", "Out of stock").await.unwrap();
		assert_eq!(backend.item_status("i1").await, Some(ItemStatus::Rejected));
		assert_eq!(
			backend.rejection_reason("i1").await.as_deref(),
			Some("Out of stock")
		);

		let result = backend.mark_served(&["i2".to_string()]).await;
		assert!(matches!(result, Err(BackendError::InvalidTransition { .. })));
		backend.mark_served(&["i3".to_string()]).await.unwrap();
		assert_eq!(backend.item_status("i3").await, Some(ItemStatus::Served));
	}

	#[tokio::test]
	async fn test_writes_notify_hub() {
		let (tx, mut rx) = broadcast::channel(16);
		let backend = MemoryBackend::new().with_notifier(tx);

		backend
			.accept_order(order("O7", vec![item("i7", "O7", ItemStatus::Ready)]))
			.await
			.unwrap();
		assert_eq!(
			rx.recv().await.unwrap(),
			RealtimeEvent::OrderAccepted {
				order_id: "O7".to_string()
			}
		);
		assert_eq!(backend.item_status("i7").await, Some(ItemStatus::Accepted));

		backend
			.bulk_update_status(&["i7".to_string()], ItemStatus::Preparing)
			.await
			.unwrap();
		assert_eq!(
			rx.recv().await.unwrap(),
			RealtimeEvent::OrderUpdated {
				order_id: "O7".to_string(),
				status: ItemStatus::Preparing,
			}
		);

		let duplicate = backend.accept_order(order("O7", vec![])).await.unwrap_err();
		assert!(matches!(duplicate, BackendError::Conflict(_)));
		assert!(!duplicate.is_retryable());
	}

	#[test]
	fn test_factory_with_seed_file() {
		let temp_dir = tempfile::TempDir::new().unwrap();
		let path = temp_dir.path().join("orders.json");
		std::fs::write(&path, serde_json::to_vec(&vec![split_order()]).unwrap()).unwrap();

		let mut table = toml::map::Map::new();
		table.insert(
			"seed_file".to_string(),
			toml::Value::String(path.display().to_string()),
		);
		assert!(create_backend(&toml::Value::Table(table)).is_ok());

		let mut table = toml::map::Map::new();
		table.insert("seed_file".to_string(), toml::Value::Integer(3));
		assert!(matches!(
			create_backend(&toml::Value::Table(table)),
			Err(BackendError::Configuration(_))
		));
	}
}
