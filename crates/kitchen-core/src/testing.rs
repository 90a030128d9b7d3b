//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kitchen_backend::implementations::memory::MemoryBackend;
use kitchen_backend::{BackendError, BackendInterface, BackendService};
use kitchen_types::{ConfigSchema, ItemStatus, MenuItemRef, Order, OrderItem, TableRef};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn item(id: &str, order_id: &str, status: ItemStatus) -> OrderItem {
	OrderItem {
		id: id.to_string(),
		order_id: order_id.to_string(),
		menu_item: MenuItemRef {
			id: format!("menu-{}", id),
			name: "Bun bo Hue".to_string(),
			prep_time_minutes: Some(10),
		},
		quantity: 1,
		unit_price: Decimal::new(1150, 2),
		note: None,
		modifiers: Vec::new(),
		created_at: DateTime::<Utc>::UNIX_EPOCH,
		status,
	}
}

pub fn order(id: &str, items: Vec<OrderItem>) -> Order {
	Order {
		id: id.to_string(),
		order_number: format!("#{}", id),
		table: TableRef {
			number: 7,
			location: None,
		},
		created_at: DateTime::<Utc>::UNIX_EPOCH,
		items,
	}
}

pub fn ids(values: &[&str]) -> Vec<String> {
	values.iter().map(|v| v.to_string()).collect()
}

/// How the next writes should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
	Transport,
	Refused,
}

/// Knobs and counters shared between a test and its [`FlakyBackend`].
#[derive(Default)]
pub struct Control {
	failure: Mutex<Option<Failure>>,
	fetches_down: AtomicBool,
	pub bulk_calls: AtomicUsize,
	pub fetch_calls: AtomicUsize,
}

impl Control {
	pub fn fail_with(&self, failure: Option<Failure>) {
		*self.failure.lock() = failure;
	}

	/// Makes every fetch fail with a transport error.
	pub fn fail_fetches(&self, down: bool) {
		self.fetches_down.store(down, Ordering::SeqCst);
	}

	pub fn bulk_calls(&self) -> usize {
		self.bulk_calls.load(Ordering::SeqCst)
	}

	pub fn fetch_calls(&self) -> usize {
		self.fetch_calls.load(Ordering::SeqCst)
	}

	fn check(&self) -> Result<(), BackendError> {
		match *self.failure.lock() {
			Some(Failure::Transport) => Err(BackendError::Transport("connection reset".into())),
			Some(Failure::Refused) => Err(BackendError::NotFound("refused".into())),
			None => Ok(()),
		}
	}
}

/// Memory backend whose writes can be made to fail.
pub struct FlakyBackend {
	inner: Arc<MemoryBackend>,
	control: Arc<Control>,
}

impl FlakyBackend {
	pub fn new(inner: Arc<MemoryBackend>, control: Arc<Control>) -> Self {
		Self { inner, control }
	}
}

#[async_trait]
impl BackendInterface for FlakyBackend {
	async fn fetch_orders_by_status(&self, status: ItemStatus) -> Result<Vec<Order>, BackendError> {
		self.control.fetch_calls.fetch_add(1, Ordering::SeqCst);
		if self.control.fetches_down.load(Ordering::SeqCst) {
			return Err(BackendError::Transport("fetch unavailable".into()));
		}
		self.inner.fetch_orders_by_status(status).await
	}

	async fn bulk_update_status(
		&self,
		item_ids: &[String],
		new_status: ItemStatus,
	) -> Result<(), BackendError> {
		self.control.bulk_calls.fetch_add(1, Ordering::SeqCst);
		self.control.check()?;
		self.inner.bulk_update_status(item_ids, new_status).await
	}

	async fn reject_item(&self, item_id: &str, reason: &str) -> Result<(), BackendError> {
		self.control.check()?;
		self.inner.reject_item(item_id, reason).await
	}

	async fn mark_served(&self, item_ids: &[String]) -> Result<(), BackendError> {
		self.control.check()?;
		self.inner.mark_served(item_ids).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}

/// Memory backend seeded with `orders`, wrapped for failure injection.
pub fn flaky_service(orders: Vec<Order>) -> (Arc<BackendService>, Arc<MemoryBackend>, Arc<Control>) {
	let memory = Arc::new(MemoryBackend::with_orders(orders));
	let control = Arc::new(Control::default());
	let service = BackendService::new(
		Box::new(FlakyBackend::new(memory.clone(), control.clone())),
		Duration::from_secs(5),
	);
	(Arc::new(service), memory, control)
}

/// O1 with two ACCEPTED items, O2 with one PREPARING item.
pub fn kitchen_orders() -> Vec<Order> {
	vec![
		order(
			"O1",
			vec![
				item("i1", "O1", ItemStatus::Accepted),
				item("i2", "O1", ItemStatus::Accepted),
			],
		),
		order("O2", vec![item("i3", "O2", ItemStatus::Preparing)]),
	]
}
