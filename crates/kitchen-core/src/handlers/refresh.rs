//! Bucket refetch from the authoritative backend.
//!
//! Refetches can overlap (a reconciliation and a realtime invalidation of the
//! same bucket, say). Each fetch takes a ticket before it starts; a result is
//! only written if no fetch started later has already been applied, so the
//! store always holds the most recent authoritative view.

use crate::engine::event_bus::EventBus;
use crate::store::PipelineStore;
use kitchen_backend::{BackendError, BackendService};
use kitchen_types::{ItemStatus, KitchenEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Default, Clone, Copy)]
struct Tickets {
	issued: u64,
	applied: u64,
}

/// Replaces store buckets with fresh server contents.
pub struct BucketRefresher {
	store: Arc<PipelineStore>,
	backend: Arc<BackendService>,
	event_bus: EventBus,
	tickets: Mutex<HashMap<ItemStatus, Tickets>>,
}

impl BucketRefresher {
	pub fn new(store: Arc<PipelineStore>, backend: Arc<BackendService>, event_bus: EventBus) -> Self {
		Self {
			store,
			backend,
			event_bus,
			tickets: Mutex::new(HashMap::new()),
		}
	}

	/// Refetches one bucket. Returns whether its contents changed.
	#[instrument(skip_all, fields(status = %status))]
	pub async fn refresh(&self, status: ItemStatus) -> Result<bool, BackendError> {
		if !status.is_board_status() {
			return Ok(false);
		}

		let ticket = {
			let mut tickets = self.tickets.lock();
			let entry = tickets.entry(status).or_default();
			entry.issued += 1;
			entry.issued
		};

		let orders = self.backend.fetch_orders_by_status(status).await?;
		let count = orders.len();

		{
			let mut tickets = self.tickets.lock();
			let entry = tickets.entry(status).or_default();
			if entry.applied > ticket {
				tracing::debug!(ticket, applied = entry.applied, "Discarding superseded refetch");
				return Ok(false);
			}
			entry.applied = ticket;
		}

		let changed = self.store.replace(status, orders);
		tracing::debug!(orders = count, changed, "Bucket refreshed");
		self.event_bus
			.publish(KitchenEvent::BucketRefreshed {
				status,
				orders: count,
			})
			.ok();
		Ok(changed)
	}

	/// Refetches each bucket in turn. Every bucket is attempted; the first
	/// error is returned.
	pub async fn refresh_many(&self, statuses: &[ItemStatus]) -> Result<(), BackendError> {
		let mut first_error = None;
		for status in statuses {
			if let Err(e) = self.refresh(*status).await {
				tracing::warn!(status = %status, error = %e, "Bucket refresh failed");
				first_error.get_or_insert(e);
			}
		}
		first_error.map_or(Ok(()), Err)
	}

	/// Refetches every board bucket.
	pub async fn refresh_all(&self) -> Result<(), BackendError> {
		self.refresh_many(&ItemStatus::board_statuses()).await
	}
}
