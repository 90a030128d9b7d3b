//! Handing ready orders to the table.

use crate::engine::event_bus::EventBus;
use crate::handlers::refresh::BucketRefresher;
use crate::store::PipelineStore;
use kitchen_backend::{BackendError, BackendService};
use kitchen_types::{truncate_id, ItemStatus, KitchenEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum ServeError {
	#[error("Order {0} has no ready items")]
	NothingReady(String),
	#[error("Transport error: {message}")]
	Transport { message: String, retryable: bool },
	#[error("Refused by server: {0}")]
	Refused(String),
}

impl From<BackendError> for ServeError {
	fn from(e: BackendError) -> Self {
		match e {
			e if e.is_refusal() => ServeError::Refused(e.to_string()),
			other => ServeError::Transport {
				retryable: other.is_retryable(),
				message: other.to_string(),
			},
		}
	}
}

/// Marks the ready items of an order as served.
pub struct ServeHandler {
	store: Arc<PipelineStore>,
	backend: Arc<BackendService>,
	refresher: Arc<BucketRefresher>,
	event_bus: EventBus,
}

impl ServeHandler {
	pub fn new(
		store: Arc<PipelineStore>,
		backend: Arc<BackendService>,
		refresher: Arc<BucketRefresher>,
		event_bus: EventBus,
	) -> Self {
		Self {
			store,
			backend,
			refresher,
			event_bus,
		}
	}

	/// Serves every READY item of `order_id`. Returns the ids served.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn serve_order(&self, order_id: &str) -> Result<Vec<String>, ServeError> {
		let item_ids = self.store.order_items_in(ItemStatus::Ready, order_id);
		if item_ids.is_empty() {
			return Err(ServeError::NothingReady(order_id.to_string()));
		}

		if let Err(e) = self.backend.mark_served(&item_ids).await {
			tracing::warn!(error = %e, "Mark served failed");
			let error = ServeError::from(e);
			if matches!(error, ServeError::Refused(_)) {
				self.refresher.refresh(ItemStatus::Ready).await.ok();
			}
			return Err(error);
		}

		self.store.remove_items(ItemStatus::Ready, &item_ids);
		tracing::info!(items = item_ids.len(), "Order served");
		self.event_bus
			.publish(KitchenEvent::OrderServed {
				order_id: order_id.to_string(),
				item_ids: item_ids.clone(),
			})
			.ok();

		if let Err(e) = self.refresher.refresh(ItemStatus::Ready).await {
			tracing::warn!(error = %e, "Refetch after serving failed");
		}
		Ok(item_ids)
	}
}
