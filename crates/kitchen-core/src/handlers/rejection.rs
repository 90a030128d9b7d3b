//! Single-item rejection.

use crate::engine::event_bus::EventBus;
use crate::handlers::refresh::BucketRefresher;
use crate::state::ItemStateMachine;
use crate::store::PipelineStore;
use kitchen_backend::{BackendError, BackendService};
use kitchen_types::{truncate_id, ItemStatus, KitchenEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors surfaced by a rejection request.
#[derive(Debug, Error)]
pub enum RejectionError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Item not on board: {0}")]
	UnknownItem(String),
	#[error("Item {item_id} is {status} and can no longer be rejected")]
	NotRejectable { item_id: String, status: ItemStatus },
	#[error("Transport error: {message}")]
	Transport { message: String, retryable: bool },
	#[error("Refused by server: {0}")]
	Refused(String),
}

impl From<BackendError> for RejectionError {
	fn from(e: BackendError) -> Self {
		match e {
			e if e.is_refusal() => RejectionError::Refused(e.to_string()),
			other => RejectionError::Transport {
				retryable: other.is_retryable(),
				message: other.to_string(),
			},
		}
	}
}

/// Rejects single items with a reason.
///
/// Nothing is changed locally until the server has accepted the rejection.
pub struct RejectionHandler {
	store: Arc<PipelineStore>,
	backend: Arc<BackendService>,
	refresher: Arc<BucketRefresher>,
	event_bus: EventBus,
}

impl RejectionHandler {
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

	#[instrument(skip_all, fields(item_id = %truncate_id(item_id)))]
	pub async fn reject(&self, item_id: &str, reason: &str) -> Result<(), RejectionError> {
		let reason = reason.trim();
		if reason.is_empty() {
			return Err(RejectionError::Validation(
				"A rejection reason is required".to_string(),
			));
		}

		let (status, item) = self
			.store
			.find_item(item_id)
			.ok_or_else(|| RejectionError::UnknownItem(item_id.to_string()))?;
		if !ItemStateMachine::can_reject(status) {
			return Err(RejectionError::NotRejectable {
				item_id: item_id.to_string(),
				status,
			});
		}

		if let Err(e) = self.backend.reject_item(item_id, reason).await {
			tracing::warn!(error = %e, "Rejection failed");
			let error = RejectionError::from(e);
			if matches!(error, RejectionError::Refused(_)) {
				if let Err(e) = self.refresher.refresh(status).await {
					tracing::warn!(error = %e, "Refetch after refused rejection failed");
				}
			}
			return Err(error);
		}

		self.store.remove_item(status, item_id);
		tracing::info!(order_id = %truncate_id(&item.order_id), reason, "Item rejected");
		self.event_bus
			.publish(KitchenEvent::ItemRejected {
				order_id: item.order_id,
				item_id: item_id.to_string(),
				reason: reason.to_string(),
			})
			.ok();

		if let Err(e) = self.refresher.refresh(status).await {
			tracing::warn!(error = %e, "Refetch after rejection failed");
		}
		Ok(())
	}
}
