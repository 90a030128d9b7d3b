//! Bulk status transitions.
//!
//! A transition moves every item an order holds in the source bucket, not
//! only the items named by the caller. The local move is applied before the
//! backend write is sent and is undone if the write fails. After a successful
//! write both buckets are refetched, since other viewers may have acted in
//! the meantime.

use crate::engine::event_bus::EventBus;
use crate::gate::IgnoreReason;
use crate::handlers::refresh::BucketRefresher;
use crate::state::can_transition;
use crate::store::PipelineStore;
use kitchen_backend::{BackendError, BackendService};
use kitchen_types::{truncate_id, ItemStatus, KitchenEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// Why a transition request did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoOpReason {
	/// None of the items is on the board; another viewer may already have moved them.
	NotOnBoard,
	/// The move is not a legal forward step (same column, skip, backwards).
	IllegalTransition { from: ItemStatus, to: ItemStatus },
	/// The items left the source bucket before the move could be applied.
	AlreadyMoved,
	/// A drag ended somewhere that does not mean a transition.
	DropIgnored(IgnoreReason),
}

/// Result of a transition request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
	NoOp(NoOpReason),
	Applied {
		mutation_id: Uuid,
		from: ItemStatus,
		to: ItemStatus,
		/// Every item sent to the backend.
		item_ids: Vec<String>,
		/// Buckets whose refetch differed from the optimistic view.
		drift: Vec<ItemStatus>,
	},
}

impl TransitionOutcome {
	pub fn is_noop(&self) -> bool {
		matches!(self, TransitionOutcome::NoOp(_))
	}
}

/// Errors surfaced by a transition request.
#[derive(Debug, Error)]
pub enum TransitionError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Transport error: {message}")]
	Transport { message: String, retryable: bool },
	#[error("Refused by server: {0}")]
	Refused(String),
}

impl TransitionError {
	/// Whether the user may simply try again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, TransitionError::Transport { retryable: true, .. })
	}
}

impl From<BackendError> for TransitionError {
	fn from(e: BackendError) -> Self {
		match e {
			e if e.is_refusal() => TransitionError::Refused(e.to_string()),
			other => TransitionError::Transport {
				retryable: other.is_retryable(),
				message: other.to_string(),
			},
		}
	}
}

/// Runs bulk transitions end to end.
pub struct TransitionCoordinator {
	store: Arc<PipelineStore>,
	backend: Arc<BackendService>,
	refresher: Arc<BucketRefresher>,
	event_bus: EventBus,
}

impl TransitionCoordinator {
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

	/// Moves the orders holding `item_ids` to `new_status`.
	#[instrument(skip_all, fields(to = %new_status, items = item_ids.len()))]
	pub async fn transition(
		&self,
		item_ids: &[String],
		new_status: ItemStatus,
	) -> Result<TransitionOutcome, TransitionError> {
		if item_ids.is_empty() {
			return Err(TransitionError::Validation(
				"At least one item id is required".to_string(),
			));
		}

		let Some(from) = self.store.locate_any(item_ids) else {
			tracing::debug!("Items not on board, ignoring transition");
			return Ok(TransitionOutcome::NoOp(NoOpReason::NotOnBoard));
		};
		if !can_transition(from, new_status) {
			tracing::debug!(from = %from, "Ignoring illegal transition");
			return Ok(TransitionOutcome::NoOp(NoOpReason::IllegalTransition {
				from,
				to: new_status,
			}));
		}

		let ctx = self.store.apply_optimistic_bulk(item_ids, from, new_status);
		if ctx.is_noop() {
			return Ok(TransitionOutcome::NoOp(NoOpReason::AlreadyMoved));
		}
		let mutation_id = ctx.id.to_string();

		match self.backend.bulk_update_status(&ctx.item_ids, new_status).await {
			Ok(()) => {
				let mut drift = Vec::new();
				for status in [from, new_status] {
					match self.refresher.refresh(status).await {
						Ok(true) => {
							tracing::debug!(status = %status, "Refetch differs from optimistic view");
							self.event_bus
								.publish(KitchenEvent::ReconciliationDrift { status })
								.ok();
							drift.push(status);
						}
						Ok(false) => {}
						// The next invalidation of this bucket heals it.
						Err(e) => {
							tracing::warn!(status = %status, error = %e, "Reconciliation refetch failed")
						}
					}
				}

				tracing::info!(
					mutation_id = %truncate_id(&mutation_id),
					from = %from,
					orders = ctx.order_ids.len(),
					"Transition applied"
				);
				self.event_bus
					.publish(KitchenEvent::TransitionApplied {
						mutation_id,
						from,
						to: new_status,
						item_ids: ctx.item_ids.clone(),
					})
					.ok();
				Ok(TransitionOutcome::Applied {
					mutation_id: ctx.id,
					from,
					to: new_status,
					item_ids: ctx.item_ids,
					drift,
				})
			}
			Err(e) => {
				let report = self.store.rollback(&ctx);
				let error = TransitionError::from(e);

				// A refusal means our view of these buckets is wrong.
				let stale = match error {
					TransitionError::Refused(_) => vec![from, new_status],
					_ => report.stale,
				};
				if let Err(e) = self.refresher.refresh_many(&stale).await {
					tracing::warn!(error = %e, "Refetch after rollback failed");
				}

				tracing::warn!(
					mutation_id = %truncate_id(&mutation_id),
					error = %error,
					"Transition rolled back"
				);
				self.event_bus
					.publish(KitchenEvent::TransitionRolledBack {
						mutation_id,
						from,
						to: new_status,
						error: error.to_string(),
					})
					.ok();
				Err(error)
			}
		}
	}
}
