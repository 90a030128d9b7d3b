//! Realtime invalidation.
//!
//! Server notifications are never applied to the cache directly. Each one
//! names the buckets it makes stale and those buckets are refetched.

use crate::handlers::refresh::BucketRefresher;
use kitchen_backend::BackendError;
use kitchen_realtime::RealtimeMessage;
use kitchen_types::{truncate_id, ItemStatus};
use std::sync::Arc;
use tracing::instrument;

pub struct RealtimeHandler {
	refresher: Arc<BucketRefresher>,
}

impl RealtimeHandler {
	pub fn new(refresher: Arc<BucketRefresher>) -> Self {
		Self { refresher }
	}

	/// Refetches the buckets made stale by `message`.
	#[instrument(skip_all)]
	pub async fn handle(&self, message: RealtimeMessage) -> Result<(), BackendError> {
		let stale = match &message {
			RealtimeMessage::Event(event) => {
				tracing::debug!(
					order_id = %truncate_id(event.order_id()),
					event = ?event,
					"Realtime event received"
				);
				event.stale_buckets()
			}
			RealtimeMessage::Lagged { missed } => {
				tracing::warn!(missed, "Realtime events dropped, resyncing board");
				ItemStatus::board_statuses().to_vec()
			}
		};
		self.refresher.refresh_many(&stale).await
	}
}
