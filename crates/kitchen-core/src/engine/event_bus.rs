//! In-process event bus for board events.
//!
//! Thin wrapper over a tokio broadcast channel. Every subscriber sees every
//! event published after it subscribed.

use kitchen_types::KitchenEvent;
use tokio::sync::broadcast;

/// Broadcast bus carrying [`KitchenEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<KitchenEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<KitchenEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed, which callers
	/// ignore with `.ok()`.
	pub fn publish(
		&self,
		event: KitchenEvent,
	) -> Result<usize, broadcast::error::SendError<KitchenEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kitchen_types::ItemStatus;

	#[tokio::test]
	async fn test_subscribers_receive_events() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.clone().subscribe();

		bus.publish(KitchenEvent::ReconciliationDrift {
			status: ItemStatus::Ready,
		})
		.unwrap();

		assert!(matches!(
			first.recv().await.unwrap(),
			KitchenEvent::ReconciliationDrift { status: ItemStatus::Ready }
		));
		assert!(matches!(
			second.recv().await.unwrap(),
			KitchenEvent::ReconciliationDrift { .. }
		));
	}

	#[test]
	fn test_publish_without_subscribers() {
		let bus = EventBus::new(8);
		assert!(bus
			.publish(KitchenEvent::BucketRefreshed {
				status: ItemStatus::Accepted,
				orders: 0,
			})
			.is_err());
	}
}
