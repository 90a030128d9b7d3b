//! In-process realtime hub.
//!
//! Events are published on a tokio broadcast channel shared between the
//! publisher (typically the in-memory backend) and every board in the same
//! process. Each monitoring source holds its own receiver and forwards into
//! the engine's channel. A receiver that falls behind the channel capacity
//! reports how many events it missed instead of silently skipping them.

use crate::{
	RealtimeError, RealtimeFactory, RealtimeInterface, RealtimeMessage, RealtimeRegistry,
};
use async_trait::async_trait;
use kitchen_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, RealtimeEvent, Schema,
	ValidationError,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Realtime source backed by an in-process broadcast hub.
pub struct LocalRealtime {
	hub: broadcast::Sender<RealtimeEvent>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalRealtime {
	/// Creates a source with its own hub.
	pub fn new(capacity: usize) -> Self {
		let (hub, _) = broadcast::channel(capacity.max(1));
		Self::with_hub(hub)
	}

	/// Creates a source listening on an existing hub.
	pub fn with_hub(hub: broadcast::Sender<RealtimeEvent>) -> Self {
		Self {
			hub,
			task: Mutex::new(None),
		}
	}

	/// Sender side of the hub, for publishers.
	pub fn hub(&self) -> broadcast::Sender<RealtimeEvent> {
		self.hub.clone()
	}
}

#[async_trait]
impl RealtimeInterface for LocalRealtime {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalRealtimeSchema)
	}

	async fn start_monitoring(
		&self,
		sender: mpsc::UnboundedSender<RealtimeMessage>,
	) -> Result<(), RealtimeError> {
		let mut task = self.task.lock().await;
		if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
			return Err(RealtimeError::AlreadyMonitoring);
		}

		// Subscribe before spawning so nothing published after we return is lost.
		let mut receiver = self.hub.subscribe();
		*task = Some(tokio::spawn(async move {
			loop {
				let message = match receiver.recv().await {
					Ok(event) => RealtimeMessage::Event(event),
					Err(RecvError::Lagged(missed)) => {
						tracing::warn!(missed, "Realtime subscriber lagged");
						RealtimeMessage::Lagged { missed }
					}
					Err(RecvError::Closed) => {
						tracing::debug!("Realtime hub closed");
						break;
					}
				};
				if sender.send(message).is_err() {
					break;
				}
			}
		}));
		Ok(())
	}

	async fn stop_monitoring(&self) -> Result<(), RealtimeError> {
		if let Some(handle) = self.task.lock().await.take() {
			handle.abort();
			// Wait for the task to drop its receiver.
			handle.await.ok();
		}
		Ok(())
	}
}

/// Configuration schema for [`LocalRealtime`].
pub struct LocalRealtimeSchema;

impl ConfigSchema for LocalRealtimeSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"capacity",
				FieldType::Integer {
					min: Some(1),
					max: Some(65536),
				},
			)],
		);
		schema.validate(config)
	}
}

fn capacity_from(config: &toml::Value) -> Result<usize, RealtimeError> {
	LocalRealtimeSchema
		.validate(config)
		.map_err(|e| RealtimeError::Configuration(format!("Invalid configuration: {}", e)))?;
	Ok(config
		.get("capacity")
		.and_then(|v| v.as_integer())
		.map_or(DEFAULT_CAPACITY, |v| v as usize))
}

/// Builds a local source listening on `hub`, validating `config` first.
pub fn create_realtime_on_hub(
	config: &toml::Value,
	hub: broadcast::Sender<RealtimeEvent>,
) -> Result<Box<dyn RealtimeInterface>, RealtimeError> {
	capacity_from(config)?;
	Ok(Box::new(LocalRealtime::with_hub(hub)))
}

/// Factory function creating a local source with its own hub.
///
/// Configuration parameters:
/// - `capacity` (optional): events buffered per subscriber, 1..=65536
pub fn create_realtime(config: &toml::Value) -> Result<Box<dyn RealtimeInterface>, RealtimeError> {
	let capacity = capacity_from(config)?;
	Ok(Box::new(LocalRealtime::new(capacity)))
}

/// Hub shared by a publisher and local sources, sized from `config`.
pub fn hub_from_config(
	config: &toml::Value,
) -> Result<broadcast::Sender<RealtimeEvent>, RealtimeError> {
	let capacity = capacity_from(config)?;
	Ok(broadcast::channel(capacity).0)
}

/// Registry for the local realtime implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = RealtimeFactory;

	fn factory() -> Self::Factory {
		create_realtime
	}
}

impl RealtimeRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_forwards_events() {
		let source = LocalRealtime::new(4);
		let hub = source.hub();
		let (tx, mut rx) = mpsc::unbounded_channel();
		source.start_monitoring(tx).await.unwrap();

		hub.send(RealtimeEvent::OrderAccepted {
			order_id: "O1".to_string(),
		})
		.unwrap();

		assert_eq!(
			rx.recv().await.unwrap(),
			RealtimeMessage::Event(RealtimeEvent::OrderAccepted {
				order_id: "O1".to_string()
			})
		);
		source.stop_monitoring().await.unwrap();
		assert_eq!(hub.receiver_count(), 0);
	}

	#[tokio::test]
	async fn test_lagged_receiver_reports_missed_events() {
		let source = LocalRealtime::new(2);
		let hub = source.hub();
		let (tx, mut rx) = mpsc::unbounded_channel();

		// Subscribe, then overflow the hub before the forwarder gets to run.
		source.start_monitoring(tx).await.unwrap();
		for n in 0..5 {
			hub.send(RealtimeEvent::NewItemsForKitchen {
				order_id: format!("O{}", n),
			})
			.unwrap();
		}

		assert_eq!(rx.recv().await.unwrap(), RealtimeMessage::Lagged { missed: 3 });
		assert_eq!(
			rx.recv().await.unwrap(),
			RealtimeMessage::Event(RealtimeEvent::NewItemsForKitchen {
				order_id: "O3".to_string()
			})
		);
	}

	#[tokio::test]
	async fn test_double_start_rejected() {
		let source = LocalRealtime::new(4);
		let (tx, _rx) = mpsc::unbounded_channel();
		source.start_monitoring(tx.clone()).await.unwrap();
		assert!(matches!(
			source.start_monitoring(tx.clone()).await,
			Err(RealtimeError::AlreadyMonitoring)
		));

		source.stop_monitoring().await.unwrap();
		assert!(source.start_monitoring(tx).await.is_ok());
	}

	#[test]
	fn test_factory_validates_capacity() {
		let mut table = toml::map::Map::new();
		table.insert("capacity".to_string(), toml::Value::Integer(0));
		assert!(matches!(
			create_realtime(&toml::Value::Table(table)),
			Err(RealtimeError::Configuration(_))
		));

		let empty = toml::Value::Table(toml::map::Map::new());
		assert!(create_realtime(&empty).is_ok());
		assert!(hub_from_config(&empty).is_ok());
	}
}
