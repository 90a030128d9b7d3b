//! Realtime event subscription for the kitchen pipeline.
//!
//! The server pushes small notifications whenever orders are accepted or
//! change status. This crate defines the boundary a transport implements,
//! [`RealtimeInterface`], and a [`RealtimeService`] that fans several sources
//! into one channel consumed by the board engine. Delivery is at-least-once;
//! consumers only use messages as invalidation triggers, so duplicates are
//! harmless.

use async_trait::async_trait;
use kitchen_types::{ConfigSchema, ImplementationRegistry, RealtimeEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur in realtime sources.
#[derive(Debug, Error)]
pub enum RealtimeError {
	#[error("Connection error: {0}")]
	Connection(String),
	#[error("Already monitoring")]
	AlreadyMonitoring,
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Message delivered by a realtime source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeMessage {
	/// An event pushed by the server.
	Event(RealtimeEvent),
	/// The source fell behind and dropped events; every bucket may be stale.
	Lagged { missed: u64 },
}

/// Interface of a realtime event source.
#[async_trait]
pub trait RealtimeInterface: Send + Sync {
	/// Returns the configuration schema of this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Starts forwarding messages into `sender` until stopped.
	///
	/// Events published after this returns are guaranteed to be forwarded.
	async fn start_monitoring(
		&self,
		sender: mpsc::UnboundedSender<RealtimeMessage>,
	) -> Result<(), RealtimeError>;

	/// Stops forwarding and releases the subscription.
	async fn stop_monitoring(&self) -> Result<(), RealtimeError>;
}

/// Signature of realtime factory functions.
pub type RealtimeFactory = fn(&toml::Value) -> Result<Box<dyn RealtimeInterface>, RealtimeError>;

/// Registry trait for realtime implementations.
pub trait RealtimeRegistry: ImplementationRegistry<Factory = RealtimeFactory> {}

/// Returns (name, factory) for every built-in realtime implementation.
pub fn get_all_implementations() -> Vec<(&'static str, RealtimeFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Manages every configured realtime source.
pub struct RealtimeService {
	implementations: Vec<Box<dyn RealtimeInterface>>,
}

impl RealtimeService {
	pub fn new(implementations: Vec<Box<dyn RealtimeInterface>>) -> Self {
		Self { implementations }
	}

	/// Whether any source is configured.
	pub fn is_empty(&self) -> bool {
		self.implementations.is_empty()
	}

	/// Starts every source, all forwarding into the same channel.
	///
	/// Sources started before a failing one are stopped again.
	pub async fn start_all(
		&self,
		sender: mpsc::UnboundedSender<RealtimeMessage>,
	) -> Result<(), RealtimeError> {
		for (index, implementation) in self.implementations.iter().enumerate() {
			if let Err(e) = implementation.start_monitoring(sender.clone()).await {
				for started in &self.implementations[..index] {
					started.stop_monitoring().await.ok();
				}
				return Err(e);
			}
		}
		Ok(())
	}

	/// Stops every source, returning the first error after trying all of them.
	pub async fn stop_all(&self) -> Result<(), RealtimeError> {
		let mut first_error = None;
		for implementation in &self.implementations {
			if let Err(e) = implementation.stop_monitoring().await {
				tracing::warn!(error = %e, "Failed to stop realtime source");
				first_error.get_or_insert(e);
			}
		}
		first_error.map_or(Ok(()), Err)
	}
}
