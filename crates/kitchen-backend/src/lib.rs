//! Authoritative backend boundary for the kitchen pipeline.
//!
//! The board never owns order state; it reads buckets from and writes status
//! changes to an authoritative backend. This crate defines that boundary as
//! [`BackendInterface`], wraps it in a [`BackendService`] that bounds every
//! request with a timeout, and ships an in-memory implementation.

use async_trait::async_trait;
use kitchen_types::{ConfigSchema, ImplementationRegistry, ItemStatus, Order};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors returned by backend requests.
#[derive(Debug, Error)]
pub enum BackendError {
	/// An item id does not exist on the server.
	#[error("Item not found: {0}")]
	NotFound(String),
	/// The server refused a status change.
	#[error("Item {item_id} cannot move from {from} to {to}")]
	InvalidTransition {
		item_id: String,
		from: ItemStatus,
		to: ItemStatus,
	},
	/// The server refused the write because it conflicts with its current state.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The request did not complete within the configured bound.
	#[error("Request timed out after {0:?}")]
	Timeout(Duration),
	/// The request could not reach the server or the server failed.
	#[error("Transport error: {0}")]
	Transport(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl BackendError {
	/// Whether repeating the same request may succeed.
	///
	/// Timeouts and transport failures are retryable; a request the server
	/// understood and refused is not.
	pub fn is_retryable(&self) -> bool {
		matches!(self, BackendError::Timeout(_) | BackendError::Transport(_))
	}

	/// Whether the server understood the request and refused it.
	pub fn is_refusal(&self) -> bool {
		matches!(
			self,
			BackendError::NotFound(_)
				| BackendError::InvalidTransition { .. }
				| BackendError::Conflict(_)
		)
	}
}

/// Interface of an authoritative order backend.
#[async_trait]
pub trait BackendInterface: Send + Sync {
	/// Returns every order having at least one item in `status`, restricted to
	/// the items in that status.
	async fn fetch_orders_by_status(&self, status: ItemStatus) -> Result<Vec<Order>, BackendError>;

	/// Moves all given items to `new_status` in one write.
	async fn bulk_update_status(
		&self,
		item_ids: &[String],
		new_status: ItemStatus,
	) -> Result<(), BackendError>;

	/// Rejects a single item with a reason.
	async fn reject_item(&self, item_id: &str, reason: &str) -> Result<(), BackendError>;

	/// Marks ready items as served.
	async fn mark_served(&self, item_ids: &[String]) -> Result<(), BackendError>;

	/// Returns the configuration schema of this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Signature of backend factory functions.
pub type BackendFactory = fn(&toml::Value) -> Result<Box<dyn BackendInterface>, BackendError>;

/// Registry trait for backend implementations.
pub trait BackendRegistry: ImplementationRegistry<Factory = BackendFactory> {}

/// Returns (name, factory) for every built-in backend implementation.
pub fn get_all_implementations() -> Vec<(&'static str, BackendFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// Backend wrapper that applies the request timeout.
///
/// A timed-out request is reported as [`BackendError::Timeout`] and treated
/// by callers exactly like a transport failure.
pub struct BackendService {
	backend: Box<dyn BackendInterface>,
	timeout: Duration,
}

impl BackendService {
	pub fn new(backend: Box<dyn BackendInterface>, timeout: Duration) -> Self {
		Self { backend, timeout }
	}

	/// Fetches the authoritative contents of a bucket.
	pub async fn fetch_orders_by_status(
		&self,
		status: ItemStatus,
	) -> Result<Vec<Order>, BackendError> {
		self.bounded(self.backend.fetch_orders_by_status(status))
			.await
	}

	pub async fn bulk_update_status(
		&self,
		item_ids: &[String],
		new_status: ItemStatus,
	) -> Result<(), BackendError> {
		self.bounded(self.backend.bulk_update_status(item_ids, new_status))
			.await
	}

	pub async fn reject_item(&self, item_id: &str, reason: &str) -> Result<(), BackendError> {
		self.bounded(self.backend.reject_item(item_id, reason)).await
	}

	pub async fn mark_served(&self, item_ids: &[String]) -> Result<(), BackendError> {
		self.bounded(self.backend.mark_served(item_ids)).await
	}

	/// Configured request bound.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	async fn bounded<T, F>(&self, request: F) -> Result<T, BackendError>
	where
		F: Future<Output = Result<T, BackendError>>,
	{
		match tokio::time::timeout(self.timeout, request).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Backend request timed out");
				Err(BackendError::Timeout(self.timeout))
			}
		}
	}
}
