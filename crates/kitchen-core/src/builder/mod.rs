//! Builder for constructing kitchen engines.
//!
//! Composes a [`KitchenEngine`] from the configuration and factory maps for
//! the backend and realtime implementations. Factories may be plain
//! functions or closures, which lets the binary share one realtime hub
//! between the in-memory backend and the local realtime source.

use crate::engine::{event_bus::EventBus, KitchenEngine};
use crate::overdue::{Clock, SystemClock};
use kitchen_backend::{BackendError, BackendInterface, BackendService};
use kitchen_config::Config;
use kitchen_realtime::{RealtimeError, RealtimeInterface, RealtimeService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the engine's event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct KitchenFactories<BF, RF> {
	pub backend_factories: HashMap<String, BF>,
	pub realtime_factories: HashMap<String, RF>,
}

/// Builder for a [`KitchenEngine`].
pub struct KitchenBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl KitchenBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the wall clock, for tests and replays.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Instantiates the configured implementations and assembles the engine.
	pub fn build<BF, RF>(
		self,
		factories: KitchenFactories<BF, RF>,
	) -> Result<KitchenEngine, BuilderError>
	where
		BF: Fn(&toml::Value) -> Result<Box<dyn BackendInterface>, BackendError>,
		RF: Fn(&toml::Value) -> Result<Box<dyn RealtimeInterface>, RealtimeError>,
	{
		let primary = &self.config.backend.primary;
		let backend_config = self.config.backend.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary backend '{}' is not configured", primary))
		})?;
		let factory = factories.backend_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("No factory for backend '{}'", primary))
		})?;
		let implementation = factory(backend_config).map_err(|e| {
			tracing::error!(
				component = "backend",
				implementation = %primary,
				error = %e,
				"Failed to create backend implementation"
			);
			BuilderError::Config(format!(
				"Failed to create backend implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "backend", implementation = %primary, "Loaded");
		let backend = Arc::new(BackendService::new(
			implementation,
			self.config.board.request_timeout(),
		));

		let mut realtime_impls = Vec::new();
		for (name, config) in &self.config.realtime.implementations {
			let Some(factory) = factories.realtime_factories.get(name) else {
				tracing::warn!(component = "realtime", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					tracing::info!(component = "realtime", implementation = %name, "Loaded");
					realtime_impls.push(implementation);
				}
				Err(e) => {
					tracing::error!(
						component = "realtime",
						implementation = %name,
						error = %e,
						"Failed to create realtime implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create realtime implementation '{}': {}",
						name, e
					)));
				}
			}
		}
		if realtime_impls.is_empty() {
			tracing::warn!("No realtime source configured; board only refreshes after its own writes");
		}
		let realtime = Arc::new(RealtimeService::new(realtime_impls));

		Ok(KitchenEngine::new(
			self.config,
			backend,
			realtime,
			EventBus::new(EVENT_BUS_CAPACITY),
			self.clock,
		))
	}
}
