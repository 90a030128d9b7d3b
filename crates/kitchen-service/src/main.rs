//! Main entry point for the kitchen board service.
//!
//! Loads the configuration, wires the configured backend and realtime
//! implementations into a board engine, populates the board and runs the
//! event loop until interrupted.

use clap::Parser;
use kitchen_config::Config;
use kitchen_core::{KitchenBuilder, KitchenEngine, KitchenFactories};
use kitchen_types::{truncate_id, KitchenEvent, RealtimeEvent};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use kitchen_backend::implementations::memory::create_backend_with_notifier;
use kitchen_realtime::implementations::local::{create_realtime_on_hub, hub_from_config};

/// Command-line arguments for the kitchen board service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started kitchen board");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.board.id);

	let engine = build_engine(config)?;
	engine.initialize().await?;

	let logger = spawn_event_logger(&engine);
	engine.run().await?;
	logger.abort();

	tracing::info!("Stopped kitchen board");
	Ok(())
}

/// Builds a factory HashMap of boxed closures for one component type.
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                Box::new($factory) as Box<dyn Fn(&toml::Value) -> Result<Box<dyn $interface>, $error>>
            );
        )*
        factories
    }};
}

/// Wires the concrete implementations into a board engine.
///
/// The in-memory backend and the local realtime source share one hub, so
/// writes made through this board (or any other holding the same backend)
/// come back as realtime invalidations.
fn build_engine(config: Config) -> Result<KitchenEngine, Box<dyn std::error::Error>> {
	let hub = shared_hub(&config)?;
	let backend_hub = hub.clone();
	let realtime_hub = hub;

	let backend_factories = create_factory_map!(
		kitchen_backend::BackendInterface,
		kitchen_backend::BackendError,
		"memory" => move |c: &toml::Value| create_backend_with_notifier(c, backend_hub.clone()),
	);

	let realtime_factories = create_factory_map!(
		kitchen_realtime::RealtimeInterface,
		kitchen_realtime::RealtimeError,
		"local" => move |c: &toml::Value| create_realtime_on_hub(c, realtime_hub.clone()),
	);

	let factories = KitchenFactories {
		backend_factories,
		realtime_factories,
	};

	Ok(KitchenBuilder::new(config).build(factories)?)
}

/// Hub sized from the `local` realtime table, or with default capacity.
fn shared_hub(
	config: &Config,
) -> Result<broadcast::Sender<RealtimeEvent>, kitchen_realtime::RealtimeError> {
	match config.realtime.implementations.get("local") {
		Some(local) => hub_from_config(local),
		None => hub_from_config(&toml::Value::Table(toml::map::Map::new())),
	}
}

/// Logs every board event until the bus closes.
fn spawn_event_logger(engine: &KitchenEngine) -> JoinHandle<()> {
	let mut events = engine.event_bus().subscribe();
	tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(event) => log_event(&event),
				Err(RecvError::Lagged(missed)) => {
					tracing::warn!(missed, "Event logger lagged");
				}
				Err(RecvError::Closed) => break,
			}
		}
	})
}

fn log_event(event: &KitchenEvent) {
	match event {
		KitchenEvent::BucketRefreshed { status, orders } => {
			tracing::debug!(status = %status, orders, "Bucket refreshed");
		}
		KitchenEvent::TransitionApplied {
			mutation_id,
			from,
			to,
			item_ids,
		} => {
			tracing::info!(
				mutation_id = %truncate_id(mutation_id),
				from = %from,
				to = %to,
				items = item_ids.len(),
				"Items moved"
			);
		}
		KitchenEvent::TransitionRolledBack {
			mutation_id, error, ..
		} => {
			tracing::warn!(mutation_id = %truncate_id(mutation_id), error = %error, "Move undone");
		}
		KitchenEvent::ReconciliationDrift { status } => {
			tracing::debug!(status = %status, "Board corrected by server state");
		}
		KitchenEvent::ItemRejected {
			order_id,
			item_id,
			reason,
		} => {
			tracing::info!(
				order_id = %truncate_id(order_id),
				item_id = %truncate_id(item_id),
				reason = %reason,
				"Item rejected"
			);
		}
		KitchenEvent::OrderServed { order_id, item_ids } => {
			tracing::info!(order_id = %truncate_id(order_id), items = item_ids.len(), "Order served");
		}
		KitchenEvent::ItemOverdue {
			order_id,
			item_id,
			elapsed_minutes,
			budget_minutes,
		} => {
			tracing::warn!(
				order_id = %truncate_id(order_id),
				item_id = %truncate_id(item_id),
				elapsed_minutes,
				budget_minutes,
				"Item overdue"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::tempdir;

	const CONFIG: &str = r#"
[board]
id = "test-board"

[backend]
primary = "memory"
[backend.implementations.memory]

[realtime.implementations.local]
capacity = 16
"#;

	#[test]
	fn test_args_default_values() {
		let args = Args::try_parse_from(["kitchen-board"]).unwrap();

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args =
			Args::try_parse_from(["kitchen-board", "-c", "custom.toml", "--log-level", "debug"])
				.unwrap();

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_create_factory_map_macro() {
		use kitchen_backend::implementations::memory::create_backend;
		use kitchen_backend::{BackendError, BackendInterface};

		let factories = create_factory_map!(
			BackendInterface,
			BackendError,
			"memory" => create_backend,
		);

		assert_eq!(factories.len(), 1);
		assert!(factories.contains_key("memory"));
	}

	#[tokio::test]
	async fn test_build_engine_from_file() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(&path, CONFIG).unwrap();

		let config = Config::from_file(&path).await.unwrap();
		let engine = build_engine(config).unwrap();
		engine.initialize().await.unwrap();

		assert_eq!(engine.config().board.id, "test-board");
	}

	#[test]
	fn test_shared_hub_rejects_bad_capacity() {
		let mut config: Config = CONFIG.parse().unwrap();
		let mut table = toml::map::Map::new();
		table.insert("capacity".to_string(), toml::Value::Integer(0));
		config
			.realtime
			.implementations
			.insert("local".to_string(), toml::Value::Table(table));

		assert!(shared_hub(&config).is_err());
		assert!(build_engine(config).is_err());
	}
}
