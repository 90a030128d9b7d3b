//! Kitchen board engine.
//!
//! Owns one board's store replica and wires the handlers to it. The engine
//! exposes the board actions (transition, reject, serve, drag and drop) and
//! runs the event loop that applies realtime invalidations and the periodic
//! overdue check until shutdown.

pub mod event_bus;

use crate::gate::{DragGate, DropDecision};
use crate::handlers::{
	BucketRefresher, NoOpReason, RealtimeHandler, RejectionError, RejectionHandler, ServeError,
	ServeHandler, TransitionCoordinator, TransitionError, TransitionOutcome,
};
use crate::monitoring::{OverdueItem, OverdueMonitor};
use crate::overdue::{elapsed_label, Clock, OverdueEvaluator};
use crate::store::PipelineStore;
use chrono::{DateTime, Utc};
use kitchen_backend::BackendService;
use kitchen_config::Config;
use kitchen_realtime::RealtimeService;
use kitchen_types::ItemStatus;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("Handler error: {0}")]
	Handler(String),
}

/// One kitchen board and its connection to the backend.
#[derive(Clone)]
pub struct KitchenEngine {
	pub(crate) config: Config,
	/// Local replica of the board buckets.
	pub(crate) store: Arc<PipelineStore>,
	pub(crate) realtime: Arc<RealtimeService>,
	pub(crate) event_bus: event_bus::EventBus,
	pub(crate) clock: Arc<dyn Clock>,
	refresher: Arc<BucketRefresher>,
	transition_coordinator: Arc<TransitionCoordinator>,
	rejection_handler: Arc<RejectionHandler>,
	serve_handler: Arc<ServeHandler>,
	realtime_handler: Arc<RealtimeHandler>,
	overdue_monitor: Arc<OverdueMonitor>,
	drag_gate: Arc<Mutex<DragGate>>,
}

impl KitchenEngine {
	pub fn new(
		config: Config,
		backend: Arc<BackendService>,
		realtime: Arc<RealtimeService>,
		event_bus: event_bus::EventBus,
		clock: Arc<dyn Clock>,
	) -> Self {
		let store = Arc::new(PipelineStore::new());

		let refresher = Arc::new(BucketRefresher::new(
			store.clone(),
			backend.clone(),
			event_bus.clone(),
		));

		let transition_coordinator = Arc::new(TransitionCoordinator::new(
			store.clone(),
			backend.clone(),
			refresher.clone(),
			event_bus.clone(),
		));

		let rejection_handler = Arc::new(RejectionHandler::new(
			store.clone(),
			backend.clone(),
			refresher.clone(),
			event_bus.clone(),
		));

		let serve_handler = Arc::new(ServeHandler::new(
			store.clone(),
			backend,
			refresher.clone(),
			event_bus.clone(),
		));

		let realtime_handler = Arc::new(RealtimeHandler::new(refresher.clone()));

		let overdue_monitor = Arc::new(OverdueMonitor::new(
			store.clone(),
			OverdueEvaluator::new(config.board.default_prep_minutes),
			clock.clone(),
			event_bus.clone(),
		));

		Self {
			config,
			store,
			realtime,
			event_bus,
			clock,
			refresher,
			transition_coordinator,
			rejection_handler,
			serve_handler,
			realtime_handler,
			overdue_monitor,
			drag_gate: Arc::new(Mutex::new(DragGate::new())),
		}
	}

	/// Populates every board bucket from the backend.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		self.refresher
			.refresh_all()
			.await
			.map_err(|e| EngineError::Service(format!("Initial board load failed: {}", e)))?;
		tracing::info!(board = %self.config.board.id, "Board loaded");
		Ok(())
	}

	/// Runs the event loop until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			tokio::signal::ctrl_c().await.ok();
		})
		.await
	}

	/// Runs the event loop until `shutdown` completes.
	///
	/// Realtime messages are handled one at a time, in arrival order, so the
	/// last refetch issued is also the last one applied.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		let (realtime_tx, mut realtime_rx) = mpsc::unbounded_channel();
		self.realtime
			.start_all(realtime_tx)
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		let mut overdue_interval =
			tokio::time::interval(self.config.board.overdue_check_interval());
		overdue_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				Some(message) = realtime_rx.recv() => {
					if let Err(e) = self.realtime_handler.handle(message).await {
						tracing::warn!(error = %e, "Failed to apply realtime invalidation");
					}
				}

				_ = overdue_interval.tick() => {
					self.overdue_monitor.check();
				}

				_ = &mut shutdown => {
					tracing::info!("Shutting down board");
					break;
				}
			}
		}

		self.realtime
			.stop_all()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		Ok(())
	}

	/// Moves the orders holding `item_ids` to `new_status`.
	pub async fn transition(
		&self,
		item_ids: &[String],
		new_status: ItemStatus,
	) -> Result<TransitionOutcome, TransitionError> {
		self.transition_coordinator
			.transition(item_ids, new_status)
			.await
	}

	/// Rejects one item with a reason.
	pub async fn reject(&self, item_id: &str, reason: &str) -> Result<(), RejectionError> {
		self.rejection_handler.reject(item_id, reason).await
	}

	/// Serves the ready items of an order.
	pub async fn serve_order(&self, order_id: &str) -> Result<Vec<String>, ServeError> {
		self.serve_handler.serve_order(order_id).await
	}

	pub fn begin_drag(&self, order_id: &str, source: ItemStatus) {
		self.drag_gate.lock().begin(order_id, source);
	}

	/// Updates the hovered column; returns whether it would accept the drop.
	pub fn hover(&self, target: Option<ItemStatus>) -> bool {
		self.drag_gate.lock().hover(target)
	}

	pub fn cancel_drag(&self) {
		self.drag_gate.lock().cancel();
	}

	/// Completes a drag by dropping on `target`.
	///
	/// Ignored drops never reach the transition coordinator.
	pub async fn drop_on(&self, target: ItemStatus) -> Result<TransitionOutcome, TransitionError> {
		let decision = self.drag_gate.lock().drop_on(target, &self.store);
		match decision {
			DropDecision::Ignore(reason) => {
				tracing::debug!(reason = ?reason, "Drop ignored");
				Ok(TransitionOutcome::NoOp(NoOpReason::DropIgnored(reason)))
			}
			DropDecision::Forward { item_ids, to, .. } => self.transition(&item_ids, to).await,
		}
	}

	/// Preparing items currently past their budget.
	pub fn overdue_items(&self) -> Vec<OverdueItem> {
		self.overdue_monitor.overdue_items()
	}

	/// Age label of a ticket relative to the engine clock.
	pub fn elapsed_label(&self, created_at: DateTime<Utc>) -> String {
		elapsed_label(created_at, self.clock.now())
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns the board's store replica.
	pub fn store(&self) -> &Arc<PipelineStore> {
		&self.store
	}
}
