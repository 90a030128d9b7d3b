//! Periodic overdue check over the PREPARING bucket.

use crate::engine::event_bus::EventBus;
use crate::overdue::{elapsed_minutes, Clock, OverdueEvaluator};
use crate::store::PipelineStore;
use kitchen_types::{truncate_id, ItemStatus, KitchenEvent};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// A preparing item past its budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueItem {
	pub order_id: String,
	pub item_id: String,
	pub elapsed_minutes: i64,
	pub budget_minutes: u32,
}

/// Alerts once per item that stays overdue.
pub struct OverdueMonitor {
	store: Arc<PipelineStore>,
	evaluator: OverdueEvaluator,
	clock: Arc<dyn Clock>,
	event_bus: EventBus,
	/// Items already alerted and still in PREPARING.
	alerted: Mutex<HashSet<String>>,
}

impl OverdueMonitor {
	pub fn new(
		store: Arc<PipelineStore>,
		evaluator: OverdueEvaluator,
		clock: Arc<dyn Clock>,
		event_bus: EventBus,
	) -> Self {
		Self {
			store,
			evaluator,
			clock,
			event_bus,
			alerted: Mutex::new(HashSet::new()),
		}
	}

	/// Preparing items currently past their budget.
	pub fn overdue_items(&self) -> Vec<OverdueItem> {
		let now = self.clock.now();
		self.store
			.get(ItemStatus::Preparing)
			.into_iter()
			.flat_map(|order| order.items)
			.filter(|item| self.evaluator.is_overdue(item, now))
			.map(|item| OverdueItem {
				elapsed_minutes: elapsed_minutes(item.created_at, now),
				budget_minutes: self.evaluator.budget_for(&item),
				order_id: item.order_id,
				item_id: item.id,
			})
			.collect()
	}

	/// Publishes an alert for each newly overdue item. Returns the items
	/// alerted by this call.
	pub fn check(&self) -> Vec<OverdueItem> {
		let overdue = self.overdue_items();
		let preparing: HashSet<String> = self
			.store
			.get(ItemStatus::Preparing)
			.iter()
			.flat_map(|order| order.item_ids().map(str::to_string))
			.collect();

		let mut alerted = self.alerted.lock();
		alerted.retain(|id| preparing.contains(id));

		let fresh: Vec<OverdueItem> = overdue
			.into_iter()
			.filter(|item| alerted.insert(item.item_id.clone()))
			.collect();
		drop(alerted);

		for item in &fresh {
			tracing::warn!(
				order_id = %truncate_id(&item.order_id),
				item_id = %truncate_id(&item.item_id),
				elapsed_minutes = item.elapsed_minutes,
				budget_minutes = item.budget_minutes,
				"Item overdue"
			);
			self.event_bus
				.publish(KitchenEvent::ItemOverdue {
					order_id: item.order_id.clone(),
					item_id: item.item_id.clone(),
					elapsed_minutes: item.elapsed_minutes,
					budget_minutes: item.budget_minutes,
				})
				.ok();
		}
		fresh
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::overdue::FixedClock;
	use crate::testing::{item, order};
	use chrono::{DateTime, Duration, Utc};

	fn monitor(store: Arc<PipelineStore>, clock: Arc<FixedClock>) -> OverdueMonitor {
		OverdueMonitor::new(store, OverdueEvaluator::default(), clock, EventBus::new(8))
	}

	#[test]
	fn test_alerts_once_until_item_leaves_preparing() {
		let store = Arc::new(PipelineStore::new());
		let clock = Arc::new(FixedClock::new(DateTime::<Utc>::UNIX_EPOCH));
		let monitor = monitor(store.clone(), clock.clone());
		let preparing = vec![order("O1", vec![item("i1", "O1", ItemStatus::Preparing)])];
		store.replace(ItemStatus::Preparing, preparing.clone());

		clock.advance(Duration::minutes(10));
		assert!(monitor.check().is_empty());

		clock.advance(Duration::minutes(1));
		let alerted = monitor.check();
		assert_eq!(alerted.len(), 1);
		assert_eq!(alerted[0].elapsed_minutes, 11);
		assert_eq!(alerted[0].budget_minutes, 10);
		assert!(monitor.check().is_empty());
		assert_eq!(monitor.overdue_items().len(), 1);

		store.replace(ItemStatus::Preparing, Vec::new());
		assert!(monitor.check().is_empty());
		store.replace(ItemStatus::Preparing, preparing);
		assert_eq!(monitor.check().len(), 1);
	}

	#[test]
	fn test_only_preparing_items_count() {
		let store = Arc::new(PipelineStore::new());
		let clock = Arc::new(FixedClock::new(
			DateTime::<Utc>::UNIX_EPOCH + Duration::hours(2),
		));
		let monitor = monitor(store.clone(), clock);
		store.replace(
			ItemStatus::Accepted,
			vec![order("O1", vec![item("i1", "O1", ItemStatus::Accepted)])],
		);
		store.replace(
			ItemStatus::Ready,
			vec![order("O2", vec![item("i2", "O2", ItemStatus::Ready)])],
		);

		assert!(monitor.overdue_items().is_empty());
	}
}
