//! Overdue evaluation and elapsed-time labels.
//!
//! Everything here takes `now` as an argument. The live time source is the
//! [`Clock`] injected into the engine, so tests never depend on the wall clock.

use chrono::{DateTime, Duration, Utc};
use kitchen_types::OrderItem;
use parking_lot::Mutex;

/// Preparation budget used when a menu item does not define one.
pub const DEFAULT_PREP_MINUTES: u32 = 15;

/// Source of the current time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
	now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
	pub fn new(now: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(now),
		}
	}

	pub fn set(&self, now: DateTime<Utc>) {
		*self.now.lock() = now;
	}

	/// Moves the clock forward by `by`.
	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock();
		*now += by;
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

/// Decides whether an item has exceeded its preparation budget.
#[derive(Debug, Clone, Copy)]
pub struct OverdueEvaluator {
	default_budget_minutes: u32,
}

impl OverdueEvaluator {
	/// Creates an evaluator; a zero default is replaced by [`DEFAULT_PREP_MINUTES`].
	pub fn new(default_budget_minutes: u32) -> Self {
		Self {
			default_budget_minutes: if default_budget_minutes == 0 {
				DEFAULT_PREP_MINUTES
			} else {
				default_budget_minutes
			},
		}
	}

	/// Budget in minutes that applies to `item`.
	pub fn budget_for(&self, item: &OrderItem) -> u32 {
		match item.menu_item.prep_time_minutes {
			Some(minutes) if minutes > 0 => minutes,
			_ => self.default_budget_minutes,
		}
	}

	/// Whether the time elapsed since `item` was created is strictly longer
	/// than its budget.
	pub fn is_overdue(&self, item: &OrderItem, now: DateTime<Utc>) -> bool {
		let elapsed_ms = (now - item.created_at).num_milliseconds();
		let budget_ms = i64::from(self.budget_for(item)) * 60_000;
		elapsed_ms > budget_ms
	}
}

impl Default for OverdueEvaluator {
	fn default() -> Self {
		Self::new(DEFAULT_PREP_MINUTES)
	}
}

/// Whole minutes elapsed between `created_at` and `now`, never negative.
pub fn elapsed_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
	(now - created_at).num_minutes().max(0)
}

/// Human-readable age of a ticket.
pub fn elapsed_label(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
	match elapsed_minutes(created_at, now) {
		0 => "Just now".to_string(),
		1 => "1 min ago".to_string(),
		n => format!("{} mins ago", n),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kitchen_types::{ItemStatus, MenuItemRef};
	use rust_decimal::Decimal;

	fn item(budget: Option<u32>, created_at: DateTime<Utc>) -> OrderItem {
		OrderItem {
			id: "i1".to_string(),
			order_id: "O1".to_string(),
			menu_item: MenuItemRef {
				id: "m1".to_string(),
				name: "Com tam".to_string(),
				prep_time_minutes: budget,
			},
			quantity: 1,
			unit_price: Decimal::new(800, 2),
			note: None,
			modifiers: Vec::new(),
			created_at,
			status: ItemStatus::Preparing,
		}
	}

	#[test]
	fn test_overdue_boundary() {
		let start = DateTime::<Utc>::UNIX_EPOCH;
		let evaluator = OverdueEvaluator::default();
		let item = item(Some(10), start);

		assert!(!evaluator.is_overdue(&item, start + Duration::minutes(10)));
		assert!(evaluator.is_overdue(&item, start + Duration::milliseconds(600_600)));
		assert!(!evaluator.is_overdue(&item, start + Duration::minutes(9)));
	}

	#[test]
	fn test_budget_fallback() {
		let start = DateTime::<Utc>::UNIX_EPOCH;
		let evaluator = OverdueEvaluator::new(15);

		assert_eq!(evaluator.budget_for(&item(None, start)), 15);
		assert_eq!(evaluator.budget_for(&item(Some(0), start)), 15);
		assert_eq!(evaluator.budget_for(&item(Some(4), start)), 4);
		assert_eq!(OverdueEvaluator::new(0).budget_for(&item(None, start)), 15);

		let unset = item(None, start);
		assert!(!evaluator.is_overdue(&unset, start + Duration::minutes(15)));
		assert!(evaluator.is_overdue(&unset, start + Duration::minutes(16)));
	}

	#[test]
	fn test_elapsed_label_thresholds() {
		let start = DateTime::<Utc>::UNIX_EPOCH;

		assert_eq!(elapsed_label(start, start + Duration::seconds(59)), "Just now");
		assert_eq!(elapsed_label(start, start + Duration::seconds(60)), "1 min ago");
		assert_eq!(elapsed_label(start, start + Duration::seconds(119)), "1 min ago");
		assert_eq!(elapsed_label(start, start + Duration::minutes(2)), "2 mins ago");
		assert_eq!(elapsed_label(start, start + Duration::minutes(45)), "45 mins ago");
		// Clock skew.
		assert_eq!(elapsed_label(start + Duration::minutes(3), start), "Just now");
	}

	#[test]
	fn test_fixed_clock() {
		let clock = FixedClock::new(DateTime::<Utc>::UNIX_EPOCH);
		clock.advance(Duration::minutes(5));
		assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(5));

		clock.set(DateTime::<Utc>::UNIX_EPOCH);
		assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
	}
}
