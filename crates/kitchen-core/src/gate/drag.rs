use crate::state::can_transition;
use crate::store::PipelineStore;
use kitchen_types::ItemStatus;

/// Why a drop was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
	/// No drag was in progress.
	NotDragging,
	/// Dropped back on the column it came from.
	SameBucket,
	/// The order has no items left in the source column.
	OrderNotInSource,
	/// The target is not the next column.
	IllegalTransition,
}

/// What the board should do with a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropDecision {
	Ignore(IgnoreReason),
	/// Hand these items to the transition coordinator.
	Forward {
		item_ids: Vec<String>,
		from: ItemStatus,
		to: ItemStatus,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DragState {
	order_id: String,
	source: ItemStatus,
	hover: Option<ItemStatus>,
}

/// Tracks one drag gesture and decides what its drop means.
#[derive(Debug, Default)]
pub struct DragGate {
	state: Option<DragState>,
}

impl DragGate {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a card dragged out of `source` may be dropped on `candidate`.
	pub fn is_valid_drop_target(source: ItemStatus, candidate: ItemStatus) -> bool {
		can_transition(source, candidate)
	}

	/// Starts dragging the card of `order_id` out of `source`. Replaces any
	/// gesture already in progress.
	pub fn begin(&mut self, order_id: impl Into<String>, source: ItemStatus) {
		self.state = Some(DragState {
			order_id: order_id.into(),
			source,
			hover: None,
		});
	}

	/// Records the column under the pointer. Returns whether it is a valid
	/// target, for highlighting.
	pub fn hover(&mut self, target: Option<ItemStatus>) -> bool {
		match &mut self.state {
			Some(state) => {
				state.hover = target;
				target.is_some_and(|t| Self::is_valid_drop_target(state.source, t))
			}
			None => false,
		}
	}

	/// Whether the column currently hovered accepts the drop.
	pub fn hover_target_valid(&self) -> bool {
		self.state.as_ref().is_some_and(|state| {
			state
				.hover
				.is_some_and(|t| Self::is_valid_drop_target(state.source, t))
		})
	}

	pub fn cancel(&mut self) {
		self.state = None;
	}

	pub fn is_dragging(&self) -> bool {
		self.state.is_some()
	}

	/// Ends the gesture by dropping on `target`.
	///
	/// The order's current items in the source column are read from `store`
	/// at drop time, so items moved by someone else during the drag are not
	/// sent.
	pub fn drop_on(&mut self, target: ItemStatus, store: &PipelineStore) -> DropDecision {
		let Some(state) = self.state.take() else {
			return DropDecision::Ignore(IgnoreReason::NotDragging);
		};
		if target == state.source {
			return DropDecision::Ignore(IgnoreReason::SameBucket);
		}

		let item_ids = store.order_items_in(state.source, &state.order_id);
		if item_ids.is_empty() {
			return DropDecision::Ignore(IgnoreReason::OrderNotInSource);
		}
		if !Self::is_valid_drop_target(state.source, target) {
			return DropDecision::Ignore(IgnoreReason::IllegalTransition);
		}

		DropDecision::Forward {
			item_ids,
			from: state.source,
			to: target,
		}
	}
}
