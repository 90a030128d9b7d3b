//! Per-status cache of the kitchen board.
//!
//! The store keeps one bucket of orders for each board status. Buckets hold
//! partial orders: only the items currently in that status. Refetches replace
//! a bucket wholesale; optimistic moves shift items between two buckets under
//! a single write lock and hand back a [`MutationContext`] that can undo them.
//!
//! Every write bumps the bucket's version. A rollback only restores buckets
//! whose version is still the one its own apply produced, so it can never
//! resurrect state that a later refetch or mutation already superseded.

use kitchen_types::{ItemStatus, Order, OrderItem};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Bucket {
	orders: Vec<Order>,
	version: u64,
}

#[derive(Debug)]
struct Inner {
	buckets: HashMap<ItemStatus, Bucket>,
	/// Monotonic counter shared by all buckets.
	clock: u64,
}

impl Inner {
	fn bucket(&self, status: ItemStatus) -> Option<&Bucket> {
		self.buckets.get(&status)
	}

	fn bump(&mut self, status: ItemStatus) -> u64 {
		self.clock += 1;
		let version = self.clock;
		if let Some(bucket) = self.buckets.get_mut(&status) {
			bucket.version = version;
		}
		version
	}
}

/// State captured by an optimistic move, needed to undo it.
#[derive(Debug, Clone)]
pub struct MutationContext {
	/// Correlation id of the mutation.
	pub id: Uuid,
	pub from: ItemStatus,
	pub to: ItemStatus,
	/// Items that actually moved.
	pub item_ids: Vec<String>,
	/// Orders that had at least one item moved.
	pub order_ids: Vec<String>,
	/// Pre-mutation contents of each touched bucket, with the version the
	/// mutation left it at.
	snapshots: Vec<(ItemStatus, Vec<Order>, u64)>,
}

impl MutationContext {
	fn noop(from: ItemStatus, to: ItemStatus) -> Self {
		Self {
			id: Uuid::new_v4(),
			from,
			to,
			item_ids: Vec::new(),
			order_ids: Vec::new(),
			snapshots: Vec::new(),
		}
	}

	/// Whether the apply changed nothing.
	pub fn is_noop(&self) -> bool {
		self.snapshots.is_empty()
	}
}

/// Result of a rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
	/// Buckets restored to their pre-mutation contents.
	pub restored: Vec<ItemStatus>,
	/// Buckets written by someone else since the mutation; they must be refetched.
	pub stale: Vec<ItemStatus>,
}

/// Board cache keyed by status.
#[derive(Debug)]
pub struct PipelineStore {
	inner: RwLock<Inner>,
}

impl PipelineStore {
	/// Creates a store with an empty bucket for each board status.
	pub fn new() -> Self {
		let buckets = ItemStatus::board_statuses()
			.into_iter()
			.map(|status| (status, Bucket::default()))
			.collect();
		Self {
			inner: RwLock::new(Inner { buckets, clock: 0 }),
		}
	}

	/// Current contents of a bucket. Non-board statuses have no bucket.
	pub fn get(&self, status: ItemStatus) -> Vec<Order> {
		self.inner
			.read()
			.bucket(status)
			.map(|bucket| bucket.orders.clone())
			.unwrap_or_default()
	}

	/// Version of a bucket; changes on every write to it.
	pub fn version(&self, status: ItemStatus) -> u64 {
		self.inner.read().bucket(status).map_or(0, |b| b.version)
	}

	/// Replaces a bucket with authoritative contents.
	///
	/// Returns whether the contents differ from what was cached, ignoring
	/// the position of orders within the bucket.
	pub fn replace(&self, status: ItemStatus, orders: Vec<Order>) -> bool {
		let mut inner = self.inner.write();
		let Some(bucket) = inner.buckets.get_mut(&status) else {
			tracing::debug!(status = %status, "Ignoring replace of non-board status");
			return false;
		};
		let changed = !same_orders(&bucket.orders, &orders);
		bucket.orders = orders;
		inner.bump(status);
		changed
	}

	/// Moves the listed items from `from` to `to`.
	///
	/// Orders left without items in `from` are dropped from it. Moved items
	/// are rewritten to `to` and merged into the order of the same id in the
	/// destination, or appended as a new order there. Ids not found in `from`
	/// are ignored; when none match, nothing changes and the returned context
	/// is a no-op.
	pub fn apply_optimistic(
		&self,
		item_ids: &[String],
		from: ItemStatus,
		to: ItemStatus,
	) -> MutationContext {
		let mut inner = self.inner.write();
		Self::apply_locked(&mut inner, item_ids, from, to)
	}

	/// Like [`apply_optimistic`](Self::apply_optimistic), but moves every item
	/// in `from` of each order that holds one of `item_ids`.
	///
	/// Expansion and move happen under the same lock.
	pub fn apply_optimistic_bulk(
		&self,
		item_ids: &[String],
		from: ItemStatus,
		to: ItemStatus,
	) -> MutationContext {
		let mut inner = self.inner.write();
		let expanded: Vec<String> = inner
			.bucket(from)
			.map(|bucket| {
				bucket
					.orders
					.iter()
					.filter(|order| item_ids.iter().any(|id| order.contains_item(id)))
					.flat_map(|order| order.item_ids().map(str::to_string))
					.collect()
			})
			.unwrap_or_default();
		Self::apply_locked(&mut inner, &expanded, from, to)
	}

	fn apply_locked(
		inner: &mut Inner,
		item_ids: &[String],
		from: ItemStatus,
		to: ItemStatus,
	) -> MutationContext {
		let mut ctx = MutationContext::noop(from, to);
		if from == to || !from.is_board_status() || !to.is_board_status() {
			return ctx;
		}
		let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
		if wanted.is_empty() {
			return ctx;
		}

		let source_snapshot = inner.bucket(from).map(|b| b.orders.clone()).unwrap_or_default();
		let target_snapshot = inner.bucket(to).map(|b| b.orders.clone()).unwrap_or_default();

		let mut moved_orders = Vec::new();
		let mut remaining = Vec::with_capacity(source_snapshot.len());
		for order in &source_snapshot {
			let (moved, kept): (Vec<OrderItem>, Vec<OrderItem>) = order
				.items
				.iter()
				.cloned()
				.partition(|item| wanted.contains(item.id.as_str()));
			if moved.is_empty() {
				remaining.push(order.clone());
				continue;
			}
			ctx.order_ids.push(order.id.clone());
			ctx.item_ids.extend(moved.iter().map(|item| item.id.clone()));
			let mut header = order.clone_header();
			header.items = moved
				.into_iter()
				.map(|mut item| {
					item.status = to;
					item
				})
				.collect();
			moved_orders.push(header);
			if !kept.is_empty() {
				let mut rest = order.clone_header();
				rest.items = kept;
				remaining.push(rest);
			}
		}
		if moved_orders.is_empty() {
			return ctx;
		}

		let mut target = target_snapshot.clone();
		for moved in moved_orders {
			match target.iter_mut().find(|order| order.id == moved.id) {
				Some(existing) => {
					for item in moved.items {
						if !existing.contains_item(&item.id) {
							existing.items.push(item);
						}
					}
				}
				None => target.push(moved),
			}
		}

		if let Some(bucket) = inner.buckets.get_mut(&from) {
			bucket.orders = remaining;
		}
		if let Some(bucket) = inner.buckets.get_mut(&to) {
			bucket.orders = target;
		}
		let from_version = inner.bump(from);
		let to_version = inner.bump(to);
		ctx.snapshots = vec![
			(from, source_snapshot, from_version),
			(to, target_snapshot, to_version),
		];
		ctx
	}

	/// Undoes an optimistic move.
	///
	/// A bucket is restored only while nothing else has written to it since
	/// the move; otherwise it is reported stale and left untouched.
	pub fn rollback(&self, ctx: &MutationContext) -> RollbackReport {
		let mut report = RollbackReport::default();
		let mut inner = self.inner.write();
		for (status, snapshot, version_after) in &ctx.snapshots {
			let current = inner.bucket(*status).map_or(0, |b| b.version);
			if current != *version_after {
				report.stale.push(*status);
				continue;
			}
			if let Some(bucket) = inner.buckets.get_mut(status) {
				bucket.orders = snapshot.clone();
			}
			inner.bump(*status);
			report.restored.push(*status);
		}
		report
	}

	/// Removes one item from a bucket, dropping its order if it becomes empty.
	pub fn remove_item(&self, status: ItemStatus, item_id: &str) -> Option<OrderItem> {
		self.remove_items(status, &[item_id.to_string()]).pop()
	}

	/// Removes the listed items from a bucket, dropping emptied orders.
	pub fn remove_items(&self, status: ItemStatus, item_ids: &[String]) -> Vec<OrderItem> {
		let mut inner = self.inner.write();
		let Some(bucket) = inner.buckets.get_mut(&status) else {
			return Vec::new();
		};
		let mut removed = Vec::new();
		for order in bucket.orders.iter_mut() {
			let (gone, kept): (Vec<OrderItem>, Vec<OrderItem>) = order
				.items
				.drain(..)
				.partition(|item| item_ids.contains(&item.id));
			order.items = kept;
			removed.extend(gone);
		}
		bucket.orders.retain(|order| !order.items.is_empty());
		if !removed.is_empty() {
			inner.bump(status);
		}
		removed
	}

	/// First board status, in board order, whose bucket holds `item_id`.
	pub fn locate_item(&self, item_id: &str) -> Option<ItemStatus> {
		self.locate_any(&[item_id.to_string()])
	}

	/// First board status, in board order, whose bucket holds any of `item_ids`.
	pub fn locate_any(&self, item_ids: &[String]) -> Option<ItemStatus> {
		let inner = self.inner.read();
		ItemStatus::board_statuses().into_iter().find(|status| {
			inner.bucket(*status).is_some_and(|bucket| {
				bucket
					.orders
					.iter()
					.any(|order| item_ids.iter().any(|id| order.contains_item(id)))
			})
		})
	}

	/// Looks up an item on the board together with the bucket holding it.
	pub fn find_item(&self, item_id: &str) -> Option<(ItemStatus, OrderItem)> {
		let inner = self.inner.read();
		ItemStatus::board_statuses().into_iter().find_map(|status| {
			inner.bucket(status)?.orders.iter().find_map(|order| {
				order
					.items
					.iter()
					.find(|item| item.id == item_id)
					.map(|item| (status, item.clone()))
			})
		})
	}

	/// Ids of the items of `order_id` held in the `status` bucket.
	pub fn order_items_in(&self, status: ItemStatus, order_id: &str) -> Vec<String> {
		self.inner
			.read()
			.bucket(status)
			.and_then(|bucket| bucket.orders.iter().find(|order| order.id == order_id))
			.map(|order| order.item_ids().map(str::to_string).collect())
			.unwrap_or_default()
	}

	/// Every item id on the board, sorted. Duplicates are kept so callers can
	/// detect them.
	pub fn item_ids(&self) -> Vec<String> {
		let inner = self.inner.read();
		let mut ids: Vec<String> = inner
			.buckets
			.values()
			.flat_map(|bucket| bucket.orders.iter())
			.flat_map(|order| order.item_ids().map(str::to_string))
			.collect();
		ids.sort();
		ids
	}
}

impl Default for PipelineStore {
	fn default() -> Self {
		Self::new()
	}
}

fn same_orders(current: &[Order], incoming: &[Order]) -> bool {
	current.len() == incoming.len()
		&& incoming
			.iter()
			.all(|order| current.iter().any(|existing| existing == order))
}
