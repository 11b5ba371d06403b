//! Change notification for marker registries.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::ResourceKey;

/// Event emitted when the markers of a (resource, owner) pair change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkersChanged<D> {
	/// Resource whose markers changed.
	pub resource: ResourceKey,
	/// Owner whose collection was replaced.
	pub owner: String,
	/// Entries the collection held before the change.
	pub previous: Vec<D>,
}

/// Receiver for marker change events created by
/// [`MarkerRegistry::event_channel`](crate::MarkerRegistry::event_channel).
pub type MarkersChangedReceiver<D> = mpsc::UnboundedReceiver<MarkersChanged<D>>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Returns `false` once it no longer wants events; it is then unregistered.
type Listener<D> = Arc<dyn Fn(&MarkersChanged<D>) -> bool + Send + Sync>;

/// Ordered list of change listeners.
///
/// Delivery iterates a snapshot of the list, so listeners may register or
/// remove listeners (or call back into the registry) while being notified.
pub(crate) struct Listeners<D> {
	entries: RwLock<Vec<(ListenerId, Listener<D>)>>,
	next_id: AtomicU64,
}

impl<D> Listeners<D> {
	pub(crate) fn new() -> Self {
		Self {
			entries: RwLock::new(Vec::new()),
			next_id: AtomicU64::new(0),
		}
	}

	pub(crate) fn add(&self, listener: Listener<D>) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.entries.write().push((id, listener));
		id
	}

	pub(crate) fn remove(&self, id: ListenerId) -> bool {
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|(existing, _)| *existing != id);
		entries.len() != before
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Calls every listener, in registration order, with `event`.
	///
	/// Listeners that return `false` are removed afterwards.
	pub(crate) fn emit(&self, event: &MarkersChanged<D>) {
		let snapshot: Vec<(ListenerId, Listener<D>)> = self
			.entries
			.read()
			.iter()
			.map(|(id, listener)| (*id, Arc::clone(listener)))
			.collect();
		let finished: Vec<ListenerId> = snapshot
			.into_iter()
			.filter_map(|(id, listener)| (!listener(event)).then_some(id))
			.collect();
		if !finished.is_empty() {
			trace!(listeners = finished.len(), "Dropping finished listeners");
			self.entries.write().retain(|(id, _)| !finished.contains(id));
		}
	}
}

impl<D> fmt::Debug for Listeners<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listeners").field("count", &self.len()).finish()
	}
}
