//! Marker registry.
//!
//! Holds the diagnostic collections of every resource, keyed by owner, and
//! notifies listeners whenever a collection actually changes.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::{DEFAULT_KIND, MarkersConfig};
use crate::events::{ListenerId, Listeners, MarkersChanged, MarkersChangedReceiver};
use crate::storage::{FileStorage, MarkerStorage};
use crate::{Marker, MarkerCollection, ResourceKey, Result, SearchFilter};


/// Registry of markers keyed by resource and owner.
///
/// The registry is created once per session and shared (e.g. behind an
/// [`Arc`]) with every producer and consumer of markers. All operations are
/// synchronous. Empty collections are pruned immediately, so every resource
/// in the registry has at least one owner with at least one entry.
///
/// Changes are made and announced one at a time: a writer holds the emission
/// lock from before its state change until its listeners have returned, so
/// listeners observe events in the order the state changed. The lock is
/// reentrant, so listeners may change markers themselves, but a listener must
/// not wait on another thread that changes markers.
pub struct MarkerRegistry<D> {
	/// Label for this family of markers.
	kind: String,
	/// Collections keyed by resource.
	resources: RwLock<BTreeMap<ResourceKey, MarkerCollection<D>>>,
	/// Registered change listeners.
	listeners: Listeners<D>,
	/// Held by writers through their state change and event delivery.
	emitting: ReentrantMutex<()>,
	/// Incremented on every detected change.
	version: AtomicU64,
	/// Backend for [`Self::persist`] and [`Self::restore`].
	storage: Option<Arc<dyn MarkerStorage>>,
}

impl<D> fmt::Debug for MarkerRegistry<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MarkerRegistry")
			.field("kind", &self.kind)
			.field("resource_count", &self.resources.read().len())
			.field("listeners", &self.listeners)
			.field("version", &self.version)
			.field("has_storage", &self.storage.is_some())
			.finish()
	}
}

impl<D> Default for MarkerRegistry<D> {
	fn default() -> Self {
		Self::new()
	}
}

impl<D> MarkerRegistry<D> {
	/// Create an empty, memory-only registry of the default kind.
	pub fn new() -> Self {
		Self::with_kind(DEFAULT_KIND)
	}

	/// Create an empty, memory-only registry labelled `kind`.
	pub fn with_kind(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			resources: RwLock::new(BTreeMap::new()),
			listeners: Listeners::new(),
			emitting: ReentrantMutex::new(()),
			version: AtomicU64::new(0),
			storage: None,
		}
	}

	/// Create an empty registry that persists into `storage`.
	///
	/// Nothing is loaded until [`Self::restore`] is called.
	pub fn with_storage(kind: impl Into<String>, storage: Arc<dyn MarkerStorage>) -> Self {
		Self {
			storage: Some(storage),
			..Self::with_kind(kind)
		}
	}

	/// Label for this family of markers.
	pub fn kind(&self) -> &str {
		&self.kind
	}

	/// Current change counter.
	///
	/// Increments every time any collection changes. Useful for detecting if a
	/// re-render is needed.
	pub fn version(&self) -> u64 {
		self.version.load(Ordering::Relaxed)
	}

	/// Whether no resource has any markers.
	pub fn is_empty(&self) -> bool {
		self.resources.read().is_empty()
	}

	/// Total number of markers across all resources and owners.
	pub fn len(&self) -> usize {
		self.resources.read().values().map(MarkerCollection::len).sum()
	}

	/// Resources that currently have at least one marker, in sorted order.
	pub fn uris(&self) -> Vec<ResourceKey> {
		self.resources.read().keys().cloned().collect()
	}

	/// Owners with markers on `resource`, in sorted order.
	pub fn owners(&self, resource: &ResourceKey) -> Vec<String> {
		self.resources
			.read()
			.get(resource)
			.map(|collection| collection.owners().map(str::to_owned).collect())
			.unwrap_or_default()
	}

	/// Registers `listener` to be called synchronously on every change.
	///
	/// Listeners run in registration order on the thread that made the change,
	/// after the registry's state lock has been released.
	pub fn on_did_change_markers(
		&self,
		listener: impl Fn(&MarkersChanged<D>) + Send + Sync + 'static,
	) -> ListenerId {
		self.listeners.add(Arc::new(move |event: &MarkersChanged<D>| {
			listener(event);
			true
		}))
	}

	/// Unregisters a listener. Returns `false` if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.listeners.remove(id)
	}

	/// Visits entries matching the resource and owner criteria, stopping at the
	/// first error returned by `visit`.
	pub(crate) fn scan<E>(
		&self,
		resource: Option<&ResourceKey>,
		owner: Option<&str>,
		mut visit: impl FnMut(&ResourceKey, &str, &D) -> Result<(), E>,
	) -> Result<(), E> {
		let resources = self.resources.read();
		let collections: Box<dyn Iterator<Item = &MarkerCollection<D>> + '_> = match resource {
			Some(resource) => Box::new(resources.get(resource).into_iter()),
			None => Box::new(resources.values()),
		};
		for collection in collections {
			for (o, entries) in collection.iter() {
				if owner.is_some_and(|wanted| wanted != o) {
					continue;
				}
				for data in entries {
					visit(collection.resource(), o, data)?;
				}
			}
		}
		Ok(())
	}

	fn bump_version(&self) {
		self.version.fetch_add(1, Ordering::Relaxed);
	}
}

impl<D: Clone> MarkerRegistry<D> {
	/// Current entries of one (resource, owner) pair.
	pub fn markers(&self, resource: &ResourceKey, owner: &str) -> Vec<D> {
		self.resources
			.read()
			.get(resource)
			.map(|collection| collection.markers(owner).to_vec())
			.unwrap_or_default()
	}

	/// Snapshot of every collection, in resource order.
	pub fn markers_by_resource(&self) -> Vec<(ResourceKey, MarkerCollection<D>)> {
		self.resources
			.read()
			.iter()
			.map(|(resource, collection)| (resource.clone(), collection.clone()))
			.collect()
	}

	/// Finds markers matching `filter`.
	///
	/// Results are ordered by resource, then owner, then the order the entries
	/// were set in. A panicking data predicate propagates to the caller.
	pub fn find_markers(&self, filter: &SearchFilter<'_, D>) -> Vec<Marker<D>> {
		let found: Result<_, Infallible> = self.try_find_markers(filter, |_| Ok(true));
		match found {
			Ok(markers) => markers,
			Err(never) => match never {},
		}
	}

	/// Like [`Self::find_markers`], with an additional fallible predicate.
	///
	/// The first error returned by `predicate` aborts the search and is handed
	/// back unchanged.
	pub fn try_find_markers<E>(
		&self,
		filter: &SearchFilter<'_, D>,
		mut predicate: impl FnMut(&D) -> Result<bool, E>,
	) -> Result<Vec<Marker<D>>, E> {
		let mut found = Vec::new();
		self.scan(filter.resource.as_ref(), filter.owner.as_deref(), |resource, owner, data| {
			if filter.matches_data(data) && predicate(data)? {
				found.push(Marker {
					resource: resource.clone(),
					owner: owner.to_owned(),
					data: data.clone(),
				});
			}
			Ok(())
		})?;
		Ok(found)
	}

	/// Forwards change events into an unbounded channel.
	///
	/// Sending never blocks, so an event is queued before the call that caused
	/// it returns. Once the receiver is dropped the forwarding listener
	/// unregisters itself on the next event.
	pub fn event_channel(&self) -> (ListenerId, MarkersChangedReceiver<D>)
	where
		D: Send + Sync + 'static,
	{
		let (sender, receiver) = mpsc::unbounded_channel();
		let kind = self.kind.clone();
		let id = self.listeners.add(Arc::new(move |event: &MarkersChanged<D>| {
			let delivered = sender.send(event.clone()).is_ok();
			if !delivered {
				trace!(kind = %kind, "Marker event receiver closed");
			}
			delivered
		}));
		(id, receiver)
	}

	/// Removes every owner's markers from `resource`, e.g. after the resource
	/// was deleted.
	///
	/// Emits one event per owner that had markers.
	pub fn clean_markers(&self, resource: &ResourceKey) {
		let _emitting = self.emitting.lock();
		let removed = self.resources.write().remove(resource);
		let Some(mut collection) = removed else {
			return;
		};
		debug!(resource = %resource, owners = collection.owners().count(), "Cleaned markers");
		self.emit_removed(resource, collection.take_all());
	}

	/// Removes all markers of every resource and owner.
	///
	/// Emits one event per (resource, owner) collection that was cleared, after
	/// the registry is already empty.
	pub fn clean_all_markers(&self) {
		let _emitting = self.emitting.lock();
		let removed = std::mem::take(&mut *self.resources.write());
		if removed.is_empty() {
			return;
		}
		debug!(kind = %self.kind, resources = removed.len(), "Cleaned all markers");
		for (resource, mut collection) in removed {
			self.emit_removed(&resource, collection.take_all());
		}
	}

	fn emit_removed(&self, resource: &ResourceKey, owners: Vec<(String, Vec<D>)>) {
		for (owner, previous) in owners {
			self.bump_version();
			self.listeners.emit(&MarkersChanged {
				resource: resource.clone(),
				owner,
				previous,
			});
		}
	}
}

impl<D: Clone + PartialEq> MarkerRegistry<D> {
	/// Replaces the markers of (`resource`, `owner`) with `entries`.
	///
	/// Returns the previous entries, empty if there were none. An empty
	/// `entries` clears the pair. When the new entries differ from the previous
	/// ones (order-sensitive), the version is bumped and listeners receive the
	/// previous entries before this returns; an identical set is a no-op.
	pub fn set_markers(&self, resource: &ResourceKey, owner: &str, entries: Vec<D>) -> Vec<D> {
		let _emitting = self.emitting.lock();
		let previous = {
			let mut resources = self.resources.write();
			let current = resources
				.get(resource)
				.map(|collection| collection.markers(owner))
				.unwrap_or_default();
			if current == entries.as_slice() {
				trace!(resource = %resource, owner, count = entries.len(), "Markers unchanged");
				return entries;
			}

			let count = entries.len();
			let previous = match resources.get_mut(resource) {
				Some(collection) => {
					let previous = collection.set_markers(owner, entries);
					if collection.is_empty() {
						resources.remove(resource);
					}
					previous
				}
				None => {
					let mut collection = MarkerCollection::new(resource.clone());
					collection.set_markers(owner, entries);
					resources.insert(resource.clone(), collection);
					Vec::new()
				}
			};
			debug!(
				resource = %resource,
				owner,
				previous = previous.len(),
				current = count,
				"Markers changed"
			);
			previous
		};

		self.bump_version();
		self.listeners.emit(&MarkersChanged {
			resource: resource.clone(),
			owner: owner.to_owned(),
			previous: previous.clone(),
		});
		previous
	}
}

/// Storage key for the snapshot of a registry of `kind`.
pub fn storage_key(kind: &str) -> String {
	format!("markers-{kind}")
}

/// One persisted (resource, owner) collection.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCollection<D> {
	resource: ResourceKey,
	owner: String,
	entries: Vec<D>,
}

impl<D> MarkerRegistry<D>
where
	D: Clone + PartialEq + Serialize + DeserializeOwned,
{
	/// Opens a registry as described by `config`.
	///
	/// Memory-only unless `config.persist` is set, in which case markers are
	/// stored under `config.storage_dir` and restored immediately. The kind
	/// falls back to [`DEFAULT_KIND`].
	pub fn open(config: &MarkersConfig) -> Result<Self> {
		Self::open_as(config, DEFAULT_KIND)
	}

	pub(crate) fn open_as(config: &MarkersConfig, fallback_kind: &str) -> Result<Self> {
		let kind = config.kind_or(fallback_kind).to_owned();
		let Some(dir) = config.persistence_dir()? else {
			return Ok(Self::with_kind(kind));
		};
		let registry = Self::with_storage(kind, Arc::new(FileStorage::new(dir)));
		registry.restore()?;
		Ok(registry)
	}

	/// Writes all markers to the storage backend.
	///
	/// Does nothing for memory-only registries.
	pub fn persist(&self) -> Result<()> {
		let Some(storage) = &self.storage else {
			return Ok(());
		};
		let stored: Vec<StoredCollection<D>> = self
			.markers_by_resource()
			.into_iter()
			.flat_map(|(resource, collection)| {
				collection
					.iter()
					.map(|(owner, entries)| StoredCollection {
						resource: resource.clone(),
						owner: owner.to_owned(),
						entries: entries.to_vec(),
					})
					.collect::<Vec<_>>()
			})
			.collect();
		let data = serde_json::to_string(&stored)?;
		storage.store(&storage_key(&self.kind), &data)?;
		info!(kind = %self.kind, collections = stored.len(), "Persisted markers");
		Ok(())
	}

	/// Loads persisted markers, applying each stored collection with
	/// [`Self::set_markers`] so listeners observe them.
	///
	/// Returns the number of markers restored.
	pub fn restore(&self) -> Result<usize> {
		let Some(storage) = &self.storage else {
			return Ok(0);
		};
		let Some(data) = storage.load(&storage_key(&self.kind))? else {
			return Ok(0);
		};
		let stored: Vec<StoredCollection<D>> = serde_json::from_str(&data)?;
		let mut restored = 0;
		for collection in stored {
			restored += collection.entries.len();
			self.set_markers(&collection.resource, &collection.owner, collection.entries);
		}
		info!(kind = %self.kind, markers = restored, "Restored markers");
		Ok(restored)
	}
}
