//! Markers and per-resource marker collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ResourceKey;

/// A single entry together with the resource and owner it is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker<D> {
	/// Resource the entry is attached to.
	pub resource: ResourceKey,
	/// Producer of the entry (e.g. a linter or compiler name).
	pub owner: String,
	/// The caller-supplied entry, stored unmodified.
	pub data: D,
}

/// All entries currently attributed to one resource, keyed by owner.
///
/// An owner is only present while it has at least one entry; setting an empty
/// sequence removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCollection<D> {
	resource: ResourceKey,
	owners: BTreeMap<String, Vec<D>>,
}

impl<D> MarkerCollection<D> {
	/// Create an empty collection for `resource`.
	pub fn new(resource: ResourceKey) -> Self {
		Self {
			resource,
			owners: BTreeMap::new(),
		}
	}

	/// Resource this collection belongs to.
	pub fn resource(&self) -> &ResourceKey {
		&self.resource
	}

	/// Whether no owner has any entries.
	pub fn is_empty(&self) -> bool {
		self.owners.is_empty()
	}

	/// Total number of entries across all owners.
	pub fn len(&self) -> usize {
		self.owners.values().map(Vec::len).sum()
	}

	/// Owners with entries, in sorted order.
	pub fn owners(&self) -> impl Iterator<Item = &str> {
		self.owners.keys().map(String::as_str)
	}

	/// Entries for `owner`; empty if the owner has none.
	pub fn markers(&self, owner: &str) -> &[D] {
		self.owners.get(owner).map(Vec::as_slice).unwrap_or_default()
	}

	/// Iterates `(owner, entries)` pairs in owner order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[D])> {
		self.owners.iter().map(|(owner, entries)| (owner.as_str(), entries.as_slice()))
	}

	/// Replaces the entries for `owner`, returning the previous ones.
	///
	/// An empty `entries` removes the owner.
	pub fn set_markers(&mut self, owner: &str, entries: Vec<D>) -> Vec<D> {
		if entries.is_empty() {
			return self.owners.remove(owner).unwrap_or_default();
		}
		self.owners.insert(owner.to_owned(), entries).unwrap_or_default()
	}

	/// Removes every owner, returning their previous entries.
	pub(crate) fn take_all(&mut self) -> Vec<(String, Vec<D>)> {
		std::mem::take(&mut self.owners).into_iter().collect()
	}
}
