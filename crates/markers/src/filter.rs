//! Marker search filters.

use std::fmt;

use crate::ResourceKey;

type DataFilter<'f, D> = Box<dyn Fn(&D) -> bool + 'f>;

/// Criteria for [`MarkerRegistry::find_markers`](crate::MarkerRegistry::find_markers).
///
/// Every criterion is optional; an empty filter matches all markers. The
/// resource and owner criteria are intersected, and the data predicate is
/// applied last to each remaining entry.
pub struct SearchFilter<'f, D> {
	/// Restrict to markers on this resource.
	pub resource: Option<ResourceKey>,
	/// Restrict to markers produced by this owner.
	pub owner: Option<String>,
	data: Option<DataFilter<'f, D>>,
}

impl<'f, D> SearchFilter<'f, D> {
	/// A filter matching every marker.
	pub fn new() -> Self {
		Self {
			resource: None,
			owner: None,
			data: None,
		}
	}

	/// Restrict to `resource`.
	pub fn resource(mut self, resource: impl Into<ResourceKey>) -> Self {
		self.resource = Some(resource.into());
		self
	}

	/// Restrict to `owner`.
	pub fn owner(mut self, owner: impl Into<String>) -> Self {
		self.owner = Some(owner.into());
		self
	}

	/// Keep only entries for which `predicate` returns `true`.
	pub fn data(mut self, predicate: impl Fn(&D) -> bool + 'f) -> Self {
		self.data = Some(Box::new(predicate));
		self
	}

	pub(crate) fn matches_data(&self, data: &D) -> bool {
		self.data.as_ref().is_none_or(|predicate| predicate(data))
	}
}

impl<D> Default for SearchFilter<'_, D> {
	fn default() -> Self {
		Self::new()
	}
}

impl<D> fmt::Debug for SearchFilter<'_, D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SearchFilter")
			.field("resource", &self.resource)
			.field("owner", &self.owner)
			.field("has_data_filter", &self.data.is_some())
			.finish()
	}
}
