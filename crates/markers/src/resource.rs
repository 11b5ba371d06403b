//! Resource identifiers.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;

/// Opaque identifier for a resource markers are attached to.
///
/// Usually the normalized string form of a URI. Equality, ordering and hashing
/// are structural on that string, so two keys built from the same normalized
/// URI address the same resource.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
	/// Creates a key from a string as-is, without parsing or normalization.
	pub fn new(key: impl AsRef<str>) -> Self {
		Self(key.as_ref().to_owned())
	}

	/// Parses `input` as a URI and keys the resource by its normalized form.
	pub fn parse(input: &str) -> Result<Self> {
		let url = Url::parse(input)?;
		Ok(Self::from(&url))
	}

	/// Creates a `file://` key from an absolute path.
	///
	/// Returns `None` if the path cannot be converted to a URL.
	pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
		let url = Url::from_file_path(path).ok()?;
		Some(Self::from(&url))
	}

	/// The key's string form.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Parses the key back into a URL, if it is one.
	pub fn to_url(&self) -> Option<Url> {
		Url::parse(&self.0).ok()
	}

	/// Filesystem path for `file://` keys.
	pub fn to_file_path(&self) -> Option<PathBuf> {
		self.to_url()?.to_file_path().ok()
	}
}

impl From<&Url> for ResourceKey {
	fn from(url: &Url) -> Self {
		Self::new(url.as_str())
	}
}

impl From<Url> for ResourceKey {
	fn from(url: Url) -> Self {
		Self::from(&url)
	}
}

impl From<&str> for ResourceKey {
	fn from(key: &str) -> Self {
		Self::new(key)
	}
}

impl From<String> for ResourceKey {
	fn from(key: String) -> Self {
		Self(key)
	}
}

impl AsRef<str> for ResourceKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ResourceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl fmt::Debug for ResourceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ResourceKey").field(&self.0).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_normalizes_uri() {
		let a = ResourceKey::parse("FILE:///foo/./bar.txt").unwrap();
		let b = ResourceKey::parse("file:///foo/bar.txt").unwrap();
		assert_eq!(a, b);
		assert_eq!(a.as_str(), "file:///foo/bar.txt");
	}

	#[test]
	fn parse_rejects_relative_input() {
		assert!(matches!(ResourceKey::parse("foo"), Err(crate::Error::InvalidUri(_))));
	}

	#[test]
	fn raw_keys_compare_structurally() {
		assert_eq!(ResourceKey::new("foo"), ResourceKey::from(String::from("foo")));
		assert_ne!(ResourceKey::new("foo"), ResourceKey::new("bar"));
	}

	#[cfg(unix)]
	#[test]
	fn path_round_trip() {
		let key = ResourceKey::from_path("/tmp/test.rs").unwrap();
		assert_eq!(key.as_str(), "file:///tmp/test.rs");
		assert_eq!(key.to_file_path(), Some(PathBuf::from("/tmp/test.rs")));
		assert!(ResourceKey::from_path("relative.rs").is_none());
	}

	#[test]
	fn serializes_as_plain_string() {
		let key = ResourceKey::new("file:///a.txt");
		assert_eq!(serde_json::to_string(&key).unwrap(), r#""file:///a.txt""#);
		let back: ResourceKey = serde_json::from_str(r#""file:///a.txt""#).unwrap();
		assert_eq!(back, key);
	}
}
