//! Registry configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Kind of a generic registry opened without a configured kind.
pub const DEFAULT_KIND: &str = "marker";

/// Configuration for a [`MarkerRegistry`](crate::MarkerRegistry).
///
/// ```toml
/// kind = "problem"
/// persist = true
/// storage_dir = "/home/me/.local/state/xeno"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkersConfig {
	/// Label for this family of markers; names the persisted snapshot.
	///
	/// When unset, the registry being opened picks its own kind:
	/// [`DEFAULT_KIND`] for generic registries and
	/// [`PROBLEM_KIND`](crate::PROBLEM_KIND) for the problem manager.
	pub kind: Option<String>,
	/// Whether markers survive across sessions.
	pub persist: bool,
	/// Directory for persisted snapshots. Required when `persist` is set.
	pub storage_dir: Option<PathBuf>,
}

impl MarkersConfig {
	/// Parses a configuration from TOML text.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a TOML configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
		Self::from_toml_str(&input)
	}

	/// Configured kind, or `fallback` when none is set.
	pub fn kind_or<'a>(&'a self, fallback: &'a str) -> &'a str {
		self.kind.as_deref().unwrap_or(fallback)
	}

	/// Storage directory, if persistence is enabled.
	///
	/// Fails when persistence is enabled without a directory.
	pub fn persistence_dir(&self) -> Result<Option<&Path>> {
		if !self.persist {
			return Ok(None);
		}
		self.storage_dir
			.as_deref()
			.map(Some)
			.ok_or_else(|| Error::MissingField("storage_dir".into()))
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_config_uses_defaults() {
		let config = MarkersConfig::from_toml_str("").unwrap();
		assert_eq!(config, MarkersConfig::default());
		assert_eq!(config.kind, None);
		assert_eq!(config.kind_or(DEFAULT_KIND), "marker");
		assert_eq!(config.persistence_dir().unwrap(), None);
	}

	#[test]
	fn parses_all_fields() {
		let config = MarkersConfig::from_toml_str(
			r#"
			kind = "problem"
			persist = true
			storage_dir = "/var/state"
			"#,
		)
		.unwrap();
		assert_eq!(
			config,
			MarkersConfig {
				kind: Some("problem".into()),
				persist: true,
				storage_dir: Some(PathBuf::from("/var/state")),
			}
		);
		assert_eq!(config.persistence_dir().unwrap(), Some(Path::new("/var/state")));
	}

	#[test]
	fn rejects_unknown_keys() {
		let err = MarkersConfig::from_toml_str("persits = true").unwrap_err();
		assert!(matches!(err, Error::ConfigParse(_)));
	}

	#[test]
	fn persist_without_dir_is_an_error() {
		let config = MarkersConfig::from_toml_str("persist = true").unwrap();
		assert!(matches!(config.persistence_dir(), Err(Error::MissingField(field)) if field == "storage_dir"));
	}

	#[test]
	fn load_reads_file() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("markers.toml");
		fs::write(&path, "kind = \"problem\"\n").unwrap();
		let config = MarkersConfig::load(&path).unwrap();
		assert_eq!(config.kind_or(DEFAULT_KIND), "problem");

		let missing = MarkersConfig::load(tmp.path().join("missing.toml")).unwrap_err();
		assert!(matches!(missing, Error::Io { .. }));
	}
}
