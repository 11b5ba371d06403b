//! Error types for marker persistence and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Possible errors.
///
/// Registry operations themselves are infallible; these surface from resource
/// parsing, persistence and configuration loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A resource string could not be parsed as a URI.
	#[error("invalid resource uri: {0}")]
	InvalidUri(#[from] url::ParseError),

	/// Error reading or writing a file.
	#[error("I/O error on {path}: {error}")]
	Io {
		/// Path to the file that failed.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Persisted markers could not be encoded or decoded.
	#[error("marker snapshot serialization failed: {0}")]
	Serialize(#[from] serde_json::Error),

	/// The configuration file is not valid TOML or has unknown keys.
	#[error("failed to parse markers config: {0}")]
	ConfigParse(#[from] toml::de::Error),

	/// A required field is missing from the configuration.
	#[error("missing required field: {0}")]
	MissingField(String),

	/// A storage key would escape the storage directory.
	#[error("invalid storage key: {0:?}")]
	InvalidStorageKey(String),
}

impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			error,
		}
	}
}

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
