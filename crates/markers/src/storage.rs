//! Storage backends for persisted markers.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::{Error, Result};

/// Key-value storage used to persist marker snapshots between sessions.
pub trait MarkerStorage: Send + Sync {
	/// Loads the data stored under `key`, if any.
	fn load(&self, key: &str) -> Result<Option<String>>;

	/// Stores `data` under `key`, replacing previous data.
	fn store(&self, key: &str, data: &str) -> Result<()>;

	/// Removes the data stored under `key`. Missing keys are not an error.
	fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage, useful for tests and for hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
	/// Create an empty storage.
	pub fn new() -> Self {
		Self::default()
	}
}

impl MarkerStorage for MemoryStorage {
	fn load(&self, key: &str) -> Result<Option<String>> {
		Ok(self.data.read().get(key).cloned())
	}

	fn store(&self, key: &str, data: &str) -> Result<()> {
		self.data.write().insert(key.to_owned(), data.to_owned());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.data.write().remove(key);
		Ok(())
	}
}

/// Storage writing one `<key>.json` file per key into a directory.
///
/// The directory is created on the first store. Files are written to a
/// sibling `<key>.json.tmp` and renamed into place, so a stored file is
/// either the previous snapshot or the new one, never a partial write.
#[derive(Debug, Clone)]
pub struct FileStorage {
	dir: PathBuf,
}

impl FileStorage {
	/// Storage rooted at `dir`.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Directory holding the stored files.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path_for(&self, key: &str) -> Result<PathBuf> {
		let valid = !key.is_empty() && !key.contains("..") && !key.contains(['/', '\\']);
		if !valid {
			return Err(Error::InvalidStorageKey(key.to_owned()));
		}
		Ok(self.dir.join(format!("{key}.json")))
	}
}

impl MarkerStorage for FileStorage {
	fn load(&self, key: &str) -> Result<Option<String>> {
		let path = self.path_for(key)?;
		match fs::read_to_string(&path) {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(Error::io(path, e)),
		}
	}

	fn store(&self, key: &str, data: &str) -> Result<()> {
		let path = self.path_for(key)?;
		fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
		let tmp_path = path.with_extension("json.tmp");
		fs::write(&tmp_path, data).map_err(|e| Error::io(&tmp_path, e))?;
		if let Err(e) = fs::rename(&tmp_path, &path) {
			let _ = fs::remove_file(&tmp_path);
			return Err(Error::io(path, e));
		}
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		let path = self.path_for(key)?;
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(Error::io(path, e)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_storage_round_trip() {
		let storage = MemoryStorage::new();
		assert_eq!(storage.load("k").unwrap(), None);
		storage.store("k", "v").unwrap();
		assert_eq!(storage.load("k").unwrap().as_deref(), Some("v"));
		storage.remove("k").unwrap();
		assert_eq!(storage.load("k").unwrap(), None);
	}

	#[test]
	fn file_storage_creates_directory_lazily() {
		let tmp = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(tmp.path().join("state"));

		assert_eq!(storage.load("markers-problem").unwrap(), None);
		assert!(!storage.dir().exists());

		storage.store("markers-problem", "[]").unwrap();
		assert!(tmp.path().join("state/markers-problem.json").is_file());
		assert_eq!(storage.load("markers-problem").unwrap().as_deref(), Some("[]"));

		storage.remove("markers-problem").unwrap();
		storage.remove("markers-problem").unwrap();
		assert_eq!(storage.load("markers-problem").unwrap(), None);
	}

	#[test]
	fn file_storage_replaces_without_leftovers() {
		let tmp = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(tmp.path());

		storage.store("markers-problem", "[1,2,3]").unwrap();
		storage.store("markers-problem", "[4]").unwrap();

		assert_eq!(storage.load("markers-problem").unwrap().as_deref(), Some("[4]"));
		let files: Vec<_> = fs::read_dir(tmp.path())
			.unwrap()
			.map(|entry| entry.unwrap().file_name().into_string().unwrap())
			.collect();
		assert_eq!(files, ["markers-problem.json"]);
	}

	#[test]
	fn file_storage_keeps_previous_snapshot_when_write_fails() {
		let tmp = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(tmp.path());
		storage.store("markers-problem", "[1]").unwrap();

		// A directory squatting on the temporary path makes the write fail.
		fs::create_dir(tmp.path().join("markers-problem.json.tmp")).unwrap();
		assert!(matches!(storage.store("markers-problem", "[2]"), Err(Error::Io { .. })));

		assert_eq!(storage.load("markers-problem").unwrap().as_deref(), Some("[1]"));
	}

	#[test]
	fn file_storage_rejects_escaping_keys() {
		let tmp = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(tmp.path());

		for key in ["", "../evil", "a/b", "a\\b"] {
			assert!(
				matches!(storage.store(key, "x"), Err(Error::InvalidStorageKey(_))),
				"key {key:?} should be rejected"
			);
		}
	}
}
