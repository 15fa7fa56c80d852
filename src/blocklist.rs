//! Persistent blocklist of webhook IDs.
//!
//! Stored on disk as a JSON object mapping webhook ID to a human-readable
//! reason. Loaded once at startup; the sweeper writes it back whenever an
//! automated block is added, so blocks survive restarts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Errors reading or writing the blocklist file.
#[derive(Debug, thiserror::Error)]
pub enum BlocklistError {
    #[error("failed to read blocklist file: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocklist file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Blocked webhook IDs with the reason each was blocked.
pub struct Blocklist {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl Blocklist {
    /// Loads the blocklist from `path`.
    ///
    /// A missing file yields an empty blocklist; an unreadable or malformed
    /// file is an error, since ignoring it would silently unblock everything.
    pub fn load(path: &Path) -> Result<Self, BlocklistError> {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no blocklist file, starting empty");
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
        })
    }

    /// Creates an empty blocklist with no backing file. `persist` is a no-op.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the block reason for `id`, if blocked.
    pub fn reason(&self, id: &str) -> Option<String> {
        self.entries.read().get(id).cloned()
    }

    /// Returns whether `id` is blocked.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Blocks `id` with `reason`, replacing any existing reason.
    pub fn insert(&self, id: &str, reason: &str) {
        self.entries
            .write()
            .insert(id.to_string(), reason.to_string());
    }

    /// Writes the blocklist back to its file, if it has one.
    pub fn persist(&self) -> Result<(), BlocklistError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = self.entries.read().clone();
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Returns the number of blocked IDs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let blocklist = Blocklist::load(&dir.path().join("blocklist.json")).unwrap();
        assert!(blocklist.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Blocklist::load(&path),
            Err(BlocklistError::Parse(_))
        ));
    }

    #[test]
    fn loads_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        fs::write(&path, r#"{"123": "spam", "456": "abuse"}"#).unwrap();

        let blocklist = Blocklist::load(&path).unwrap();
        assert_eq!(blocklist.len(), 2);
        assert_eq!(blocklist.reason("123"), Some("spam".to_string()));
        assert!(blocklist.contains("456"));
        assert!(!blocklist.contains("789"));
    }

    #[test]
    fn persist_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");

        let blocklist = Blocklist::load(&path).unwrap();
        blocklist.insert("abc", "manual block");
        blocklist.persist().unwrap();

        let reloaded = Blocklist::load(&path).unwrap();
        assert_eq!(reloaded.reason("abc"), Some("manual block".to_string()));
    }

    #[test]
    fn persist_to_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("blocklist.json");
        let blocklist = Blocklist {
            path: Some(path),
            entries: RwLock::new(BTreeMap::new()),
        };
        blocklist.insert("abc", "x");
        assert!(matches!(blocklist.persist(), Err(BlocklistError::Io(_))));
    }

    #[test]
    fn in_memory_persist_is_noop() {
        let blocklist = Blocklist::in_memory();
        blocklist.insert("abc", "x");
        blocklist.persist().unwrap();
        assert!(blocklist.contains("abc"));
    }
}
