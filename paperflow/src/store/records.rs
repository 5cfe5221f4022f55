//! Persisted structured records (`yamls/output_<key>.yaml`).

use super::slots::FileSlots;
use crate::core::{ArtifactKind, ArtifactRef};
use crate::errors::PersistenceError;
use crate::extraction::{KeyOrder, StructuredRecord};
use std::path::{Path, PathBuf};

/// Saves and loads [`StructuredRecord`]s keyed by sanitized document identifier.
#[derive(Debug)]
pub struct RecordStore {
    slots: FileSlots,
    key_order: KeyOrder,
    markers: Vec<String>,
}

impl RecordStore {
    /// File name prefix of persisted records.
    pub const PREFIX: &'static str = "output_";

    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: FileSlots::new(dir.into(), Self::PREFIX, "yaml"),
            key_order: KeyOrder::default(),
            markers: vec!["ARTICLE".to_string(), "ARTIGO".to_string()],
        }
    }

    /// Sets a secondary directory used when writing to the primary fails.
    #[must_use]
    pub fn with_fallback_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.slots.set_fallback_dir(dir);
        self
    }

    /// Sets the key ordering of written files.
    #[must_use]
    pub fn with_key_order(mut self, order: KeyOrder) -> Self {
        self.key_order = order;
        self
    }

    /// Sets the markers accepted when records are loaded back.
    #[must_use]
    pub fn with_markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    /// The primary directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.slots.dir()
    }

    /// Path a record with this key is written to.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.slots.path_for(key)
    }

    /// Persists `record` under `key`, overwriting any previous record.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the record cannot be serialized and `Write` if
    /// neither the primary nor the fallback location accepts the file.
    pub fn save(&self, record: &StructuredRecord, key: &str) -> Result<ArtifactRef, PersistenceError> {
        let yaml = record
            .to_yaml(self.key_order)
            .map_err(|err| PersistenceError::codec(self.path_for(key), err.to_string()))?;

        let written = self.slots.write(key, yaml.as_bytes())?;
        let artifact = ArtifactRef::new(ArtifactKind::Record, &written.key, &written.path, yaml.as_bytes());

        tracing::debug!(
            key = %written.key,
            path = %written.path.display(),
            sha256 = %artifact.sha256,
            "Saved record"
        );
        Ok(if written.fallback { artifact.in_fallback() } else { artifact })
    }

    /// Loads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under the key, `Read` on I/O
    /// errors and `Codec` if the file no longer holds a valid record.
    pub fn load(&self, key: &str) -> Result<StructuredRecord, PersistenceError> {
        let (path, text) = self.slots.read(key)?;
        StructuredRecord::from_yaml(&text, &self.markers)
            .map_err(|err| PersistenceError::codec(path, err.to_string()))
    }

    /// Keys of stored records matching a glob pattern, sorted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for a malformed pattern and `Read` if a
    /// directory cannot be listed.
    pub fn list(&self, pattern: &str) -> Result<Vec<String>, PersistenceError> {
        self.slots.keys(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn markers() -> Vec<String> {
        vec!["ARTICLE".to_string()]
    }

    fn record(text: &str) -> StructuredRecord {
        StructuredRecord::from_yaml(text, &markers()).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let original = record(
            "ARTICLE:\n  - GAP: \"Falta de dados: 🧬\"\n    OBJECTIVES:\n      - one\n      - two\n    YEAR: 2024\n",
        );

        let artifact = store.save(&original, "Smith - Deep Nets").unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Record);
        assert_eq!(artifact.path, dir.path().join("output_Smith - Deep Nets.yaml"));

        let loaded = store.load("Smith - Deep Nets").unwrap();
        assert_eq!(loaded.root_value(), original.root_value());
    }

    #[test]
    fn test_save_preserves_order_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path()).with_key_order(KeyOrder::Preserve);
        let original = record("ARTICLE:\n  - RESULTS: r\n    GAP: g\n");

        store.save(&original, "k").unwrap();
        assert_eq!(store.load("k").unwrap(), original);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        store.save(&record("ARTICLE:\n  - GAP: old\n"), "k").unwrap();
        store.save(&record("ARTICLE:\n  - GAP: new\n"), "k").unwrap();
        assert_eq!(store.load("k").unwrap().section_text("GAP").as_deref(), Some("new"));
        assert_eq!(store.list("*").unwrap(), vec!["k"]);
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        std::fs::write(store.path_for("bad"), "not: [a record").unwrap();

        assert!(matches!(store.load("bad"), Err(PersistenceError::Codec { .. })));
    }

    #[test]
    fn test_list_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let rec = record("ARTICLE:\n  - GAP: x\n");
        for key in ["zeta", "alpha", "Lee - Graphs"] {
            store.save(&rec, key).unwrap();
        }

        assert_eq!(store.list("*").unwrap(), vec!["Lee - Graphs", "alpha", "zeta"]);
        assert_eq!(store.list("Lee*").unwrap(), vec!["Lee - Graphs"]);
    }

    #[test]
    fn test_concurrent_saves_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(RecordStore::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let rec = record(&format!("ARTICLE:\n  - GAP: writer {i}\n"));
                    store.save(&rec, "shared").unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let loaded = store.load("shared").unwrap();
        assert!(loaded.section_text("GAP").unwrap().starts_with("writer "));
    }
}
