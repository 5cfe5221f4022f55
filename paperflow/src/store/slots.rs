//! Keyed files in a directory, with atomic writes and a fallback location.

use super::sanitize::sanitize_identifier;
use crate::errors::PersistenceError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// Files named `<prefix><key>.<extension>` under a directory.
#[derive(Debug)]
pub(crate) struct FileSlots {
    dir: PathBuf,
    fallback_dir: Option<PathBuf>,
    prefix: &'static str,
    extension: &'static str,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Where a write ended up.
#[derive(Debug)]
pub(crate) struct Written {
    pub key: String,
    pub path: PathBuf,
    pub fallback: bool,
}

impl FileSlots {
    pub(crate) fn new(dir: PathBuf, prefix: &'static str, extension: &'static str) -> Self {
        Self {
            dir,
            fallback_dir: None,
            prefix,
            extension,
            locks: DashMap::new(),
        }
    }

    pub(crate) fn set_fallback_dir(&mut self, dir: Option<PathBuf>) {
        self.fallback_dir = dir;
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn file_name(&self, key: &str) -> String {
        format!("{}{}.{}", self.prefix, sanitize_identifier(key), self.extension)
    }

    pub(crate) fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(self.file_name(key))
    }

    /// Writes `bytes` under `key`, replacing any previous content.
    ///
    /// Writes to the same key are serialized; writes to different keys
    /// proceed independently.
    pub(crate) fn write(&self, key: &str, bytes: &[u8]) -> Result<Written, PersistenceError> {
        let key = sanitize_identifier(key);
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock();

        let primary = self.path_for(&key);
        let primary_error = match write_atomic(&primary, bytes) {
            Ok(()) => {
                if let Some(fallback_dir) = &self.fallback_dir {
                    remove_stale(&fallback_dir.join(self.file_name(&key)));
                }
                return Ok(Written {
                    key,
                    path: primary,
                    fallback: false,
                })
            }
            Err(err) => err,
        };

        let Some(fallback_dir) = &self.fallback_dir else {
            return Err(primary_error);
        };
        tracing::warn!(
            path = %primary.display(),
            error = %primary_error,
            fallback = %fallback_dir.display(),
            "Primary write failed, trying fallback location"
        );

        let fallback = fallback_dir.join(self.file_name(&key));
        write_atomic(&fallback, bytes).map_err(|fallback_error| {
            tracing::error!(
                path = %fallback.display(),
                error = %fallback_error,
                "Fallback write failed"
            );
            primary_error
        })?;
        remove_stale(&primary);

        Ok(Written {
            key,
            path: fallback,
            fallback: true,
        })
    }

    /// Reads the content stored under `key`.
    ///
    /// When both locations hold a copy, the most recently modified one wins;
    /// on a tie the fallback copy does, since it is only written after the
    /// primary location failed.
    pub(crate) fn read(&self, key: &str) -> Result<(PathBuf, String), PersistenceError> {
        let file_name = self.file_name(key);
        let candidates = std::iter::once(self.dir.join(&file_name))
            .chain(self.fallback_dir.iter().map(|dir| dir.join(&file_name)));

        let mut newest: Option<(PathBuf, SystemTime)> = None;
        let mut unreadable = None;
        for path in candidates {
            let modified = match std::fs::metadata(&path) {
                Ok(meta) => meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => {
                    unreadable.get_or_insert(PersistenceError::Read { path, source });
                    continue;
                }
            };
            if newest.as_ref().map_or(true, |(_, best)| modified >= *best) {
                newest = Some((path, modified));
            }
        }

        let Some((path, _)) = newest else {
            return Err(unreadable.unwrap_or_else(|| PersistenceError::NotFound {
                key: sanitize_identifier(key),
            }));
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok((path, text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(PersistenceError::NotFound {
                key: sanitize_identifier(key),
            }),
            Err(source) => Err(PersistenceError::Read { path, source }),
        }
    }

    /// Keys present in either location whose key matches `pattern`, sorted.
    pub(crate) fn keys(&self, pattern: &str) -> Result<Vec<String>, PersistenceError> {
        let matcher = glob::Pattern::new(pattern).map_err(|err| PersistenceError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        let suffix = format!(".{}", self.extension);

        let mut keys = BTreeSet::new();
        for dir in std::iter::once(&self.dir).chain(self.fallback_dir.iter()) {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(PersistenceError::Read {
                        path: dir.clone(),
                        source,
                    })
                }
            };

            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                let key = name
                    .strip_prefix(self.prefix)
                    .and_then(|rest| rest.strip_suffix(suffix.as_str()));
                if let Some(key) = key.filter(|key| matcher.matches(key)) {
                    keys.insert(key.to_string());
                }
            }
        }
        Ok(keys.into_iter().collect())
    }
}

/// Removes an outdated copy left in the other location. Failing to remove
/// it is logged; reads still pick the newer copy.
fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed outdated copy"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "Outdated copy not removed"),
    }
}

/// Writes through a temporary file in the target directory, then renames it
/// over the destination. Readers never observe a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write_error = |source: std::io::Error| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_error)?;
    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(bytes).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|err| write_error(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let slots = FileSlots::new(dir.path().join("out"), "output_", "yaml");

        let written = slots.write("paper: one", b"hello").unwrap();
        assert_eq!(written.key, "paper_ one");
        assert!(!written.fallback);
        assert_eq!(written.path, dir.path().join("out/output_paper_ one.yaml"));

        let (path, text) = slots.read("paper: one").unwrap();
        assert_eq!(path, written.path);
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let slots = FileSlots::new(dir.path().to_path_buf(), "", "md");

        slots.write("k", b"first version, longer").unwrap();
        slots.write("k", b"second").unwrap();
        assert_eq!(slots.read("k").unwrap().1, "second");
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let slots = FileSlots::new(dir.path().to_path_buf(), "output_", "yaml");
        assert!(matches!(slots.read("nope"), Err(PersistenceError::NotFound { .. })));
    }

    #[test]
    fn test_fallback_when_primary_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be makes the primary write fail.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();

        let mut slots = FileSlots::new(blocked, "artigo_", "md");
        assert!(slots.write("k", b"text").is_err());

        slots.set_fallback_dir(Some(dir.path().join("fallback")));
        let written = slots.write("k", b"text").unwrap();
        assert!(written.fallback);
        assert_eq!(written.path, dir.path().join("fallback/artigo_k.md"));
        assert_eq!(slots.read("k").unwrap().1, "text");
    }

    fn age(path: &Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_newer_fallback_copy_shadows_older_primary() {
        let dir = tempfile::tempdir().unwrap();
        let mut slots = FileSlots::new(dir.path().join("yamls"), "output_", "yaml");
        slots.set_fallback_dir(Some(dir.path().join("fallback")));

        slots.write("k", b"GAP: old").unwrap();
        // A later write landed in the fallback while the primary copy stayed.
        let fallback = dir.path().join("fallback/output_k.yaml");
        std::fs::create_dir_all(fallback.parent().unwrap()).unwrap();
        std::fs::write(&fallback, b"GAP: new").unwrap();
        age(&slots.path_for("k"), Duration::from_secs(3600));

        let (path, text) = slots.read("k").unwrap();
        assert_eq!(path, fallback);
        assert_eq!(text, "GAP: new");
    }

    #[test]
    fn test_newer_primary_copy_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut slots = FileSlots::new(dir.path().join("yamls"), "output_", "yaml");
        slots.set_fallback_dir(Some(dir.path().join("fallback")));

        let fallback = dir.path().join("fallback/output_k.yaml");
        std::fs::create_dir_all(fallback.parent().unwrap()).unwrap();
        std::fs::write(&fallback, b"GAP: old").unwrap();
        age(&fallback, Duration::from_secs(3600));
        std::fs::create_dir_all(slots.dir()).unwrap();
        std::fs::write(slots.path_for("k"), b"GAP: new").unwrap();

        assert_eq!(slots.read("k").unwrap().1, "GAP: new");
    }

    #[test]
    fn test_primary_write_clears_fallback_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut slots = FileSlots::new(dir.path().join("yamls"), "output_", "yaml");
        slots.set_fallback_dir(Some(dir.path().join("fallback")));

        let fallback = dir.path().join("fallback/output_k.yaml");
        std::fs::create_dir_all(fallback.parent().unwrap()).unwrap();
        std::fs::write(&fallback, b"GAP: old").unwrap();

        let written = slots.write("k", b"GAP: new").unwrap();
        assert!(!written.fallback);
        assert!(!fallback.exists());
        assert_eq!(slots.read("k").unwrap().1, "GAP: new");
    }

    #[cfg(unix)]
    #[test]
    fn test_fallback_write_after_primary_turns_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let primary_dir = dir.path().join("yamls");
        let mut slots = FileSlots::new(primary_dir.clone(), "output_", "yaml");
        slots.set_fallback_dir(Some(dir.path().join("fallback")));

        slots.write("k", b"GAP: old").unwrap();
        std::fs::set_permissions(&primary_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        let written = slots.write("k", b"GAP: new").unwrap();
        std::fs::set_permissions(&primary_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users write through read-only directories.
        if written.fallback {
            assert_eq!(written.path, dir.path().join("fallback/output_k.yaml"));
        }
        assert_eq!(slots.read("k").unwrap().1, "GAP: new");
    }

    #[test]
    fn test_keys_filter_and_sort() {
        let dir = tempfile::tempdir().unwrap();
        let slots = FileSlots::new(dir.path().to_path_buf(), "output_", "yaml");
        for key in ["b-paper", "a-paper", "c-notes"] {
            slots.write(key, b"x").unwrap();
        }
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        assert_eq!(slots.keys("*").unwrap(), vec!["a-paper", "b-paper", "c-notes"]);
        assert_eq!(slots.keys("*-paper").unwrap(), vec!["a-paper", "b-paper"]);
        assert!(matches!(slots.keys("["), Err(PersistenceError::InvalidPattern { .. })));
    }

    #[test]
    fn test_keys_of_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let slots = FileSlots::new(dir.path().join("absent"), "output_", "yaml");
        assert!(slots.keys("*").unwrap().is_empty());
    }
}
