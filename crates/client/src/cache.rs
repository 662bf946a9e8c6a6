use std::path::{Path, PathBuf};

use tracing::warn;

use pulse_core::{Prompt, Snapshot, SnapshotItem};

use crate::storage::{read_json_or_default, write_json_atomic};

/// Last snapshot shown to the user, kept on disk so a client starting offline
/// still has something to render.
#[derive(Debug)]
pub struct DisplayCache {
    path: Option<PathBuf>,
    snapshot: Option<Snapshot>,
}

impl DisplayCache {
    pub fn open(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            snapshot: read_json_or_default(path),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshot: None,
        }
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn items(&self, prompt: Prompt) -> &[SnapshotItem] {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.items(prompt))
            .unwrap_or(&[])
    }

    pub fn has_data(&self) -> bool {
        self.snapshot
            .as_ref()
            .map(|snapshot| !snapshot.is_empty())
            .unwrap_or(false)
    }

    pub fn store(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
        self.persist();
    }

    /// Local wipe after a reset; keeps the last known version.
    pub fn clear(&mut self) {
        let version = self
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.meta.version)
            .unwrap_or(0);
        self.store(Snapshot::empty(version, "reset"));
    }

    fn persist(&self) {
        let (Some(path), Some(snapshot)) = (&self.path, &self.snapshot) else {
            return;
        };
        if let Err(err) = write_json_atomic(path, snapshot) {
            warn!(path = %path.display(), error = %err, "could not persist display cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::SnapshotMeta;

    fn snapshot(version: u64) -> Snapshot {
        Snapshot {
            meta: SnapshotMeta {
                version,
                timestamp: 1_700_000_000_000,
                reason: "promptA-update".to_string(),
            },
            prompt_a: vec![SnapshotItem {
                text: "Responder emails".to_string(),
                count: 3,
            }],
            prompt_b: Vec::new(),
        }
    }

    #[test]
    fn persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = DisplayCache::open(&path);
        assert!(!cache.has_data());
        cache.store(snapshot(4));

        let reopened = DisplayCache::open(&path);
        assert!(reopened.has_data());
        assert_eq!(reopened.items(Prompt::A)[0].count, 3);
        assert!(reopened.items(Prompt::B).is_empty());
    }

    #[test]
    fn clear_keeps_version_and_drops_items() {
        let mut cache = DisplayCache::in_memory();
        cache.store(snapshot(7));
        cache.clear();
        let current = cache.current().unwrap();
        assert!(current.is_empty());
        assert!(current.is_reset());
        assert_eq!(current.meta.version, 7);
        assert!(!cache.has_data());
    }
}
