use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::canonical::{Canonicalizer, Resolution};
use crate::persist::{PersistedMeta, PersistedRow, PersistedState};
use crate::protocol::{Prompt, Snapshot, SnapshotItem, SnapshotMeta, SyncReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateEntry {
    pub count: u64,
    /// First trimmed phrasing that created the key; never overwritten.
    pub label: String,
}

#[derive(Debug, Default)]
struct Namespace {
    entries: IndexMap<String, AggregateEntry>,
}

impl Namespace {
    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn record(&mut self, key: &str, label: &str) -> u64 {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.count += 1;
                entry.count
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    AggregateEntry {
                        count: 1,
                        label: label.to_string(),
                    },
                );
                1
            }
        }
    }

    fn ranked(&self) -> Vec<SnapshotItem> {
        let mut items: Vec<SnapshotItem> = self
            .entries
            .iter()
            .map(|(key, entry)| SnapshotItem {
                text: if entry.label.is_empty() {
                    key.clone()
                } else {
                    entry.label.clone()
                },
                count: entry.count,
            })
            .collect();
        // stable: equal counts keep creation order
        items.sort_by(|a, b| b.count.cmp(&a.count));
        items
    }

    fn rows(&self) -> Vec<PersistedRow> {
        self.entries
            .iter()
            .map(|(key, entry)| PersistedRow {
                key: key.clone(),
                count: entry.count,
                label: entry.label.clone(),
            })
            .collect()
    }

    fn load_rows(&mut self, rows: Vec<PersistedRow>) {
        self.entries.clear();
        for row in rows {
            if row.key.is_empty() || row.count == 0 {
                continue;
            }
            let label = if row.label.is_empty() {
                row.key.clone()
            } else {
                row.label
            };
            self.entries.insert(
                row.key,
                AggregateEntry {
                    count: row.count,
                    label,
                },
            );
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    namespaces: [Namespace; 2],
    version: u64,
}

impl StoreState {
    fn bump(&mut self, reason: SyncReason) -> u64 {
        self.version += 1;
        info!(version = self.version, %reason, "state version bumped");
        self.version
    }
}

/// Per-prompt aggregate counts plus the process-wide state version.
///
/// Resolutions against one namespace are serialized by a per-namespace gate
/// that is held across the whole pipeline, including the optional oracle call;
/// the count itself is updated in a single write-locked step once the key is
/// known.
pub struct AggregateStore {
    state: RwLock<StoreState>,
    gates: [Mutex<()>; 2],
    canonicalizer: Canonicalizer,
}

impl AggregateStore {
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            gates: [Mutex::new(()), Mutex::new(())],
            canonicalizer,
        }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Runs the canonicalization pipeline and counts the submission. Returns
    /// the canonical key, or `None` if the text normalized to nothing.
    pub async fn resolve_and_increment(&self, prompt: Prompt, raw: &str) -> Option<String> {
        let clean = raw.trim();
        if clean.is_empty() {
            return None;
        }
        let _gate = self.gates[prompt.index()].lock().await;
        let existing = self.state.read().namespaces[prompt.index()].keys();
        let resolution = self.canonicalizer.canonicalize(clean, &existing).await?;
        let (count, version) = {
            let mut state = self.state.write();
            let count = state.namespaces[prompt.index()].record(resolution.key(), clean);
            (count, state.bump(prompt.update_reason()))
        };
        debug!(
            prompt = prompt.as_str(),
            key = resolution.key(),
            via = resolution_kind(&resolution),
            count,
            version,
            "submission counted"
        );
        Some(resolution.into_key())
    }

    /// Counts every item in order; returns how many changed the store.
    pub async fn ingest(&self, prompt: Prompt, items: &[String]) -> usize {
        let mut changed = 0;
        for item in items {
            if self.resolve_and_increment(prompt, item).await.is_some() {
                changed += 1;
            }
        }
        changed
    }

    /// Clears both namespaces and the embedding cache. Waits for in-flight
    /// resolutions on either namespace. Returns the new version.
    pub async fn reset(&self) -> u64 {
        let _a = self.gates[Prompt::A.index()].lock().await;
        let _b = self.gates[Prompt::B.index()].lock().await;
        let mut state = self.state.write();
        for namespace in state.namespaces.iter_mut() {
            namespace.entries.clear();
        }
        self.canonicalizer.clear_cache();
        state.bump(SyncReason::Reset)
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn entry(&self, prompt: Prompt, key: &str) -> Option<AggregateEntry> {
        self.state.read().namespaces[prompt.index()]
            .entries
            .get(key)
            .cloned()
    }

    pub fn keys(&self, prompt: Prompt) -> Vec<String> {
        self.state.read().namespaces[prompt.index()].keys()
    }

    pub fn snapshot(&self, reason: SyncReason) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            meta: SnapshotMeta {
                version: state.version,
                timestamp: chrono::Utc::now().timestamp_millis(),
                reason: reason.as_str().to_string(),
            },
            prompt_a: state.namespaces[Prompt::A.index()].ranked(),
            prompt_b: state.namespaces[Prompt::B.index()].ranked(),
        }
    }

    pub fn to_persisted(&self) -> PersistedState {
        let state = self.state.read();
        PersistedState {
            prompt_a: state.namespaces[Prompt::A.index()].rows(),
            prompt_b: state.namespaces[Prompt::B.index()].rows(),
            meta: PersistedMeta {
                version: state.version,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// Replaces the in-memory state with a persisted one. The version is only
    /// taken over when positive.
    pub fn restore(&self, persisted: PersistedState) {
        let mut state = self.state.write();
        state.namespaces[Prompt::A.index()].load_rows(persisted.prompt_a);
        state.namespaces[Prompt::B.index()].load_rows(persisted.prompt_b);
        if persisted.meta.version > 0 {
            state.version = persisted.meta.version;
        }
        self.canonicalizer.clear_cache();
        info!(version = state.version, "state restored");
    }
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new(Canonicalizer::default())
    }
}

fn resolution_kind(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Rule { rule, .. } => rule,
        Resolution::Similar { .. } => "similarity",
        Resolution::Semantic { .. } => "semantic",
        Resolution::Literal { .. } => "literal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn email_variants_share_one_entry() {
        let store = AggregateStore::default();
        for raw in ["  responder emails ", "Contestar Mails", "e-mails"] {
            assert_eq!(
                store.resolve_and_increment(Prompt::A, raw).await.as_deref(),
                Some("correo")
            );
        }
        let entry = store.entry(Prompt::A, "correo").expect("entry");
        assert_eq!(entry.count, 3);
        assert_eq!(entry.label, "responder emails");
        assert_eq!(store.version(), 3);
    }

    #[tokio::test]
    async fn blank_and_stopword_only_text_is_not_counted() {
        let store = AggregateStore::default();
        assert_eq!(store.resolve_and_increment(Prompt::B, "   ").await, None);
        assert_eq!(store.resolve_and_increment(Prompt::B, "de la").await, None);
        assert_eq!(store.version(), 0);
        assert!(store.snapshot(SyncReason::ClientRequest).is_empty());
    }

    #[tokio::test]
    async fn namespaces_are_independent() {
        let store = AggregateStore::default();
        store.resolve_and_increment(Prompt::A, "informes").await;
        store.resolve_and_increment(Prompt::B, "informes").await;
        store.resolve_and_increment(Prompt::B, "reportes").await;
        assert_eq!(store.entry(Prompt::A, "informe").map(|e| e.count), Some(1));
        assert_eq!(store.entry(Prompt::B, "informe").map(|e| e.count), Some(2));
    }

    #[tokio::test]
    async fn snapshot_ranks_by_count_then_creation() {
        let store = AggregateStore::default();
        let items: Vec<String> = ["nominas", "inventario", "correo", "inventario", "correos"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(store.ingest(Prompt::A, &items).await, 5);
        let snap = store.snapshot(SyncReason::PromptAUpdate);
        let ranked: Vec<(&str, u64)> = snap
            .prompt_a
            .iter()
            .map(|i| (i.text.as_str(), i.count))
            .collect();
        assert_eq!(ranked, vec![("inventario", 2), ("correo", 2), ("nominas", 1)]);
        assert_eq!(snap.meta.reason, "promptA-update");
        assert_eq!(snap.meta.version, 5);
    }

    #[tokio::test]
    async fn reset_clears_everything_and_bumps_version() {
        let store = AggregateStore::new(
            Canonicalizer::default().with_oracle(Arc::new(crate::PhraseHasher::default())),
        );
        store.resolve_and_increment(Prompt::A, "inventario").await;
        store.resolve_and_increment(Prompt::B, "nominas").await;
        assert!(store.canonicalizer().cached_embeddings() > 0);
        let before = store.version();
        let after = store.reset().await;
        assert!(after > before);
        let snap = store.snapshot(SyncReason::Reset);
        assert!(snap.is_empty());
        assert!(snap.is_reset());
        assert_eq!(store.canonicalizer().cached_embeddings(), 0);
    }

    #[tokio::test]
    async fn persisted_round_trip_restores_labels_and_version() {
        let store = AggregateStore::default();
        store.resolve_and_increment(Prompt::A, "Responder emails").await;
        store.resolve_and_increment(Prompt::A, "correo").await;
        store.resolve_and_increment(Prompt::B, "Inventario").await;
        let persisted = store.to_persisted();

        let restored = AggregateStore::default();
        restored.restore(persisted.clone());
        assert_eq!(restored.version(), 3);
        assert_eq!(
            restored.entry(Prompt::A, "correo"),
            Some(AggregateEntry {
                count: 2,
                label: "Responder emails".to_string()
            })
        );
        let mut again = restored.to_persisted();
        again.meta.timestamp = persisted.meta.timestamp;
        assert_eq!(again, persisted);
    }

    #[tokio::test]
    async fn restore_skips_invalid_rows() {
        let store = AggregateStore::default();
        store.restore(PersistedState {
            prompt_a: vec![
                PersistedRow {
                    key: String::new(),
                    count: 4,
                    label: "x".to_string(),
                },
                PersistedRow {
                    key: "nomina".to_string(),
                    count: 0,
                    label: String::new(),
                },
                PersistedRow {
                    key: "inventario".to_string(),
                    count: 2,
                    label: String::new(),
                },
            ],
            prompt_b: Vec::new(),
            meta: PersistedMeta::default(),
        });
        assert_eq!(store.keys(Prompt::A), vec!["inventario".to_string()]);
        assert_eq!(
            store.entry(Prompt::A, "inventario").map(|e| e.label),
            Some("inventario".to_string())
        );
        assert_eq!(store.version(), 0);
    }

    #[tokio::test]
    async fn concurrent_submissions_lose_no_updates() {
        let store = Arc::new(AggregateStore::default());
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let raw = if i % 2 == 0 { "Inventario" } else { "emails" };
                store.resolve_and_increment(Prompt::A, raw).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snap = store.snapshot(SyncReason::PromptAUpdate);
        assert_eq!(snap.total(Prompt::A), 40);
        assert_eq!(store.version(), 40);
    }
}
