use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use pulse_core::EventKind;

use crate::storage::{read_json_or_default, write_json_atomic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: String,
    /// Submission order; requeued entries go back to their original place.
    #[serde(default)]
    pub seq: u64,
    pub event: EventKind,
    pub payload: Value,
    /// Unix milliseconds.
    pub enqueued_at: i64,
}

/// Bounded, file-backed queue of submissions waiting for a connection.
/// Beyond capacity the oldest entry is dropped.
#[derive(Debug)]
pub struct Outbox {
    path: Option<PathBuf>,
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<OutboxEntry>,
}

impl Outbox {
    pub fn open(path: &Path, capacity: usize) -> Self {
        let stored: Vec<OutboxEntry> = read_json_or_default(path);
        let next_seq = stored.iter().map(|entry| entry.seq + 1).max().unwrap_or(1);
        let mut outbox = Self {
            path: Some(path.to_path_buf()),
            capacity: capacity.max(1),
            next_seq,
            entries: stored.into(),
        };
        outbox.enforce_capacity();
        outbox
    }

    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            next_seq: 1,
            entries: VecDeque::new(),
        }
    }

    /// Assigns an id and a place in submission order without queueing.
    pub fn prepare(&mut self, event: EventKind, payload: Value) -> OutboxEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        OutboxEntry {
            id: Uuid::new_v4().to_string(),
            seq,
            event,
            payload,
            enqueued_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn push(&mut self, event: EventKind, payload: Value) -> OutboxEntry {
        let entry = self.prepare(event, payload);
        self.enqueue(entry.clone());
        entry
    }

    /// Queues a prepared entry behind every entry submitted before it.
    pub fn enqueue(&mut self, entry: OutboxEntry) {
        let index = self
            .entries
            .iter()
            .position(|queued| queued.seq > entry.seq)
            .unwrap_or(self.entries.len());
        debug!(id = %entry.id, event = %entry.event, position = index, "queued");
        self.entries.insert(index, entry);
        self.enforce_capacity();
        self.persist();
    }

    pub fn front(&self) -> Option<&OutboxEntry> {
        self.entries.front()
    }

    pub fn remove(&mut self, id: &str) -> Option<OutboxEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let removed = self.entries.remove(index);
        self.persist();
        removed
    }

    pub fn entries(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn enforce_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                warn!(id = %dropped.id, event = %dropped.event, "outbox full, dropping oldest entry");
            }
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let snapshot: Vec<&OutboxEntry> = self.entries.iter().collect();
        if let Err(err) = write_json_atomic(path, &snapshot) {
            warn!(path = %path.display(), error = %err, "could not persist outbox");
        }
    }
}
