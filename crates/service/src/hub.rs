use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use pulse_core::{Hello, Snapshot};

use crate::config::RateLimitSection;
use crate::ingress::RateLimiter;

const BROADCAST_CAPACITY: usize = 64;
const DIRECT_CAPACITY: usize = 32;

/// Message queued for one SSE stream.
#[derive(Debug, Clone)]
pub enum Outbound {
    Hello(Hello),
    State(Arc<Snapshot>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited,
    UnknownConnection,
}

struct Connection {
    limiter: RateLimiter,
    direct: mpsc::Sender<Outbound>,
}

/// A freshly registered connection: the queue feeding its stream and a
/// guard that unregisters it on drop.
pub struct Registration {
    pub guard: ConnectionGuard,
    pub sender: mpsc::Sender<Outbound>,
    pub receiver: mpsc::Receiver<Outbound>,
}

/// Live connection registry plus the fan-out channel for snapshots.
pub struct Hub {
    updates: broadcast::Sender<Arc<Snapshot>>,
    published: Mutex<Option<u64>>,
    connections: Mutex<HashMap<Uuid, Connection>>,
    rate_limit: RateLimitSection,
    closing: watch::Sender<bool>,
}

impl Hub {
    pub fn new(rate_limit: RateLimitSection) -> Self {
        let (updates, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (closing, _) = watch::channel(false);
        Self {
            updates,
            published: Mutex::new(None),
            connections: Mutex::new(HashMap::new()),
            rate_limit,
            closing,
        }
    }

    pub fn connect(self: &Arc<Self>) -> Registration {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(DIRECT_CAPACITY);
        self.connections.lock().insert(
            id,
            Connection {
                limiter: RateLimiter::new(self.rate_limit.max_events, self.rate_limit.window()),
                direct: sender.clone(),
            },
        );
        info!(connection = %id, connections = self.connection_count(), "client connected");
        Registration {
            guard: ConnectionGuard {
                hub: Arc::clone(self),
                id,
            },
            sender,
            receiver,
        }
    }

    /// Drops every registered connection so open streams can end.
    pub fn close(&self) {
        self.closing.send_replace(true);
        let closed = {
            let mut connections = self.connections.lock();
            let count = connections.len();
            connections.clear();
            count
        };
        info!(connections = closed, "hub closed");
    }

    pub fn closing(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    fn disconnect(&self, id: Uuid) {
        if self.connections.lock().remove(&id).is_some() {
            info!(connection = %id, "client disconnected");
        }
    }

    pub fn is_connected(&self, id: Uuid) -> bool {
        self.connections.lock().contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn admit(&self, id: Uuid) -> Admission {
        let mut connections = self.connections.lock();
        let Some(connection) = connections.get_mut(&id) else {
            return Admission::UnknownConnection;
        };
        if connection.limiter.try_acquire() {
            Admission::Allowed
        } else {
            debug!(connection = %id, "rate limited");
            Admission::Limited
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.updates.subscribe()
    }

    /// Takes a snapshot and sends it under one lock, so subscribers see
    /// versions in increasing order. Returns false when a snapshot at least
    /// as new already went out.
    pub fn publish(&self, take: impl FnOnce() -> Snapshot) -> bool {
        let mut published = self.published.lock();
        let snapshot = take();
        let version = snapshot.meta.version;
        if published.map(|last| version <= last).unwrap_or(false) {
            debug!(version, "snapshot superseded, not broadcasting");
            return false;
        }
        debug!(version, reason = %snapshot.meta.reason, "broadcasting snapshot");
        *published = Some(version);
        // no receivers is fine
        let _ = self.updates.send(Arc::new(snapshot));
        true
    }

    /// Pushes a snapshot to one connection only. Returns false when the
    /// connection is unknown or its queue is full.
    pub fn send_to(&self, id: Uuid, snapshot: Snapshot) -> bool {
        let direct = match self.connections.lock().get(&id) {
            Some(connection) => connection.direct.clone(),
            None => return false,
        };
        direct.try_send(Outbound::State(Arc::new(snapshot))).is_ok()
    }
}

pub struct ConnectionGuard {
    hub: Arc<Hub>,
    id: Uuid,
}

impl ConnectionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}
