use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use pulse_core::{Ack, EventKind, Snapshot, SyncReason};

use crate::cache::DisplayCache;
use crate::config::ResilienceConfig;
use crate::error::TransportError;
use crate::outbox::{Outbox, OutboxEntry};
use crate::transport::{RequestId, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    Reconnecting,
}

/// What the user is shown about the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    ConnectError,
    Reconnecting,
    /// Connected, but an empty push was ignored and cached data is shown.
    StaleButConnected,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::ConnectError => "connection error",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::StaleButConnected => "connected (showing last data)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored in the outbox; reported to the user as done.
    Queued,
    /// Handed to the transport; a [`Completion`] follows.
    Pending(RequestId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Cleared locally only; resets are never queued.
    LocalOnly,
    Pending(RequestId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Sent,
    /// Delivery failed after emission; the event went back to the outbox.
    Requeued,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied,
    /// Empty push right after a drop; the cached view was kept.
    Discarded,
    /// Older than the cached view.
    Outdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub sent: usize,
    pub remaining: usize,
}

/// Rejections that say nothing about the submission itself.
fn worth_retrying(reason: &str) -> bool {
    matches!(reason, "rate-limit" | "unknown-connection")
}

#[derive(Debug)]
struct InFlight {
    event: EventKind,
    /// Outbox form of a submission, kept so it can be queued again.
    entry: Option<OutboxEntry>,
    deadline: Instant,
    reported: bool,
}

/// Client-side resilience state machine. Single-threaded: every input
/// (connectivity change, ack, snapshot, timer tick) is fed in with the
/// current instant.
pub struct ClientSession<T> {
    transport: T,
    config: ResilienceConfig,
    link: LinkState,
    status: ConnectionStatus,
    outbox: Outbox,
    cache: DisplayCache,
    in_flight: BTreeMap<RequestId, InFlight>,
    replay_at: Option<Instant>,
    last_disconnect_at: Option<Instant>,
    reset_grace_until: Option<Instant>,
}

impl<T: Transport> ClientSession<T> {
    pub fn new(transport: T, config: ResilienceConfig, outbox: Outbox, cache: DisplayCache) -> Self {
        Self {
            transport,
            config,
            link: LinkState::Disconnected,
            status: ConnectionStatus::Disconnected,
            outbox,
            cache,
            in_flight: BTreeMap::new(),
            replay_at: None,
            last_disconnect_at: None,
            reset_grace_until: None,
        }
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn cache(&self) -> &DisplayCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// True while answers are outstanding or a queued replay is scheduled.
    pub fn has_pending_work(&self) -> bool {
        !self.in_flight.is_empty()
            || (self.replay_at.is_some()
                && self.link == LinkState::Connected
                && !self.outbox.is_empty())
    }

    pub fn submit_a(&mut self, items: Vec<String>, now: Instant) -> SubmitOutcome {
        self.submit(EventKind::SubmitA, json!({ "items": items }), now)
    }

    pub fn submit_b(&mut self, item: String, now: Instant) -> SubmitOutcome {
        self.submit(EventKind::SubmitB, json!({ "item": item }), now)
    }

    /// Sends when connected, otherwise queues. A local send failure also
    /// queues; the user is never told a submission was lost.
    pub fn submit(&mut self, event: EventKind, payload: Value, now: Instant) -> SubmitOutcome {
        let entry = self.outbox.prepare(event, payload);
        if self.link != LinkState::Connected {
            self.outbox.enqueue(entry);
            return SubmitOutcome::Queued;
        }
        match self.transport.emit(event, &entry.payload) {
            Ok(request) => {
                self.track(request, event, Some(entry), now, false);
                SubmitOutcome::Pending(request)
            }
            Err(err) => {
                warn!(event = %event, error = %err, "send failed, queueing");
                self.outbox.enqueue(entry);
                SubmitOutcome::Queued
            }
        }
    }

    /// Clears the local view at once and opens the grace window during which
    /// an empty snapshot is trusted.
    pub fn request_reset(&mut self, now: Instant) -> ResetOutcome {
        self.reset_grace_until = Some(now + self.config.reset_grace);
        self.cache.clear();
        if self.link != LinkState::Connected {
            info!("reset applied locally while offline");
            return ResetOutcome::LocalOnly;
        }
        match self.transport.emit(EventKind::Reset, &Value::Null) {
            Ok(request) => {
                self.track(request, EventKind::Reset, None, now, false);
                ResetOutcome::Pending(request)
            }
            Err(err) => {
                warn!(error = %err, "reset not delivered");
                ResetOutcome::LocalOnly
            }
        }
    }

    fn track(
        &mut self,
        request: RequestId,
        event: EventKind,
        entry: Option<OutboxEntry>,
        now: Instant,
        reported: bool,
    ) {
        self.in_flight.insert(
            request,
            InFlight {
                event,
                entry,
                deadline: now + self.config.optimistic_timeout,
                reported,
            },
        );
    }

    /// Puts a submission back in its original place and schedules a replay.
    fn requeue(&mut self, entry: OutboxEntry, now: Instant) {
        self.outbox.enqueue(entry);
        let at = now + self.config.replay_interval;
        self.replay_at = Some(self.replay_at.map_or(at, |current| current.min(at)));
    }

    /// Feeds a server answer. Returns a completion only if the request had
    /// not already been resolved optimistically or replayed from the outbox.
    pub fn on_ack(
        &mut self,
        request: RequestId,
        result: Result<Ack, TransportError>,
        now: Instant,
    ) -> Option<Completion> {
        let flight = self.in_flight.remove(&request)?;
        let completion = match (result, flight.entry) {
            (Ok(ack), _) if ack.ok => Completion::Sent,
            (Ok(ack), Some(entry)) if flight.reported => {
                let reason = ack.reason.unwrap_or_else(|| "rejected".to_string());
                if worth_retrying(&reason) {
                    debug!(request = request.0, %reason, "queued again for replay");
                    self.requeue(entry, now);
                    Completion::Requeued
                } else {
                    warn!(request = request.0, event = %flight.event, %reason, "queued submission rejected");
                    Completion::Failed(reason)
                }
            }
            (Ok(ack), _) => Completion::Failed(ack.reason.unwrap_or_else(|| "rejected".to_string())),
            (Err(err), Some(entry)) => {
                warn!(request = request.0, error = %err, "delivery failed, back to outbox");
                self.requeue(entry, now);
                Completion::Requeued
            }
            (Err(err), None) => Completion::Failed(err.to_string()),
        };
        if flight.reported {
            debug!(request = request.0, ?completion, "late answer handled");
            return None;
        }
        Some(completion)
    }

    /// Resolves every request whose optimistic timer has fired as sent and
    /// runs a scheduled replay.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<(RequestId, Completion)> {
        let mut fired = Vec::new();
        for (request, flight) in self.in_flight.iter_mut() {
            if !flight.reported && flight.deadline <= now {
                flight.reported = true;
                fired.push((*request, Completion::Sent));
            }
        }
        if self.replay_at.map(|at| at <= now).unwrap_or(false) {
            self.replay_at = None;
            self.flush(now);
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let replay = self.replay_at.filter(|_| self.link == LinkState::Connected);
        self.in_flight
            .values()
            .filter(|flight| !flight.reported)
            .map(|flight| flight.deadline)
            .chain(replay)
            .min()
    }

    /// Entering the connected state starts replaying the outbox.
    pub fn on_connect(&mut self, now: Instant) -> FlushReport {
        self.link = LinkState::Connected;
        self.status = ConnectionStatus::Connected;
        self.flush(now)
    }

    /// Replays queued entries in order, at most one batch at a time. An entry
    /// leaves the outbox once the transport accepted it; the first local
    /// failure stops the flush.
    pub fn flush(&mut self, now: Instant) -> FlushReport {
        let mut report = FlushReport::default();
        if self.link != LinkState::Connected {
            report.remaining = self.outbox.len();
            return report;
        }
        while report.sent < self.config.replay_batch {
            let Some(entry) = self.outbox.front().cloned() else {
                break;
            };
            match self.transport.emit(entry.event, &entry.payload) {
                Ok(request) => {
                    self.outbox.remove(&entry.id);
                    self.track(request, entry.event, Some(entry), now, true);
                    report.sent += 1;
                }
                Err(err) => {
                    warn!(id = %entry.id, error = %err, "outbox flush interrupted");
                    break;
                }
            }
        }
        report.remaining = self.outbox.len();
        if report.remaining > 0 {
            self.replay_at = Some(now + self.config.replay_interval);
        }
        if report.sent > 0 {
            info!(sent = report.sent, remaining = report.remaining, "outbox flushed");
        }
        report
    }

    pub fn on_disconnect(&mut self, now: Instant) {
        self.link = LinkState::Disconnected;
        self.status = ConnectionStatus::Disconnected;
        self.last_disconnect_at = Some(now);
        self.replay_at = None;
    }

    pub fn on_connect_error(&mut self, now: Instant) {
        self.link = LinkState::Disconnected;
        self.status = ConnectionStatus::ConnectError;
        self.last_disconnect_at = Some(now);
        self.replay_at = None;
    }

    pub fn on_reconnect_attempt(&mut self) {
        self.link = LinkState::Reconnecting;
        self.status = ConnectionStatus::Reconnecting;
    }

    /// Applies a pushed snapshot unless it is older than the cached view or
    /// looks like a transient empty state after a connection drop.
    pub fn on_snapshot(&mut self, snapshot: Snapshot, now: Instant) -> SnapshotOutcome {
        let cached_version = self.cache.current().map(|current| current.meta.version);
        // a fresh connection or a reset may legitimately restart the count
        let restarts_count = snapshot.is_reset()
            || snapshot.meta.reason == SyncReason::InitialConnection.as_str();
        if let Some(cached) = cached_version {
            if snapshot.meta.version < cached && !restarts_count {
                debug!(
                    version = snapshot.meta.version,
                    cached,
                    reason = %snapshot.meta.reason,
                    "ignoring outdated state"
                );
                return SnapshotOutcome::Outdated;
            }
        }
        let in_grace = self.reset_grace_until.map(|until| now < until).unwrap_or(false);
        let recently_dropped = self
            .last_disconnect_at
            .map(|at| now.saturating_duration_since(at) < self.config.anti_erasure_window)
            .unwrap_or(false);
        if snapshot.is_empty() && self.cache.has_data() && !in_grace && recently_dropped {
            warn!(
                version = snapshot.meta.version,
                reason = %snapshot.meta.reason,
                "ignoring empty state after reconnect"
            );
            if self.link == LinkState::Connected {
                self.status = ConnectionStatus::StaleButConnected;
            }
            return SnapshotOutcome::Discarded;
        }
        self.cache.store(snapshot);
        if self.link == LinkState::Connected {
            self.status = ConnectionStatus::Connected;
        }
        SnapshotOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{Prompt, SnapshotItem, SnapshotMeta};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<(EventKind, Value)>,
        refuse_after: Option<usize>,
        next: u64,
    }

    impl Transport for RecordingTransport {
        fn emit(&mut self, event: EventKind, payload: &Value) -> Result<RequestId, TransportError> {
            if self.refuse_after.map(|n| self.sent.len() >= n).unwrap_or(false) {
                return Err(TransportError::NotConnected);
            }
            self.sent.push((event, payload.clone()));
            self.next += 1;
            Ok(RequestId(self.next))
        }
    }

    fn session() -> ClientSession<RecordingTransport> {
        session_with(ResilienceConfig::default())
    }

    fn session_with(config: ResilienceConfig) -> ClientSession<RecordingTransport> {
        ClientSession::new(
            RecordingTransport::default(),
            config,
            Outbox::in_memory(50),
            DisplayCache::in_memory(),
        )
    }

    fn queued_items(s: &ClientSession<RecordingTransport>) -> Vec<String> {
        s.outbox()
            .entries()
            .filter_map(|e| e.payload["item"].as_str().map(str::to_string))
            .collect()
    }

    fn populated(version: u64) -> Snapshot {
        Snapshot {
            meta: SnapshotMeta {
                version,
                timestamp: 0,
                reason: "promptA-update".to_string(),
            },
            prompt_a: vec![SnapshotItem {
                text: "responder emails".to_string(),
                count: 3,
            }],
            prompt_b: Vec::new(),
        }
    }

    fn reset_snapshot(version: u64) -> Snapshot {
        Snapshot::empty(version, "reset")
    }

    #[test]
    fn offline_submission_is_queued_then_replayed_once() {
        let mut s = session();
        let t0 = Instant::now();
        assert_eq!(s.submit_b("nominas".to_string(), t0), SubmitOutcome::Queued);
        assert_eq!(s.outbox().len(), 1);
        assert!(s.transport().sent.is_empty());

        let report = s.on_connect(t0 + Duration::from_secs(1));
        assert_eq!(report, FlushReport { sent: 1, remaining: 0 });
        assert_eq!(s.transport().sent.len(), 1);
        assert_eq!(s.transport().sent[0].0, EventKind::SubmitB);
        assert_eq!(s.transport().sent[0].1, json!({ "item": "nominas" }));
        assert!(s.outbox().is_empty());
        // replayed entries were already reported as queued
        assert_eq!(s.on_ack(RequestId(1), Ok(Ack::accepted(1)), t0), None);
    }

    #[test]
    fn flush_keeps_order_and_stops_at_first_failure() {
        let mut s = session();
        let t0 = Instant::now();
        for item in ["a", "b", "c"] {
            s.submit_b(item.to_string(), t0);
        }
        s.transport_mut().refuse_after = Some(2);
        let report = s.on_connect(t0);
        assert_eq!(report, FlushReport { sent: 2, remaining: 1 });
        let sent: Vec<&Value> = s.transport().sent.iter().map(|(_, p)| &p["item"]).collect();
        assert_eq!(sent, vec![&json!("a"), &json!("b")]);
        assert_eq!(s.outbox().front().unwrap().payload, json!({ "item": "c" }));
    }

    #[test]
    fn optimistic_timer_reports_sent_and_late_ack_is_ignored() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        let SubmitOutcome::Pending(request) = s.submit_a(vec!["actas".to_string()], t0) else {
            panic!("expected a pending send");
        };
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(900)));
        assert!(s.poll_timers(t0 + Duration::from_millis(500)).is_empty());
        assert_eq!(
            s.poll_timers(t0 + Duration::from_millis(900)),
            vec![(request, Completion::Sent)]
        );
        assert_eq!(s.next_deadline(), None);
        let late = t0 + Duration::from_secs(1);
        // already reported as sent, so a rate-limited answer queues it again
        assert_eq!(s.on_ack(request, Ok(Ack::rejected("rate-limit")), late), None);
        assert_eq!(s.outbox().len(), 1);
        assert_eq!(s.on_ack(request, Ok(Ack::accepted(1)), late), None);
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn negative_ack_before_timer_is_an_error() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        let SubmitOutcome::Pending(request) = s.submit_b("x".to_string(), t0) else {
            panic!("expected a pending send");
        };
        assert_eq!(
            s.on_ack(request, Ok(Ack::rejected("rate-limit")), t0),
            Some(Completion::Failed("rate-limit".to_string()))
        );
        assert!(s.poll_timers(t0 + Duration::from_secs(5)).is_empty());
        assert!(s.outbox().is_empty());
    }

    #[test]
    fn failed_delivery_goes_back_to_outbox() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        let SubmitOutcome::Pending(request) = s.submit_b("inventario".to_string(), t0) else {
            panic!("expected a pending send");
        };
        assert_eq!(
            s.on_ack(request, Err(TransportError::Status(502)), t0),
            Some(Completion::Requeued)
        );
        assert_eq!(s.outbox().len(), 1);
    }

    #[test]
    fn local_send_failure_queues() {
        let mut s = session();
        s.on_connect(Instant::now());
        s.transport_mut().refuse_after = Some(0);
        assert_eq!(
            s.submit_b("nominas".to_string(), Instant::now()),
            SubmitOutcome::Queued
        );
        assert_eq!(s.outbox().len(), 1);
    }

    #[test]
    fn empty_push_after_drop_is_discarded() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        assert_eq!(s.on_snapshot(populated(3), t0), SnapshotOutcome::Applied);
        s.on_disconnect(t0 + Duration::from_secs(1));
        s.on_reconnect_attempt();
        s.on_connect(t0 + Duration::from_secs(2));
        assert_eq!(
            s.on_snapshot(reset_snapshot(4), t0 + Duration::from_secs(3)),
            SnapshotOutcome::Discarded
        );
        assert_eq!(s.status(), ConnectionStatus::StaleButConnected);
        assert_eq!(s.cache().items(Prompt::A)[0].count, 3);

        assert_eq!(
            s.on_snapshot(populated(5), t0 + Duration::from_secs(4)),
            SnapshotOutcome::Applied
        );
        assert_eq!(s.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn empty_push_outside_window_is_applied() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        s.on_snapshot(populated(3), t0);
        s.on_connect_error(t0);
        s.on_connect(t0 + Duration::from_secs(1));
        assert_eq!(
            s.on_snapshot(reset_snapshot(4), t0 + Duration::from_secs(31)),
            SnapshotOutcome::Applied
        );
        assert!(!s.cache().has_data());
    }

    #[test]
    fn empty_push_without_any_drop_is_applied() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        s.on_snapshot(populated(3), t0);
        assert_eq!(
            s.on_snapshot(reset_snapshot(4), t0 + Duration::from_secs(1)),
            SnapshotOutcome::Applied
        );
    }

    #[test]
    fn reset_grace_overrides_anti_erasure() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        s.on_snapshot(populated(3), t0);
        s.on_disconnect(t0);
        s.on_connect(t0 + Duration::from_secs(1));
        s.on_snapshot(populated(4), t0 + Duration::from_secs(1));

        let ResetOutcome::Pending(request) = s.request_reset(t0 + Duration::from_secs(2)) else {
            panic!("expected the reset to be sent");
        };
        assert!(!s.cache().has_data());
        assert_eq!(s.transport().sent.last().unwrap().0, EventKind::Reset);
        assert_eq!(s.on_ack(request, Ok(Ack::ok()), t0), Some(Completion::Sent));
        assert_eq!(
            s.on_snapshot(reset_snapshot(5), t0 + Duration::from_secs(3)),
            SnapshotOutcome::Applied
        );
        // later data is never mistaken for an erasure
        assert_eq!(
            s.on_snapshot(populated(6), t0 + Duration::from_secs(4)),
            SnapshotOutcome::Applied
        );
        assert!(s.cache().has_data());
    }

    #[test]
    fn offline_reset_is_local_and_not_queued() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_snapshot(populated(3), t0);
        assert_eq!(s.request_reset(t0), ResetOutcome::LocalOnly);
        assert!(s.outbox().is_empty());
        assert!(!s.cache().has_data());
        s.on_connect(t0 + Duration::from_secs(1));
        assert!(s.transport().sent.is_empty());
    }

    #[test]
    fn status_follows_link_events() {
        let mut s = session();
        let t0 = Instant::now();
        assert_eq!(s.status(), ConnectionStatus::Disconnected);
        s.on_connect_error(t0);
        assert_eq!(s.status(), ConnectionStatus::ConnectError);
        s.on_reconnect_attempt();
        assert_eq!(s.link(), LinkState::Reconnecting);
        assert_eq!(s.status().label(), "reconnecting");
        assert_eq!(s.submit_b("x".to_string(), t0), SubmitOutcome::Queued);
        s.on_connect(t0);
        assert_eq!(s.link(), LinkState::Connected);
    }

    #[test]
    fn rate_limited_replays_go_back_in_order() {
        let mut s = session_with(ResilienceConfig {
            replay_batch: 50,
            ..ResilienceConfig::default()
        });
        let t0 = Instant::now();
        for n in 0..40 {
            s.submit_b(format!("answer {n}"), t0);
        }
        assert_eq!(s.on_connect(t0), FlushReport { sent: 40, remaining: 0 });
        for id in 1..=40u64 {
            let ack = if id <= 25 {
                Ack::accepted(1)
            } else {
                Ack::rejected("rate-limit")
            };
            assert_eq!(s.on_ack(RequestId(id), Ok(ack), t0), None);
        }
        let expected: Vec<String> = (25..40).map(|n| format!("answer {n}")).collect();
        assert_eq!(queued_items(&s), expected);
        assert!(s.has_pending_work());

        let retry = t0 + Duration::from_millis(2600);
        assert_eq!(s.next_deadline(), Some(retry));
        assert!(s.poll_timers(retry).is_empty());
        assert!(s.outbox().is_empty());
        assert_eq!(s.transport().sent.len(), 55);
        assert_eq!(s.transport().sent[40].1, json!({ "item": "answer 25" }));
    }

    #[test]
    fn replay_is_paced_in_batches() {
        let mut s = session();
        let t0 = Instant::now();
        for n in 0..30 {
            s.submit_b(format!("answer {n}"), t0);
        }
        assert_eq!(s.on_connect(t0), FlushReport { sent: 20, remaining: 10 });
        s.poll_timers(t0 + Duration::from_secs(1));
        assert_eq!(s.transport().sent.len(), 20);
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(2600)));

        s.poll_timers(t0 + Duration::from_millis(2600));
        assert_eq!(s.transport().sent.len(), 30);
        assert!(s.outbox().is_empty());
        assert_eq!(s.transport().sent[29].1, json!({ "item": "answer 29" }));
    }

    #[test]
    fn failed_delivery_keeps_submission_order() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        let SubmitOutcome::Pending(first) = s.submit_b("first".to_string(), t0) else {
            panic!("expected a pending send");
        };
        s.on_disconnect(t0);
        s.submit_b("second".to_string(), t0);
        s.submit_b("third".to_string(), t0);
        assert_eq!(
            s.on_ack(first, Err(TransportError::Http("reset by peer".to_string())), t0),
            Some(Completion::Requeued)
        );
        assert_eq!(queued_items(&s), vec!["first", "second", "third"]);
    }

    #[test]
    fn failed_middle_replay_stays_ahead_of_newer_entries() {
        let mut s = session();
        let t0 = Instant::now();
        for item in ["a", "b", "c"] {
            s.submit_b(item.to_string(), t0);
        }
        s.on_connect(t0);
        assert_eq!(s.on_ack(RequestId(1), Ok(Ack::accepted(1)), t0), None);
        assert_eq!(s.on_ack(RequestId(2), Err(TransportError::Status(503)), t0), None);
        assert_eq!(s.on_ack(RequestId(3), Ok(Ack::accepted(1)), t0), None);
        s.on_disconnect(t0);
        s.submit_b("d".to_string(), t0);
        assert_eq!(queued_items(&s), vec!["b", "d"]);
    }

    #[test]
    fn older_snapshots_do_not_replace_newer_ones() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_connect(t0);
        assert_eq!(s.on_snapshot(populated(5), t0), SnapshotOutcome::Applied);
        assert_eq!(s.on_snapshot(populated(4), t0), SnapshotOutcome::Outdated);
        assert_eq!(s.cache().current().unwrap().meta.version, 5);
        assert_eq!(s.on_snapshot(populated(5), t0), SnapshotOutcome::Applied);

        // a restarted server starts counting again
        let mut restarted = populated(2);
        restarted.meta.reason = "initial-connection".to_string();
        assert_eq!(s.on_snapshot(restarted, t0), SnapshotOutcome::Applied);
        assert_eq!(s.cache().current().unwrap().meta.version, 2);
    }
}
