use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pulse_core::{Hello, Snapshot, HELLO_EVENT, STATE_UPDATE_EVENT};

use crate::cache::DisplayCache;
use crate::config::{Backoff, ClientConfig};
use crate::error::TransportError;
use crate::outbox::Outbox;
use crate::session::{ClientSession, Completion, ConnectionStatus, FlushReport, SnapshotOutcome};
use crate::sse::{SseDecoder, SseMessage};
use crate::transport::{AckEvent, HttpTransport, RequestId};

const HELLO_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Something the driver wants the caller to render.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Status(ConnectionStatus),
    Snapshot(SnapshotOutcome),
    Completed(RequestId, Completion),
    Flushed(FlushReport),
}

/// One open `GET /events` stream.
struct Connection {
    response: reqwest::Response,
    decoder: SseDecoder,
    carry: Vec<u8>,
    buffered: VecDeque<SseMessage>,
}

impl Connection {
    async fn open(http: &Client, base_url: &str) -> Result<Self, TransportError> {
        let response = http
            .get(format!("{base_url}/events"))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(Self {
            response,
            decoder: SseDecoder::new(),
            carry: Vec::new(),
            buffered: VecDeque::new(),
        })
    }

    async fn next_message(&mut self) -> Result<SseMessage, TransportError> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Ok(message);
            }
            let Some(bytes) = self.response.chunk().await? else {
                return Err(TransportError::StreamClosed);
            };
            self.carry.extend_from_slice(&bytes);
            // a chunk may end inside a multi-byte character
            let valid = match std::str::from_utf8(&self.carry) {
                Ok(text) => text.len(),
                Err(err) => err.valid_up_to(),
            };
            let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
            self.carry.drain(..valid);
            self.buffered.extend(self.decoder.push(&text));
        }
    }

    async fn wait_for_hello(&mut self) -> Result<Hello, TransportError> {
        loop {
            let message = self.next_message().await?;
            if message.event == HELLO_EVENT {
                return serde_json::from_str(&message.data)
                    .map_err(|err| TransportError::Decode(err.to_string()));
            }
            debug!(event = %message.event, "skipping event before hello");
        }
    }
}

enum Wake {
    Message(Result<SseMessage, TransportError>),
    Ack(Option<AckEvent>),
    Timer,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Runs a [`ClientSession`] against a live server: keeps the event stream
/// open, reconnects with backoff, and feeds acks and timers into the session.
pub struct Driver {
    session: ClientSession<HttpTransport>,
    acks: mpsc::UnboundedReceiver<AckEvent>,
    http: Client,
    base_url: String,
    backoff: Backoff,
    connection: Option<Connection>,
}

impl Driver {
    /// Opens the durable outbox and display cache under the configured data
    /// directory. Needs a tokio runtime.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating {}", config.data_dir.display()))?;
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("building http client")?;
        let (transport, acks) = HttpTransport::new(http.clone(), config.base_url());
        let session = ClientSession::new(
            transport,
            config.resilience,
            Outbox::open(&config.outbox_path(), config.resilience.outbox_capacity),
            DisplayCache::open(&config.cache_path()),
        );
        Ok(Self {
            session,
            acks,
            http,
            base_url: config.base_url().to_string(),
            backoff: Backoff::from_config(&config.resilience),
            connection: None,
        })
    }

    pub fn session(&self) -> &ClientSession<HttpTransport> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ClientSession<HttpTransport> {
        &mut self.session
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens the event stream, waits for the handshake and flushes the outbox.
    pub async fn connect(&mut self) -> Result<FlushReport, TransportError> {
        let (http, base_url) = (&self.http, self.base_url.as_str());
        let opened = tokio::time::timeout(HELLO_TIMEOUT, async {
            let mut connection = Connection::open(http, base_url).await?;
            let hello = connection.wait_for_hello().await?;
            Ok::<_, TransportError>((connection, hello))
        })
        .await
        .unwrap_or(Err(TransportError::StreamClosed));
        let (connection, hello) = match opened {
            Ok(opened) => opened,
            Err(err) => {
                self.session.on_connect_error(Instant::now());
                return Err(err);
            }
        };
        info!(connection = %hello.connection_id, "connected");
        self.session
            .transport_mut()
            .set_connection(Some(hello.connection_id));
        self.connection = Some(connection);
        self.backoff.reset();
        Ok(self.session.on_connect(Instant::now()))
    }

    fn drop_connection(&mut self, err: &TransportError) {
        warn!(error = %err, "event stream lost");
        self.connection = None;
        self.session.transport_mut().set_connection(None);
        self.session.on_disconnect(Instant::now());
    }

    /// Follows the server forever, reconnecting as needed.
    pub async fn watch<F>(&mut self, mut on_event: F)
    where
        F: FnMut(&ClientSession<HttpTransport>, DriverEvent),
    {
        loop {
            if self.connection.is_none() {
                match self.connect().await {
                    Ok(report) => {
                        on_event(&self.session, DriverEvent::Status(self.session.status()));
                        if report.sent > 0 {
                            on_event(&self.session, DriverEvent::Flushed(report));
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "connect failed");
                        on_event(&self.session, DriverEvent::Status(self.session.status()));
                        tokio::time::sleep(self.backoff.next_delay()).await;
                        self.session.on_reconnect_attempt();
                        on_event(&self.session, DriverEvent::Status(self.session.status()));
                        continue;
                    }
                }
            }
            self.step(&mut on_event).await;
            if self.connection.is_none() {
                tokio::time::sleep(self.backoff.next_delay()).await;
                self.session.on_reconnect_attempt();
                on_event(&self.session, DriverEvent::Status(self.session.status()));
            }
        }
    }

    async fn step<F>(&mut self, on_event: &mut F)
    where
        F: FnMut(&ClientSession<HttpTransport>, DriverEvent),
    {
        let deadline = self.session.next_deadline();
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        let wake = tokio::select! {
            message = connection.next_message() => Wake::Message(message),
            ack = self.acks.recv() => Wake::Ack(ack),
            _ = wait_until(deadline) => Wake::Timer,
        };
        let now = Instant::now();
        match wake {
            Wake::Message(Ok(message)) => {
                if message.event != STATE_UPDATE_EVENT {
                    debug!(event = %message.event, "ignoring event");
                    return;
                }
                let snapshot: Snapshot = match serde_json::from_str(&message.data) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(error = %err, "undecodable state update");
                        return;
                    }
                };
                let before = self.session.status();
                let outcome = self.session.on_snapshot(snapshot, now);
                on_event(&self.session, DriverEvent::Snapshot(outcome));
                if self.session.status() != before {
                    on_event(&self.session, DriverEvent::Status(self.session.status()));
                }
            }
            Wake::Message(Err(err)) => {
                self.drop_connection(&err);
                on_event(&self.session, DriverEvent::Status(self.session.status()));
            }
            Wake::Ack(Some(AckEvent { request, result })) => {
                if let Some(completion) = self.session.on_ack(request, result, now) {
                    on_event(&self.session, DriverEvent::Completed(request, completion));
                }
            }
            Wake::Ack(None) => {}
            Wake::Timer => {
                for (request, completion) in self.session.poll_timers(now) {
                    on_event(&self.session, DriverEvent::Completed(request, completion));
                }
            }
        }
    }

    /// Waits until every emitted event has an answer and scheduled replays
    /// went out, or `limit` elapses.
    /// Emitted work is spawned, so callers about to exit must settle first.
    pub async fn settle(&mut self, limit: Duration) -> Vec<(RequestId, Completion)> {
        let give_up = tokio::time::Instant::now() + limit;
        let mut completed = Vec::new();
        while self.session.has_pending_work() {
            let deadline = self.session.next_deadline();
            tokio::select! {
                ack = self.acks.recv() => {
                    let Some(AckEvent { request, result }) = ack else { break };
                    if let Some(completion) = self.session.on_ack(request, result, Instant::now()) {
                        completed.push((request, completion));
                    }
                }
                _ = wait_until(deadline) => {
                    completed.extend(self.session.poll_timers(Instant::now()));
                }
                _ = tokio::time::sleep_until(give_up) => {
                    warn!(pending = self.session.in_flight(), "gave up waiting for answers");
                    break;
                }
            }
        }
        completed
    }
}
