use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt as _};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pulse_core::{
    Ack, AggregateStore, EventKind, Hello, Snapshot, SyncReason, HELLO_EVENT, STATE_UPDATE_EVENT,
};

use crate::hub::{Admission, Hub, Outbound};
use crate::ingress::{decode, Decoded, Submission};
use crate::saver::Saver;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

pub struct AppState {
    pub store: Arc<AggregateStore>,
    pub hub: Arc<Hub>,
    pub saver: Saver,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", get(events_sse))
        .route("/events/:connection_id/:event", post(handle_event))
        .route("/state", get(current_state))
        .with_state(state)
}

async fn events_sse(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let registration = state.hub.connect();
    let guard = registration.guard;
    let tx = registration.sender;
    let hello = Hello {
        connection_id: guard.id().to_string(),
    };
    let bus = state.hub.subscribe();
    let closing = state.hub.closing();
    let initial = state.store.snapshot(SyncReason::InitialConnection);
    let sent_version = initial.meta.version;
    let _ = tx.send(Outbound::Hello(hello)).await;
    let _ = tx.send(Outbound::State(Arc::new(initial))).await;
    spawn_forwarder(tx, bus, closing, guard.id(), sent_version);

    let stream = ReceiverStream::new(registration.receiver).map(move |message| {
        // the guard lives as long as the stream
        let _ = &guard;
        Ok(to_event(message))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("keep-alive"))
}

/// Copies bus snapshots into one stream's queue. Anything not newer than what
/// the stream already carries is skipped, including updates queued on the bus
/// before the initial snapshot was taken.
fn spawn_forwarder(
    tx: mpsc::Sender<Outbound>,
    mut bus: broadcast::Receiver<Arc<Snapshot>>,
    mut closing: watch::Receiver<bool>,
    connection: Uuid,
    mut sent_version: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if *closing.borrow() {
            return;
        }
        loop {
            let snapshot = tokio::select! {
                _ = tx.closed() => break,
                _ = closing.changed() => break,
                update = bus.recv() => match update {
                    Ok(snapshot) => snapshot,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(connection = %connection, skipped, "stream lagging, skipping stale snapshots");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if snapshot.meta.version <= sent_version {
                debug!(connection = %connection, version = snapshot.meta.version, "stale snapshot skipped");
                continue;
            }
            sent_version = snapshot.meta.version;
            if tx.send(Outbound::State(snapshot)).await.is_err() {
                break;
            }
        }
        debug!(connection = %connection, "stream forwarder stopped");
    })
}

fn to_event(message: Outbound) -> Event {
    let (name, data) = match message {
        Outbound::Hello(hello) => (HELLO_EVENT, serde_json::to_string(&hello)),
        Outbound::State(snapshot) => (STATE_UPDATE_EVENT, serde_json::to_string(&*snapshot)),
    };
    Event::default()
        .event(name)
        .data(data.unwrap_or_else(|_| "{}".to_string()))
}

const UNKNOWN_CONNECTION: &str = "unknown-connection";

async fn handle_event(
    State(state): State<Arc<AppState>>,
    AxumPath((connection_id, event)): AxumPath<(String, String)>,
    body: Bytes,
) -> Result<Json<Ack>, AppError> {
    let kind = EventKind::parse(&event)
        .ok_or_else(|| AppError::bad_request(format!("unknown event {event}")))?;
    let Ok(connection) = Uuid::parse_str(&connection_id) else {
        return Ok(Json(Ack::rejected(UNKNOWN_CONNECTION)));
    };
    if kind.prompt().is_some() {
        match state.hub.admit(connection) {
            Admission::Allowed => {}
            Admission::Limited => return Ok(Json(Ack::rejected("rate-limit"))),
            Admission::UnknownConnection => return Ok(Json(Ack::rejected(UNKNOWN_CONNECTION))),
        }
    } else if !state.hub.is_connected(connection) {
        return Ok(Json(Ack::rejected(UNKNOWN_CONNECTION)));
    }
    let submission = match decode(kind, &body) {
        Decoded::Ready(submission) => submission,
        Decoded::Malformed => {
            debug!(connection = %connection, event = %kind, "malformed payload");
            return Ok(Json(Ack::rejected("malformed")));
        }
    };
    let ack = submission.ack();
    dispatch(state, connection, submission);
    Ok(Json(ack))
}

/// Runs the work behind an already acknowledged event.
fn dispatch(state: Arc<AppState>, connection: Uuid, submission: Submission) {
    match submission {
        Submission::Items { items, .. } if items.is_empty() => {}
        Submission::Items { prompt, items } => {
            tokio::spawn(async move {
                let changed = state.store.ingest(prompt, &items).await;
                if changed > 0 {
                    state.hub.publish(|| state.store.snapshot(prompt.update_reason()));
                    state.saver.schedule();
                }
            });
        }
        Submission::Reset => {
            tokio::spawn(async move {
                let version = state.store.reset().await;
                info!(connection = %connection, version, "state reset");
                state.hub.publish(|| state.store.snapshot(SyncReason::Reset));
                state.saver.schedule();
            });
        }
        Submission::StateRequest => {
            let snapshot = state.store.snapshot(SyncReason::ClientRequest);
            if !state.hub.send_to(connection, snapshot) {
                warn!(connection = %connection, "could not queue requested state");
            }
        }
    }
}

async fn current_state(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.store.snapshot(SyncReason::ClientRequest))
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        }
    }
}
