use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use pulse_core::{Ack, EventKind};

use crate::error::TransportError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Acknowledgment (or delivery failure) for an emitted event, delivered later.
#[derive(Debug, Clone, PartialEq)]
pub struct AckEvent {
    pub request: RequestId,
    pub result: Result<Ack, TransportError>,
}

/// Emits named events. `emit` only fails for local reasons such as having no
/// live connection; the server's answer arrives separately as an [`AckEvent`].
pub trait Transport {
    fn emit(&mut self, event: EventKind, payload: &Value) -> Result<RequestId, TransportError>;
}

/// Posts events to `/events/{connection}/{event}` and reports answers on a
/// channel. Must be used inside a tokio runtime.
pub struct HttpTransport {
    http: Client,
    base_url: String,
    connection_id: Option<String>,
    next_id: u64,
    acks: mpsc::UnboundedSender<AckEvent>,
}

impl HttpTransport {
    pub fn new(http: Client, base_url: &str) -> (Self, mpsc::UnboundedReceiver<AckEvent>) {
        let (acks, rx) = mpsc::unbounded_channel();
        (
            Self {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                connection_id: None,
                next_id: 0,
                acks,
            },
            rx,
        )
    }

    pub fn set_connection(&mut self, connection_id: Option<String>) {
        self.connection_id = connection_id;
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }
}

impl Transport for HttpTransport {
    fn emit(&mut self, event: EventKind, payload: &Value) -> Result<RequestId, TransportError> {
        let connection = self
            .connection_id
            .as_deref()
            .ok_or(TransportError::NotConnected)?;
        self.next_id += 1;
        let request = RequestId(self.next_id);
        let url = format!("{}/events/{}/{}", self.base_url, connection, event.as_str());
        let call = self
            .http
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(payload);
        let acks = self.acks.clone();
        tokio::spawn(async move {
            let result = match call.send().await {
                Ok(response) if response.status().is_success() => response
                    .json::<Ack>()
                    .await
                    .map_err(|err| TransportError::Decode(err.to_string())),
                Ok(response) => Err(TransportError::Status(response.status().as_u16())),
                Err(err) => Err(err.into()),
            };
            debug!(request = request.0, ok = result.is_ok(), "event answered");
            let _ = acks.send(AckEvent { request, result });
        });
        Ok(request)
    }
}
