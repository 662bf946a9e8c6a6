use thiserror::Error;

/// Failure to hand an event to the server. Never surfaced to the user as a
/// lost submission; the session queues instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("http error: {0}")]
    Http(String),
    #[error("server answered {0}")]
    Status(u16),
    #[error("stream closed")]
    StreamClosed,
    #[error("unexpected payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Core(#[from] pulse_core::PulseError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
