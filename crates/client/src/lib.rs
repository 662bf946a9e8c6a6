mod cache;
mod config;
mod display;
mod error;
mod outbox;
mod runner;
mod session;
mod sse;
mod storage;
mod transport;

pub use cache::DisplayCache;
pub use config::{Backoff, ClientConfig, ResilienceConfig, DEFAULT_SERVER_URL};
pub use display::{size_bounds, weigh, WeightedItem, MIN_SIZE};
pub use error::{ClientError, Result, TransportError};
pub use outbox::{Outbox, OutboxEntry};
pub use runner::{Driver, DriverEvent};
pub use session::{
    ClientSession, Completion, ConnectionStatus, FlushReport, LinkState, ResetOutcome,
    SnapshotOutcome, SubmitOutcome,
};
pub use sse::{SseDecoder, SseMessage};
pub use storage::{read_json_or_default, write_json_atomic};
pub use transport::{AckEvent, HttpTransport, RequestId, Transport};
