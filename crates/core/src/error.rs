use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("embedding oracle error: {0}")]
    Oracle(String),
    #[error("embedding oracle timed out after {0} ms")]
    OracleTimeout(u64),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PulseError>;

impl From<anyhow::Error> for PulseError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

impl From<tempfile::PersistError> for PulseError {
    fn from(value: tempfile::PersistError) -> Self {
        Self::Io(value.error)
    }
}
