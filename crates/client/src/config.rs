use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// How long after a disconnect an empty snapshot is treated as suspect.
    pub anti_erasure_window: Duration,
    /// How long after a local reset an empty snapshot is authoritative.
    pub reset_grace: Duration,
    pub optimistic_timeout: Duration,
    pub outbox_capacity: usize,
    /// Most queued entries replayed at once; stays under the server's
    /// per-connection rate limit.
    pub replay_batch: usize,
    /// Pause before the next replay batch or a retry of rejected entries.
    pub replay_interval: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            anti_erasure_window: Duration::from_secs(30),
            reset_grace: Duration::from_secs(12),
            optimistic_timeout: Duration::from_millis(900),
            outbox_capacity: 50,
            replay_batch: 20,
            replay_interval: Duration::from_millis(2600),
            reconnect_initial: Duration::from_millis(600),
            reconnect_max: Duration::from_millis(2500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub data_dir: PathBuf,
    pub resilience: ResilienceConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            data_dir: PathBuf::from(".pulse-client"),
            resilience: ResilienceConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn outbox_path(&self) -> PathBuf {
        self.data_dir.join("outbox.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("last-state.json")
    }

    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

/// Exponential reconnect delay, doubling from `initial` up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(config.reconnect_initial, config.reconnect_max)
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
