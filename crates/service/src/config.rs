use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use pulse_core::{
    MatchingConfig, DEFAULT_ORACLE_TIMEOUT_MS, DEFAULT_SEMANTIC_THRESHOLD,
    DEFAULT_SIMILARITY_THRESHOLD,
};

pub const DEFAULT_CONFIG_PATH: &str = "pulse.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub persistence: PersistenceSection,
    pub rate_limit: RateLimitSection,
    pub matching: MatchingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceSection {
    pub state_file: PathBuf,
    pub debounce_ms: u64,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("state.json"),
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub max_events: u32,
    pub window_ms: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_events: 25,
            window_ms: 2500,
        }
    }
}

impl RateLimitSection {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    pub similarity_threshold: f32,
    pub semantic_threshold: f32,
    pub oracle_timeout_ms: u64,
    pub semantic_enabled: bool,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            oracle_timeout_ms: DEFAULT_ORACLE_TIMEOUT_MS,
            semantic_enabled: false,
        }
    }
}

impl MatchingSection {
    pub fn thresholds(&self) -> MatchingConfig {
        MatchingConfig {
            similarity_threshold: self.similarity_threshold,
            semantic_threshold: self.semantic_threshold,
            oracle_timeout_ms: self.oracle_timeout_ms,
        }
    }
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address {}", self.server.bind_addr))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }

    /// Environment variables win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(path) = lookup("PULSE_STATE_FILE") {
            self.persistence.state_file = PathBuf::from(path);
        }
        if let Some(flag) = lookup("USE_EMBEDDINGS") {
            self.matching.semantic_enabled = flag.trim() == "1";
        }
        if let Some(value) = parsed(&lookup, "PULSE_SIMILARITY_THRESHOLD") {
            self.matching.similarity_threshold = value;
        }
        if let Some(value) = parsed(&lookup, "PULSE_SEMANTIC_THRESHOLD") {
            self.matching.semantic_threshold = value;
        }
        if let Some(value) = parsed(&lookup, "PULSE_ORACLE_TIMEOUT_MS") {
            self.matching.oracle_timeout_ms = value;
        }
        if let Some(value) = parsed(&lookup, "PULSE_SAVE_DEBOUNCE_MS") {
            self.persistence.debounce_ms = value;
        }
    }
}

fn parsed<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

pub fn load_service_config() -> ServiceConfig {
    let config_path =
        std::env::var("PULSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = read_config_file(Path::new(&config_path));
    config.apply_env(|name| std::env::var(name).ok());
    config
}

fn read_config_file(path: &Path) -> ServiceConfig {
    if !path.exists() {
        return ServiceConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<ServiceConfig>(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "invalid config file, using defaults");
            ServiceConfig::default()
        }),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable config file, using defaults");
            ServiceConfig::default()
        }
    }
}
