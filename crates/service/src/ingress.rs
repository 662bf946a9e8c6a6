use std::time::{Duration, Instant};

use serde_json::Value;

use pulse_core::{Ack, EventKind, Prompt};

/// Inbound event after shape normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Items { prompt: Prompt, items: Vec<String> },
    Reset,
    StateRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Ready(Submission),
    Malformed,
}

/// Decodes a raw request body for `kind`. An empty body counts as no payload;
/// reset and state requests ignore the body entirely.
pub fn decode(kind: EventKind, body: &[u8]) -> Decoded {
    match kind {
        EventKind::Reset => return Decoded::Ready(Submission::Reset),
        EventKind::StateRequest => return Decoded::Ready(Submission::StateRequest),
        EventKind::SubmitA | EventKind::SubmitB => {}
    }
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => value,
            Err(_) => return Decoded::Malformed,
        }
    };
    let mut items = extract_items(&payload);
    let prompt = match kind {
        EventKind::SubmitB => {
            items.truncate(1);
            Prompt::B
        }
        _ => Prompt::A,
    };
    Decoded::Ready(Submission::Items { prompt, items })
}

impl Submission {
    /// Acknowledgment sent before any processing happens.
    pub fn ack(&self) -> Ack {
        match self {
            Submission::Items { items, .. } => Ack::accepted(items.len()),
            Submission::Reset | Submission::StateRequest => Ack::ok(),
        }
    }
}

/// Pulls trimmed, non-blank items out of a bare string, a list, or an object
/// carrying `items` (list) or `item` (string). Anything else yields nothing.
pub fn extract_items(payload: &Value) -> Vec<String> {
    let raw: Vec<String> = match payload {
        Value::String(text) => vec![text.clone()],
        Value::Array(values) => values.iter().filter_map(scalar_text).collect(),
        Value::Object(map) => match (map.get("items"), map.get("item")) {
            (Some(Value::Array(values)), _) => values.iter().filter_map(scalar_text).collect(),
            (_, Some(Value::String(text))) => vec![text.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Fixed-window counter: at most `max_events` per window, refilled whole
/// when the window elapses.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_events: u32,
    window: Duration,
    window_start: Instant,
    used: u32,
}

impl RateLimiter {
    pub fn new(max_events: u32, window: Duration) -> Self {
        Self {
            max_events,
            window,
            window_start: Instant::now(),
            used: 0,
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.used = 0;
        }
        if self.used >= self.max_events {
            return false;
        }
        self.used += 1;
        true
    }
}
