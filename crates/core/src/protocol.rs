use std::fmt;

use serde::{Deserialize, Serialize};

pub const STATE_UPDATE_EVENT: &str = "state:update";
pub const HELLO_EVENT: &str = "hello";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prompt {
    #[serde(rename = "promptA")]
    A,
    #[serde(rename = "promptB")]
    B,
}

impl Prompt {
    pub const ALL: [Prompt; 2] = [Prompt::A, Prompt::B];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::A => "promptA",
            Prompt::B => "promptB",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Prompt::A => 0,
            Prompt::B => 1,
        }
    }

    pub fn update_reason(&self) -> SyncReason {
        match self {
            Prompt::A => SyncReason::PromptAUpdate,
            Prompt::B => SyncReason::PromptBUpdate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    InitialConnection,
    ClientRequest,
    PromptAUpdate,
    PromptBUpdate,
    Reset,
}

impl SyncReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::InitialConnection => "initial-connection",
            SyncReason::ClientRequest => "client-request",
            SyncReason::PromptAUpdate => "promptA-update",
            SyncReason::PromptBUpdate => "promptB-update",
            SyncReason::Reset => "reset",
        }
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named events a client may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum EventKind {
    SubmitA,
    SubmitB,
    Reset,
    StateRequest,
}

impl EventKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "promptA:submit" | "promptA" | "q1:submit" | "q1:send" | "q1:answers" | "q1" => {
                Some(EventKind::SubmitA)
            }
            "promptB:submit" | "promptB" | "q2:submit" | "q2:send" | "q2:answer" | "q2" => {
                Some(EventKind::SubmitB)
            }
            "admin:reset" | "reset" => Some(EventKind::Reset),
            "state:request" => Some(EventKind::StateRequest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SubmitA => "promptA:submit",
            EventKind::SubmitB => "promptB:submit",
            EventKind::Reset => "admin:reset",
            EventKind::StateRequest => "state:request",
        }
    }

    pub fn prompt(&self) -> Option<Prompt> {
        match self {
            EventKind::SubmitA => Some(Prompt::A),
            EventKind::SubmitB => Some(Prompt::B),
            _ => None,
        }
    }
}

impl TryFrom<String> for EventKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventKind::parse(&value).ok_or_else(|| format!("unknown event {value}"))
    }
}

impl From<EventKind> for &'static str {
    fn from(value: EventKind) -> Self {
        value.as_str()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgment returned for every emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            accepted: None,
            reason: None,
        }
    }

    pub fn accepted(count: usize) -> Self {
        Self {
            ok: true,
            accepted: Some(count),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            accepted: None,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub text: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: u64,
    pub timestamp: i64,
    #[serde(default)]
    pub reason: String,
}

/// Full aggregate state pushed to clients; last snapshot wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    #[serde(rename = "promptA", default)]
    pub prompt_a: Vec<SnapshotItem>,
    #[serde(rename = "promptB", default)]
    pub prompt_b: Vec<SnapshotItem>,
}

impl Snapshot {
    pub fn empty(version: u64, reason: &str) -> Self {
        Self {
            meta: SnapshotMeta {
                version,
                timestamp: chrono::Utc::now().timestamp_millis(),
                reason: reason.to_string(),
            },
            prompt_a: Vec::new(),
            prompt_b: Vec::new(),
        }
    }

    pub fn items(&self, prompt: Prompt) -> &[SnapshotItem] {
        match prompt {
            Prompt::A => &self.prompt_a,
            Prompt::B => &self.prompt_b,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompt_a.is_empty() && self.prompt_b.is_empty()
    }

    pub fn total(&self, prompt: Prompt) -> u64 {
        self.items(prompt).iter().map(|item| item.count).sum()
    }

    pub fn is_reset(&self) -> bool {
        self.meta.reason == SyncReason::Reset.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub connection_id: String,
}
