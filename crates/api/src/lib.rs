//! Shared wire types for the watchpost monitoring API.
//!
//! This crate is the **single source of truth** for everything that crosses
//! the HTTP boundary: the per-entity records served under `/ui/`, the error
//! taxonomy, and the [`EntityApi`] trait the sync layer is written against.
//! It does no I/O of its own.

use serde::{Deserialize, Serialize};

pub mod boundary;
pub mod error;

pub use boundary::EntityApi;
pub use error::ApiError;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque identifier of a monitored process.
///
/// The server mints these (one UUID per agent launch); the client never
/// inspects the contents, only uses them as stable keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ─── Per-entity records ──────────────────────────────────────────────────────

/// Static facts about a process, recorded once when its agent starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introduction {
    pub uuid: EntityId,
    pub host: String,
    pub ip: String,
    pub pid: u32,
    pub parent_pid: u32,
    pub user: String,
    pub name: String,
    /// Full command line, already joined into one string by the agent.
    pub args: String,
    /// Epoch milliseconds.
    pub created_time: u64,
    /// Operator-assigned label. Not part of the agent handshake; absent
    /// unless the server carries one.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Introduction {
    /// Human-facing label: the display name when assigned, otherwise the
    /// process name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Current liveness of a process. `exited` can flip in either direction
/// (a restart action brings an entity back), so the client always reflects
/// the latest value rather than latching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessStatus {
    pub exited: bool,
}

/// One resource usage sample. `time` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub time: u64,
}

/// One captured output line. `timestamp` is epoch milliseconds;
/// `error` marks stderr origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub timestamp: u64,
    pub message: String,
    pub error: bool,
}

/// Terminal record of a process. Exists server-side only once the entity
/// has exited; `messages` carries the final stderr tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub exit_code: i32,
    /// Epoch milliseconds.
    pub time: u64,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// Remote control verbs accepted by `PUT /ui/action/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Restart,
    Exit,
}

impl EntityAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Restart => "restart",
            Self::Exit => "exit",
        }
    }
}

impl std::fmt::Display for EntityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Cursor support ──────────────────────────────────────────────────────────

/// Anything carrying an epoch-millisecond timestamp the incremental cursor
/// can advance over.
pub trait Timestamped {
    fn timestamp_ms(&self) -> u64;
}

impl Timestamped for MetricSample {
    fn timestamp_ms(&self) -> u64 {
        self.time
    }
}

impl Timestamped for MessageRecord {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp
    }
}
