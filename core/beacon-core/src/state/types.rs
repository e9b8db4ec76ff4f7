//! Session record codec.
//!
//! One [`SessionRecord`] is serialized as JSON into one file per identity key.
//! Field names are snake_case. Optional strings are omitted when absent so an
//! empty string and a missing value stay distinguishable on disk.
//!
//! Timestamps are RFC 3339. Writers emit sub-second precision; decoders accept
//! it with or without.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BeaconError, Result};

// -----------------------------------------------------------------------------
// Status
// -----------------------------------------------------------------------------

/// What a session is doing right now.
///
/// `NeedsAttention` is never produced by a transition. It only appears when a
/// stored status string is unknown to this build and looks like a wait state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Idle,
    Working,
    WaitingInput,
    WaitingPermission,
    Compacting,
    NeedsAttention,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Idle,
        Status::Working,
        Status::WaitingInput,
        Status::WaitingPermission,
        Status::Compacting,
        Status::NeedsAttention,
    ];

    /// Wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Working => "working",
            Status::WaitingInput => "waiting_input",
            Status::WaitingPermission => "waiting_permission",
            Status::Compacting => "compacting",
            Status::NeedsAttention => "needs_attention",
        }
    }

    /// Decodes a stored status string. Never fails.
    ///
    /// Unknown values containing "waiting" become `NeedsAttention`; any other
    /// unknown value becomes `Working`.
    pub fn parse(raw: &str) -> Status {
        match raw {
            "idle" => Status::Idle,
            "working" => Status::Working,
            "waiting_input" => Status::WaitingInput,
            "waiting_permission" => Status::WaitingPermission,
            "compacting" => Status::Compacting,
            "needs_attention" => Status::NeedsAttention,
            other if other.to_ascii_lowercase().contains("waiting") => Status::NeedsAttention,
            _ => Status::Working,
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::Working => "Working",
            Status::WaitingInput => "Waiting for input",
            Status::WaitingPermission => "Needs permission",
            Status::Compacting => "Compacting",
            Status::NeedsAttention => "Needs attention",
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            Status::WaitingPermission | Status::WaitingInput | Status::NeedsAttention
        )
    }

    /// Sort rank; lower sorts first.
    pub fn sort_priority(&self) -> u8 {
        match self {
            Status::WaitingPermission => 0,
            Status::WaitingInput | Status::NeedsAttention => 1,
            Status::Working => 2,
            Status::Compacting => 3,
            Status::Idle => 4,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Status::parse(&raw))
    }
}

// -----------------------------------------------------------------------------
// Record
// -----------------------------------------------------------------------------

/// Hosting terminal or editor. Opaque to the store; read by the focus seam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInfo {
    /// Program name as reported by the environment (e.g. "iTerm.app", "vscode").
    #[serde(default)]
    pub program: String,
    /// Terminal-specific session id (iTerm2, Kitty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub project_path: String,
    pub project_name: String,
    pub branch: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prompt: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Start time (Unix seconds) of `pid`, captured when the pid was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_file: Option<String>,
}

impl SessionRecord {
    /// Fresh `Idle` record stamped with `now`.
    pub fn new(
        session_id: impl Into<String>,
        project_path: impl Into<String>,
        branch: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let project_path = project_path.into();
        Self {
            session_id: session_id.into(),
            project_name: extract_project_name(&project_path),
            project_path,
            branch: branch.into(),
            status: Status::Idle,
            last_prompt: None,
            last_activity: now,
            started_at: now,
            terminal: None,
            pid: None,
            pid_start_time: None,
            last_tool: None,
            last_tool_detail: None,
            notification_message: None,
            session_name: None,
            source: None,
            workspace_file: None,
        }
    }

    /// Storage key: the pid when known, else the session id.
    pub fn identity_key(&self) -> String {
        match self.pid {
            Some(pid) => pid.to_string(),
            None => self.session_id.clone(),
        }
    }

    /// Records the hosting pid and its start time.
    ///
    /// The start time is only taken together with a new pid; re-attaching the
    /// same pid leaves the original start time untouched.
    pub fn attach_pid(&mut self, pid: u32, start_time: Option<f64>) {
        if self.pid == Some(pid) {
            return;
        }
        self.pid = Some(pid);
        self.pid_start_time = start_time;
    }

    pub fn clear_tool(&mut self) {
        self.last_tool = None;
        self.last_tool_detail = None;
    }

    /// Clears tool and notification fields.
    pub fn clear_transient(&mut self) {
        self.clear_tool();
        self.notification_message = None;
    }

    /// Manual recovery for a record stuck in a wait state.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.status = Status::Idle;
        self.clear_transient();
        self.last_activity = now;
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| BeaconError::Json {
            context: format!("serializing session {}", self.session_id),
            source,
        })
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Last path segment of `path`, or "unknown" when there is none.
pub fn extract_project_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
