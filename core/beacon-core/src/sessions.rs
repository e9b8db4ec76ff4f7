//! Reader pipeline: load, order, group, and summarize live sessions.
//!
//! Every UI client goes through [`SessionReader::load`] so they all agree on
//! which sessions exist and in what order. The pipeline is stateless; each
//! call is one directory scan plus one liveness check per record.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::state::{LivenessOracle, ProcessProbe, SessionRecord, SessionStore, Status, SystemProbe};

/// Quoted prompts are cut to this many characters (ellipsis included).
pub const PROMPT_SUMMARY_LEN: usize = 36;
/// Tool details are cut to this many characters (ellipsis included).
pub const TOOL_DETAIL_LEN: usize = 30;
/// Permission messages are cut to this many characters (ellipsis included).
pub const PERMISSION_MESSAGE_LEN: usize = 38;

/// Live sessions need at least this many records before sections are shown.
const SECTIONED_MIN_RECORDS: usize = 3;
const SECTIONED_MIN_GROUPS: usize = 2;

pub struct SessionReader<P = SystemProbe> {
    store: SessionStore,
    oracle: LivenessOracle<P>,
}

impl<P: ProcessProbe> SessionReader<P> {
    pub fn new(store: SessionStore, oracle: LivenessOracle<P>) -> Self {
        Self { store, oracle }
    }

    /// Live records in display order.
    pub fn load(&self) -> Vec<SessionRecord> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> = self
            .store
            .list()
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| self.oracle.is_alive_at(record, now))
            .collect();
        sort_sessions(&mut records);
        records
    }
}

/// Orders by status priority, then most recent activity first.
pub fn sort_sessions(records: &mut [SessionRecord]) {
    records.sort_by(display_order);
}

fn display_order(a: &SessionRecord, b: &SessionRecord) -> Ordering {
    a.status
        .sort_priority()
        .cmp(&b.status.sort_priority())
        .then_with(|| b.last_activity.cmp(&a.last_activity))
}

// ─────────────────────────────────────────────────────────────────────────────
// Grouping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionGroup {
    NeedsAttention,
    Active,
    Idle,
}

impl SessionGroup {
    /// Fixed display order.
    pub const ORDER: [SessionGroup; 3] = [
        SessionGroup::NeedsAttention,
        SessionGroup::Active,
        SessionGroup::Idle,
    ];

    pub fn of(status: Status) -> Self {
        match status {
            Status::WaitingPermission | Status::WaitingInput | Status::NeedsAttention => {
                SessionGroup::NeedsAttention
            }
            Status::Working | Status::Compacting => SessionGroup::Active,
            Status::Idle => SessionGroup::Idle,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SessionGroup::NeedsAttention => "Needs Attention",
            SessionGroup::Active => "Active",
            SessionGroup::Idle => "Idle",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SessionDisplay<'a> {
    Flat(Vec<&'a SessionRecord>),
    Sectioned(Vec<(SessionGroup, Vec<&'a SessionRecord>)>),
}

impl SessionDisplay<'_> {
    pub fn is_sectioned(&self) -> bool {
        matches!(self, SessionDisplay::Sectioned(_))
    }
}

/// Chooses flat or sectioned presentation for a set of live records.
pub fn arrange(records: &[SessionRecord]) -> SessionDisplay<'_> {
    let mut ordered: Vec<&SessionRecord> = records.iter().collect();
    ordered.sort_by(|a, b| display_order(a, b));

    let sections: Vec<(SessionGroup, Vec<&SessionRecord>)> = SessionGroup::ORDER
        .iter()
        .map(|group| {
            let members = ordered
                .iter()
                .copied()
                .filter(|r| SessionGroup::of(r.status) == *group)
                .collect::<Vec<_>>();
            (*group, members)
        })
        .filter(|(_, members)| !members.is_empty())
        .collect();

    if ordered.len() >= SECTIONED_MIN_RECORDS && sections.len() >= SECTIONED_MIN_GROUPS {
        SessionDisplay::Sectioned(sections)
    } else {
        SessionDisplay::Flat(ordered)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Summaries
// ─────────────────────────────────────────────────────────────────────────────

/// One-line context for a record, or `None` when there is nothing to say.
pub fn context_summary(record: &SessionRecord) -> Option<String> {
    let quoted_prompt = || {
        record
            .last_prompt
            .as_deref()
            .map(|p| format!("\"{}\"", truncate(p, PROMPT_SUMMARY_LEN)))
    };

    match record.status {
        Status::Idle => None,
        Status::Compacting => Some("Compacting context...".to_string()),
        Status::WaitingPermission => Some(
            record
                .notification_message
                .as_deref()
                .map_or("Permission needed".to_string(), |msg| {
                    truncate(msg, PERMISSION_MESSAGE_LEN)
                }),
        ),
        Status::WaitingInput | Status::NeedsAttention => quoted_prompt(),
        Status::Working => match record.last_tool.as_deref() {
            Some(tool) => Some(format_tool_display(tool, record.last_tool_detail.as_deref())),
            None => quoted_prompt(),
        },
    }
}

/// Short phrase describing a tool invocation.
///
/// File tools show only the final path segment; everything else shows the
/// detail cut to [`TOOL_DETAIL_LEN`].
pub fn format_tool_display(tool: &str, detail: Option<&str>) -> String {
    let Some(detail) = detail else {
        return format!("{tool}...");
    };
    let short = || truncate(detail, TOOL_DETAIL_LEN);

    match tool {
        "Edit" | "Write" | "Read" => {
            let filename = Path::new(detail)
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or(detail);
            let action = match tool {
                "Edit" => "Editing",
                "Write" => "Writing",
                _ => "Reading",
            };
            format!("{action} {filename}")
        }
        "Bash" => format!("Running: {}", short()),
        "Grep" => format!("Searching: {}", short()),
        "Glob" => format!("Finding: {}", short()),
        "WebFetch" => format!("Fetching: {}", short()),
        "WebSearch" => format!("Searching: {}", short()),
        "Task" => format!("Task: {}", short()),
        other => format!("{other}: {}", short()),
    }
}

/// Collapses whitespace and cuts to `max_len` characters, ending in "...".
pub fn truncate(text: &str, max_len: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_len {
        normalized
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = normalized.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// "12s ago", "5m ago", "2h ago", "3d ago". Future timestamps are "just now".
pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    if elapsed < chrono::Duration::zero() {
        return "just now".to_string();
    }
    match elapsed.num_seconds() {
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86400),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of resolving a user-typed session id prefix.
#[derive(Debug, PartialEq)]
pub enum PrefixMatch {
    None,
    One { key: String, record: SessionRecord },
    Ambiguous(Vec<String>),
}

pub fn match_session_prefix(entries: Vec<(String, SessionRecord)>, prefix: &str) -> PrefixMatch {
    let mut matches: Vec<(String, SessionRecord)> = entries
        .into_iter()
        .filter(|(_, record)| record.session_id.starts_with(prefix))
        .collect();

    match matches.len() {
        0 => PrefixMatch::None,
        1 => {
            let (key, record) = matches.remove(0);
            PrefixMatch::One { key, record }
        }
        _ => PrefixMatch::Ambiguous(matches.into_iter().map(|(_, r)| r.session_id).collect()),
    }
}
