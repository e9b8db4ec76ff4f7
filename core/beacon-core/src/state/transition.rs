//! Maps hook events to status transitions.
//!
//! The table ignores the current status. `NoOp` is not "transition to the same
//! status": it means the stored status is left exactly as it is.
//!
//! `Notification(permission)` is a `NoOp` on purpose. `PermissionRequest`
//! already set `WaitingPermission` when permission was needed; the matching
//! notification arrives seconds later on a separate path and would otherwise
//! overwrite a `Working` written by a quick `PostToolUse`.

use std::fmt;

use super::types::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Idle,
    Permission,
    Other,
}

impl NotificationKind {
    pub fn parse(notification_type: Option<&str>) -> Self {
        match notification_type {
            Some("idle_prompt") => NotificationKind::Idle,
            Some("permission_prompt") => NotificationKind::Permission,
            _ => NotificationKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Stop,
    Notification(NotificationKind),
    PermissionRequest,
    PreCompact,
    SessionEnd,
    Unknown,
}

impl HookEvent {
    pub const ALL: [HookEvent; 12] = [
        HookEvent::SessionStart,
        HookEvent::UserPromptSubmit,
        HookEvent::PreToolUse,
        HookEvent::PostToolUse,
        HookEvent::Stop,
        HookEvent::Notification(NotificationKind::Idle),
        HookEvent::Notification(NotificationKind::Permission),
        HookEvent::Notification(NotificationKind::Other),
        HookEvent::PermissionRequest,
        HookEvent::PreCompact,
        HookEvent::SessionEnd,
        HookEvent::Unknown,
    ];

    /// Parses a hook name; `notification_type` only matters for `Notification`.
    pub fn parse(hook_name: &str, notification_type: Option<&str>) -> Self {
        match hook_name {
            "SessionStart" => HookEvent::SessionStart,
            "UserPromptSubmit" => HookEvent::UserPromptSubmit,
            "PreToolUse" => HookEvent::PreToolUse,
            "PostToolUse" => HookEvent::PostToolUse,
            "Stop" => HookEvent::Stop,
            "Notification" => HookEvent::Notification(NotificationKind::parse(notification_type)),
            "PermissionRequest" => HookEvent::PermissionRequest,
            "PreCompact" => HookEvent::PreCompact,
            "SessionEnd" => HookEvent::SessionEnd,
            _ => HookEvent::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HookEvent::SessionStart => "SessionStart",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::Stop => "Stop",
            HookEvent::Notification(NotificationKind::Idle) => "Notification(idle)",
            HookEvent::Notification(NotificationKind::Permission) => "Notification(permission)",
            HookEvent::Notification(NotificationKind::Other) => "Notification(other)",
            HookEvent::PermissionRequest => "PermissionRequest",
            HookEvent::PreCompact => "PreCompact",
            HookEvent::SessionEnd => "SessionEnd",
            HookEvent::Unknown => "Unknown",
        }
    }

    /// Whether handling this event persists anything at all.
    pub fn writes_record(&self) -> bool {
        !matches!(self, HookEvent::SessionEnd | HookEvent::Unknown)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(Status),
    NoOp,
}

impl Transition {
    /// Status after applying this transition to `current`.
    pub fn apply(self, current: Status) -> Status {
        match self {
            Transition::To(next) => next,
            Transition::NoOp => current,
        }
    }

    pub fn is_noop(self) -> bool {
        matches!(self, Transition::NoOp)
    }
}

pub fn next_status(event: HookEvent) -> Transition {
    match event {
        HookEvent::SessionStart => Transition::To(Status::Idle),
        HookEvent::UserPromptSubmit | HookEvent::PreToolUse | HookEvent::PostToolUse => {
            Transition::To(Status::Working)
        }
        HookEvent::Stop => Transition::To(Status::Idle),
        HookEvent::Notification(NotificationKind::Idle) => Transition::To(Status::WaitingInput),
        HookEvent::PermissionRequest => Transition::To(Status::WaitingPermission),
        HookEvent::Notification(NotificationKind::Permission | NotificationKind::Other) => {
            Transition::NoOp
        }
        HookEvent::PreCompact => Transition::To(Status::Compacting),
        HookEvent::SessionEnd | HookEvent::Unknown => Transition::NoOp,
    }
}

/// Graphviz rendering of the transition table.
///
/// Every status gets an edge per event that lands on it; `NoOp` events are
/// listed in a note since they have no target.
pub fn dot_diagram() -> String {
    let mut out = String::from("digraph status {\n    rankdir=LR;\n    node [shape=box];\n");
    for status in Status::ALL {
        out.push_str(&format!("    {};\n", status.as_str()));
    }
    out.push_str("    any [shape=point];\n");

    let mut noops = Vec::new();
    for event in HookEvent::ALL {
        match next_status(event) {
            Transition::To(target) => {
                out.push_str(&format!(
                    "    any -> {} [label=\"{}\"];\n",
                    target.as_str(),
                    event.label()
                ));
            }
            Transition::NoOp => noops.push(event.label()),
        }
    }
    out.push_str(&format!(
        "    noop [shape=note, label=\"no change:\\n{}\"];\n",
        noops.join("\\n")
    ));
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        let cases = [
            ("SessionStart", None, Transition::To(Status::Idle)),
            ("UserPromptSubmit", None, Transition::To(Status::Working)),
            ("PreToolUse", None, Transition::To(Status::Working)),
            ("PostToolUse", None, Transition::To(Status::Working)),
            ("Stop", None, Transition::To(Status::Idle)),
            ("Notification", Some("idle_prompt"), Transition::To(Status::WaitingInput)),
            ("PermissionRequest", None, Transition::To(Status::WaitingPermission)),
            ("Notification", Some("permission_prompt"), Transition::NoOp),
            ("Notification", Some("auth_success"), Transition::NoOp),
            ("Notification", None, Transition::NoOp),
            ("PreCompact", None, Transition::To(Status::Compacting)),
            ("SessionEnd", None, Transition::NoOp),
            ("SubagentStop", None, Transition::NoOp),
        ];
        for (name, kind, expected) in cases {
            assert_eq!(
                next_status(HookEvent::parse(name, kind)),
                expected,
                "{name} / {kind:?}"
            );
        }
    }

    #[test]
    fn test_noop_events_never_change_status() {
        let noop_events = [
            HookEvent::Notification(NotificationKind::Permission),
            HookEvent::SessionEnd,
            HookEvent::Unknown,
        ];
        for event in noop_events {
            for current in Status::ALL {
                assert_eq!(next_status(event).apply(current), current);
            }
        }
    }

    #[test]
    fn test_needs_attention_is_never_a_target() {
        for event in HookEvent::ALL {
            assert_ne!(next_status(event), Transition::To(Status::NeedsAttention));
        }
    }

    #[test]
    fn test_late_permission_notification_keeps_working() {
        let mut status = Status::Idle;
        for event in [
            HookEvent::UserPromptSubmit,
            HookEvent::PermissionRequest,
            HookEvent::PostToolUse,
            HookEvent::Notification(NotificationKind::Permission),
        ] {
            status = next_status(event).apply(status);
        }
        assert_eq!(status, Status::Working);
    }

    #[test]
    fn test_writes_record() {
        assert!(HookEvent::Stop.writes_record());
        assert!(!HookEvent::SessionEnd.writes_record());
        assert!(!HookEvent::Unknown.writes_record());
    }

    #[test]
    fn test_dot_diagram_lists_edges_and_noops() {
        let dot = dot_diagram();
        assert!(dot.starts_with("digraph status {"));
        assert!(dot.contains("any -> waiting_permission [label=\"PermissionRequest\"]"));
        assert!(dot.contains("Notification(permission)"));
        assert!(!dot.contains("any -> needs_attention"));
    }
}
