//! Plain-text rendering of the live session list.

use std::fmt::Write;

use beacon_core::{arrange, context_summary, format_relative_time, SessionDisplay, SessionRecord, Status};
use chrono::{DateTime, Utc};

const NO_SESSIONS: &str = "No active sessions";

fn marker(status: Status) -> char {
    match status {
        Status::WaitingPermission | Status::WaitingInput | Status::NeedsAttention => '!',
        Status::Working | Status::Compacting => '*',
        Status::Idle => '-',
    }
}

fn push_record(out: &mut String, record: &SessionRecord, now: DateTime<Utc>, indent: &str) {
    let _ = writeln!(
        out,
        "{indent}{} {:<18} {} ({})  {}  [{}]",
        marker(record.status),
        record.status.label(),
        record.project_name,
        record.branch,
        format_relative_time(record.last_activity, now),
        short_id(&record.session_id),
    );
    if let Some(summary) = context_summary(record) {
        let _ = writeln!(out, "{indent}    {summary}");
    }
}

fn short_id(session_id: &str) -> &str {
    match session_id.char_indices().nth(8) {
        Some((idx, _)) => &session_id[..idx],
        None => session_id,
    }
}

/// Renders `records` (already in display order) as the `list` output.
pub fn render_sessions(records: &[SessionRecord], now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return format!("{NO_SESSIONS}\n");
    }

    let mut out = String::new();
    match arrange(records) {
        SessionDisplay::Flat(ordered) => {
            for record in ordered {
                push_record(&mut out, record, now, "");
            }
        }
        SessionDisplay::Sectioned(sections) => {
            for (index, (group, members)) in sections.iter().enumerate() {
                if index > 0 {
                    out.push('\n');
                }
                let _ = writeln!(out, "{} ({})", group.title(), members.len());
                for record in members {
                    push_record(&mut out, record, now, "  ");
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, project: &str, status: Status, now: DateTime<Utc>) -> SessionRecord {
        let mut record = SessionRecord::new(id, format!("/work/{project}"), "main", now);
        record.status = status;
        record
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(render_sessions(&[], Utc::now()), "No active sessions\n");
    }

    #[test]
    fn test_flat_list_with_summary() {
        let now = Utc::now();
        let mut working = record("0123456789abcdef", "api", Status::Working, now - Duration::seconds(12));
        working.last_tool = Some("Bash".to_string());
        working.last_tool_detail = Some("cargo test".to_string());

        let out = render_sessions(&[working], now);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* Working"));
        assert!(lines[0].contains("api (main)"));
        assert!(lines[0].contains("12s ago"));
        assert!(lines[0].ends_with("[01234567]"));
        assert_eq!(lines[1], "    Running: cargo test");
    }

    #[test]
    fn test_sectioned_list() {
        let now = Utc::now();
        let records = vec![
            record("a", "web", Status::WaitingPermission, now),
            record("b", "api", Status::Working, now),
            record("c", "cli", Status::Idle, now),
        ];

        let out = render_sessions(&records, now);
        assert!(out.starts_with("Needs Attention (1)\n  ! Needs permission"));
        assert!(out.contains("\n\nActive (1)\n  * Working"));
        assert!(out.contains("\n\nIdle (1)\n  - Idle"));
        assert!(out.contains("    Permission needed"));
    }

    #[test]
    fn test_short_id_keeps_short_ids() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("abcdefghij"), "abcdefgh");
    }
}
