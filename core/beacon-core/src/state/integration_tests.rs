//! Integration coverage for writer → store → reader flows.

use chrono::{Duration, Utc};
use tempfile::tempdir;

use super::liveness::fake::FakeProbe;
use super::liveness::{LivenessOracle, ProbeOutcome};
use super::store::SessionStore;
use super::transition::{next_status, HookEvent, NotificationKind};
use super::types::{SessionRecord, Status};
use crate::sessions::{arrange, context_summary, SessionReader};

/// What a writer does per event: read own key, transition, write back.
fn apply_event(store: &SessionStore, key: &str, fresh: &SessionRecord, event: HookEvent) {
    if !event.writes_record() {
        return;
    }
    let mut record = store
        .get(key)
        .unwrap()
        .unwrap_or_else(|| fresh.clone());
    record.status = next_status(event).apply(record.status);
    record.last_activity = Utc::now();
    store.put(key, &record).unwrap();
}

fn status_of(store: &SessionStore, key: &str) -> Option<Status> {
    store.get(key).unwrap().map(|r| r.status)
}

#[test]
fn test_full_session_lifecycle() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path());
    let mut fresh = SessionRecord::new("sess-1", "/project", "main", Utc::now());
    fresh.attach_pid(4000, Some(1000.0));

    apply_event(&store, "4000", &fresh, HookEvent::SessionStart);
    assert_eq!(status_of(&store, "4000"), Some(Status::Idle));

    apply_event(&store, "4000", &fresh, HookEvent::UserPromptSubmit);
    apply_event(&store, "4000", &fresh, HookEvent::PreToolUse);
    apply_event(&store, "4000", &fresh, HookEvent::PostToolUse);
    assert_eq!(status_of(&store, "4000"), Some(Status::Working));

    apply_event(&store, "4000", &fresh, HookEvent::PreCompact);
    assert_eq!(status_of(&store, "4000"), Some(Status::Compacting));

    apply_event(&store, "4000", &fresh, HookEvent::Stop);
    apply_event(
        &store,
        "4000",
        &fresh,
        HookEvent::Notification(NotificationKind::Idle),
    );
    assert_eq!(status_of(&store, "4000"), Some(Status::WaitingInput));

    // SessionEnd writes nothing; the record stays until pruned.
    apply_event(&store, "4000", &fresh, HookEvent::SessionEnd);
    assert_eq!(status_of(&store, "4000"), Some(Status::WaitingInput));
}

#[test]
fn test_permission_then_late_notification() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path());
    let fresh = SessionRecord::new("sess-2", "/project", "main", Utc::now());

    apply_event(&store, "sess-2", &fresh, HookEvent::UserPromptSubmit);
    apply_event(&store, "sess-2", &fresh, HookEvent::PermissionRequest);
    assert_eq!(status_of(&store, "sess-2"), Some(Status::WaitingPermission));

    apply_event(&store, "sess-2", &fresh, HookEvent::PostToolUse);
    apply_event(
        &store,
        "sess-2",
        &fresh,
        HookEvent::Notification(NotificationKind::Permission),
    );
    assert_eq!(status_of(&store, "sess-2"), Some(Status::Working));
}

#[test]
fn test_reader_filters_dead_and_recycled() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path());
    let now = Utc::now();

    let mut alive = SessionRecord::new("alive", "/a", "main", now);
    alive.attach_pid(100, Some(1000.0));
    alive.status = Status::Working;
    store.put("100", &alive).unwrap();

    let mut recycled = SessionRecord::new("recycled", "/b", "main", now);
    recycled.attach_pid(500, Some(1000.0));
    store.put("500", &recycled).unwrap();

    let mut gone = SessionRecord::new("gone", "/c", "main", now);
    gone.attach_pid(600, None);
    store.put("600", &gone).unwrap();

    let mut orphan = SessionRecord::new("orphan", "/d", "main", now);
    orphan.last_activity = now - Duration::hours(5);
    store.put("orphan", &orphan).unwrap();

    let probe = FakeProbe::default()
        .with(100, ProbeOutcome::Exists, Some(1000.4))
        .with(500, ProbeOutcome::Exists, Some(1050.0));
    let reader = SessionReader::new(store, LivenessOracle::new(probe));

    let live = reader.load_at(now);
    let ids: Vec<&str> = live.iter().map(|r| r.session_id.as_str()).collect();
    assert_eq!(ids, vec!["alive"]);
}

#[test]
fn test_corrupt_sibling_does_not_block_load() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path());
    let now = Utc::now();

    for (key, status) in [("a", Status::Idle), ("b", Status::WaitingPermission)] {
        let mut record = SessionRecord::new(key, "/p", "main", now);
        record.status = status;
        store.put(key, &record).unwrap();
    }
    std::fs::write(temp.path().join("broken.json"), "{\"session_id\": ").unwrap();

    let reader = SessionReader::new(store, LivenessOracle::new(FakeProbe::default()));
    let ids: Vec<String> = reader.load_at(now).into_iter().map(|r| r.session_id).collect();
    assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
}

#[test]
fn test_reader_never_sees_partial_write() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path());
    let mut record = SessionRecord::new("s", "/p", "main", Utc::now());
    record.last_prompt = Some("x".repeat(64 * 1024));
    store.put("1", &record).unwrap();

    let mut updated = record.clone();
    updated.status = Status::Working;
    let staged = store.stage("1", &updated).unwrap();

    // Rename deliberately held back: the final path still has the old, complete record.
    let final_bytes = std::fs::read(staged.target()).unwrap();
    assert!(!final_bytes.is_empty());
    let on_disk = SessionRecord::from_json(std::str::from_utf8(&final_bytes).unwrap()).unwrap();
    assert_eq!(on_disk.status, Status::Idle);
    assert_eq!(store.list().len(), 1);

    staged.commit().unwrap();
    assert_eq!(status_of(&store, "1"), Some(Status::Working));
}

#[test]
fn test_unknown_status_from_newer_writer_is_grouped() {
    let temp = tempdir().unwrap();
    let now = Utc::now();
    let json = format!(
        r#"{{
            "session_id": "future",
            "project_path": "/p",
            "project_name": "p",
            "branch": "main",
            "status": "waiting_for_review",
            "last_prompt": "ship it",
            "last_activity": "{ts}",
            "started_at": "{ts}"
        }}"#,
        ts = now.to_rfc3339()
    );
    std::fs::write(temp.path().join("future.json"), json).unwrap();

    let store = SessionStore::new(temp.path());
    for (key, status) in [("w", Status::Working), ("i", Status::Idle)] {
        let mut record = SessionRecord::new(key, "/p", "main", now);
        record.status = status;
        store.put(key, &record).unwrap();
    }

    let reader = SessionReader::new(store, LivenessOracle::new(FakeProbe::default()));
    let live = reader.load_at(now);
    assert_eq!(live[0].status, Status::NeedsAttention);
    assert_eq!(context_summary(&live[0]).as_deref(), Some("\"ship it\""));
    assert!(arrange(&live).is_sectioned());
}

#[test]
fn test_session_disappears_once_process_exits() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path());
    let now = Utc::now();

    let mut record = SessionRecord::new("short-lived", "/p", "main", now);
    record.attach_pid(700, Some(10.0));
    record.status = Status::Working;
    store.put("700", &record).unwrap();

    let probe = FakeProbe::default().with(700, ProbeOutcome::Exists, Some(10.0));
    let oracle = LivenessOracle::new(probe);
    assert!(oracle.is_alive_at(&record, now));

    oracle.probe().kill(700);
    let reader = SessionReader::new(store, oracle);
    assert!(reader.load_at(now).is_empty());
}
