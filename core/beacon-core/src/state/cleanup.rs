//! Background pruning of dead and superseded records.
//!
//! Readers already filter dead records, so none of this is needed for
//! correctness. Every operation is delete-if-condition and treats a record
//! that is already gone as success, so concurrent pruners are harmless.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::liveness::{LivenessOracle, ProcessProbe};
use super::store::SessionStore;
use super::types::SessionRecord;

/// Results from a pruning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneStats {
    /// Records deleted by this pass.
    pub removed: u32,
    /// Records left in place.
    pub kept: u32,
    /// Deletions that failed for a reason other than "already gone".
    pub errors: Vec<String>,
}

impl PruneStats {
    fn remove(&mut self, store: &SessionStore, key: &str, reason: &str) {
        match store.remove(key) {
            Ok(true) => {
                tracing::debug!(key, reason, "Removed session record");
                self.removed += 1;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to remove session record");
                self.errors.push(format!("{key}: {err}"));
            }
        }
    }
}

fn prune_where<F>(store: &SessionStore, reason: &str, mut should_remove: F) -> PruneStats
where
    F: FnMut(&str, &SessionRecord) -> bool,
{
    let mut stats = PruneStats::default();
    for (key, record) in store.list() {
        if should_remove(&key, &record) {
            stats.remove(store, &key, reason);
        } else {
            stats.kept += 1;
        }
    }
    stats
}

/// Deletes every record the oracle judges dead.
pub fn prune_dead<P: ProcessProbe>(store: &SessionStore, oracle: &LivenessOracle<P>) -> PruneStats {
    prune_dead_at(store, oracle, Utc::now())
}

pub fn prune_dead_at<P: ProcessProbe>(
    store: &SessionStore,
    oracle: &LivenessOracle<P>,
    now: DateTime<Utc>,
) -> PruneStats {
    prune_where(store, "dead", |_, record| !oracle.is_alive_at(record, now))
}

/// Deletes records whose `last_activity` is older than `max_age`, alive or not.
pub fn remove_stale(store: &SessionStore, max_age: Duration, now: DateTime<Utc>) -> PruneStats {
    prune_where(store, "stale", |_, record| {
        now.signed_duration_since(record.last_activity)
            .to_std()
            .is_ok_and(|age| age > max_age)
    })
}

/// Deletes other records carrying `session_id` (left behind under an older key).
pub fn remove_superseded(store: &SessionStore, session_id: &str, keep_key: &str) -> PruneStats {
    prune_where(store, "superseded", |key, record| {
        key != keep_key && record.session_id == session_id
    })
}

/// Deletes dead records for `project_path`, except the one at `keep_key`.
pub fn prune_project<P: ProcessProbe>(
    store: &SessionStore,
    oracle: &LivenessOracle<P>,
    project_path: &str,
    keep_key: &str,
    now: DateTime<Utc>,
) -> PruneStats {
    prune_where(store, "dead-in-project", |key, record| {
        key != keep_key && record.project_path == project_path && !oracle.is_alive_at(record, now)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::liveness::fake::FakeProbe;
    use crate::state::liveness::ProbeOutcome;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    fn put(store: &SessionStore, key: &str, session_id: &str, project: &str, pid: Option<u32>) {
        let mut record = SessionRecord::new(session_id, project, "main", Utc::now());
        record.pid = pid;
        store.put(key, &record).unwrap();
    }

    #[test]
    fn test_prune_dead_removes_only_dead() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path());
        put(&store, "100", "alive", "/a", Some(100));
        put(&store, "200", "dead", "/a", Some(200));

        let probe = FakeProbe::default().with(100, ProbeOutcome::Exists, None);
        let oracle = LivenessOracle::new(probe);

        let stats = prune_dead(&store, &oracle);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.kept, 1);
        assert!(stats.errors.is_empty());
        assert!(store.get("100").unwrap().is_some());
        assert!(store.get("200").unwrap().is_none());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path());
        put(&store, "200", "dead", "/a", Some(200));
        let oracle = LivenessOracle::new(FakeProbe::default());

        assert_eq!(prune_dead(&store, &oracle).removed, 1);
        assert_eq!(prune_dead(&store, &oracle), PruneStats::default());
    }

    #[test]
    fn test_remove_stale_by_age() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path());
        let now = Utc::now();

        let mut old = SessionRecord::new("old", "/a", "main", now);
        old.last_activity = now - ChronoDuration::hours(25);
        store.put("old", &old).unwrap();
        put(&store, "new", "new", "/a", None);

        let stats = remove_stale(&store, Duration::from_secs(24 * 3600), now);
        assert_eq!(stats.removed, 1);
        assert!(store.get("new").unwrap().is_some());
    }

    #[test]
    fn test_remove_superseded_keeps_current_key() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path());
        put(&store, "sess-1", "sess-1", "/a", None);
        put(&store, "300", "sess-1", "/a", Some(300));
        put(&store, "301", "sess-2", "/a", Some(301));

        let stats = remove_superseded(&store, "sess-1", "300");
        assert_eq!(stats.removed, 1);
        assert!(store.get("sess-1").unwrap().is_none());
        assert!(store.get("300").unwrap().is_some());
        assert!(store.get("301").unwrap().is_some());
    }

    #[test]
    fn test_prune_project_spares_other_projects_and_self() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path());
        put(&store, "1", "a", "/proj", Some(1));
        put(&store, "2", "b", "/proj", Some(2));
        put(&store, "3", "c", "/other", Some(3));

        let oracle = LivenessOracle::new(FakeProbe::default());
        let stats = prune_project(&store, &oracle, "/proj", "1", Utc::now());

        assert_eq!(stats.removed, 1);
        assert!(store.get("1").unwrap().is_some());
        assert!(store.get("2").unwrap().is_none());
        assert!(store.get("3").unwrap().is_some());
    }
}
