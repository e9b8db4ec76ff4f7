//! Keeping a reader's view fresh.
//!
//! Two interchangeable mechanisms, both bounded in staleness:
//!
//! - [`SessionPoller`]: rescans on a fixed interval from a background thread.
//! - [`SessionWatcher`]: filesystem notifications on the store directory; the
//!   caller reloads when [`SessionWatcher::wait_for_change`] says so.
//!
//! Neither writes to the store, so stopping either one at any point is safe.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{BeaconError, Result};
use crate::sessions::SessionReader;
use crate::state::{ProcessProbe, SessionRecord, SessionStore};

// ─────────────────────────────────────────────────────────────────────────────
// Polling
// ─────────────────────────────────────────────────────────────────────────────

/// Background scan loop.
///
/// The first scan is always delivered; later scans only when the live set
/// differs from the last delivery. Dropping the poller (or calling
/// [`SessionPoller::stop`]) closes the stop channel, which wakes the thread
/// out of its wait immediately.
pub struct SessionPoller {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SessionPoller {
    pub fn spawn<P, F>(reader: SessionReader<P>, interval: Duration, mut on_update: F) -> Self
    where
        P: ProcessProbe + Send + 'static,
        F: FnMut(Vec<SessionRecord>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let mut last: Option<Vec<SessionRecord>> = None;
            loop {
                let sessions = reader.load();
                if last.as_ref() != Some(&sessions) {
                    on_update(sessions.clone());
                    last = Some(sessions);
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Session poller stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stops scheduling scans and waits for an in-flight scan to finish.
    pub fn stop(mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Session poller thread panicked");
            }
        }
    }
}

impl Drop for SessionPoller {
    fn drop(&mut self) {
        self.stop_tx.take();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Watching
// ─────────────────────────────────────────────────────────────────────────────

/// Create, modify, and remove events count unless every path is a temp file.
pub fn is_relevant_event(event: &Event) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches && event.paths.iter().any(|path| !is_temp_path(path))
}

fn is_temp_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".tmp"))
}

fn watch_error(context: &str, err: notify::Error) -> BeaconError {
    BeaconError::Io {
        context: context.to_string(),
        source: std::io::Error::other(err.to_string()),
    }
}

pub struct SessionWatcher {
    // Kept alive to maintain the watch.
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
}

impl SessionWatcher {
    /// Watches the store directory, creating it first if needed.
    pub fn new(store: &SessionStore) -> Result<Self> {
        store.ensure_dir()?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver may be gone during shutdown.
            let _ = tx.send(res);
        })
        .map_err(|e| watch_error("creating session watcher", e))?;

        watcher
            .watch(store.dir(), RecursiveMode::NonRecursive)
            .map_err(|e| watch_error("watching session directory", e))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Drains pending events without blocking; true if any was relevant.
    pub fn drain_changes(&self) -> bool {
        let mut changed = false;
        loop {
            match self.receiver.try_recv() {
                Ok(Ok(event)) => changed |= is_relevant_event(&event),
                Ok(Err(err)) => tracing::warn!(error = %err, "Session watcher error"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Session watcher channel disconnected");
                    break;
                }
            }
        }
        changed
    }

    /// Blocks up to `timeout` for a relevant event, then drains the backlog.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(Ok(event)) if is_relevant_event(&event) => {
                    self.drain_changes();
                    return true;
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!(error = %err, "Session watcher error"),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::liveness::fake::FakeProbe;
    use crate::state::{LivenessOracle, Status};
    use chrono::Utc;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_relevant_events() {
        assert!(is_relevant_event(&event(
            EventKind::Create(CreateKind::File),
            &["/s/1.json"]
        )));
        assert!(is_relevant_event(&event(
            EventKind::Remove(RemoveKind::File),
            &["/s/1.json"]
        )));
        assert!(is_relevant_event(&event(
            EventKind::Modify(ModifyKind::Any),
            &["/s/1.json.abc.tmp", "/s/1.json"]
        )));
    }

    #[test]
    fn test_temp_only_and_access_events_ignored() {
        assert!(!is_relevant_event(&event(
            EventKind::Create(CreateKind::File),
            &["/s/1.json.abc.tmp"]
        )));
        assert!(!is_relevant_event(&event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/s/1.json"]
        )));
    }

    #[test]
    fn test_poller_delivers_and_stops() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path());
        let mut record = SessionRecord::new("s1", "/p", "main", Utc::now());
        record.status = Status::Working;
        store.put("s1", &record).unwrap();

        let reader = SessionReader::new(store, LivenessOracle::new(FakeProbe::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let poller = SessionPoller::spawn(reader, Duration::from_secs(3600), move |sessions| {
            sink.lock().unwrap().push(sessions.len());
        });

        let start = Instant::now();
        while seen.lock().unwrap().is_empty() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(10));
        }

        // An hour-long interval must not delay shutdown.
        let stop_start = Instant::now();
        poller.stop();
        assert!(stop_start.elapsed() < Duration::from_secs(2));
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_watcher_sees_store_write() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path().join("sessions"));
        let watcher = SessionWatcher::new(&store).unwrap();

        let record = SessionRecord::new("s1", "/p", "main", Utc::now());
        store.put("s1", &record).unwrap();

        assert!(watcher.wait_for_change(Duration::from_secs(5)));
    }
}
