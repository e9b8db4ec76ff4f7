//! Public-API checks for the session store under concurrent access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use beacon_core::{LivenessOracle, SessionReader, SessionRecord, SessionStore, Status, StorageConfig};
use chrono::Utc;
use tempfile::tempdir;

fn big_record(session_id: &str, round: usize) -> SessionRecord {
    let mut record = SessionRecord::new(session_id, "/tmp/project", "main", Utc::now());
    record.status = if round % 2 == 0 {
        Status::Working
    } else {
        Status::Idle
    };
    record.last_prompt = Some(format!("{round}:{}", "p".repeat(32 * 1024)));
    record
}

#[test]
fn reader_never_observes_truncated_record() {
    let temp = tempdir().unwrap();
    let store = SessionStore::new(temp.path().join("sessions"));
    store.put("1", &big_record("s", 0)).unwrap();
    let final_path = store.path_for("1").unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader_done = done.clone();
    let reader = thread::spawn(move || {
        let mut reads = 0usize;
        loop {
            let finished = reader_done.load(Ordering::SeqCst);
            let content = std::fs::read_to_string(&final_path).unwrap();
            let record = SessionRecord::from_json(&content)
                .expect("final path must always hold a complete record");
            assert_eq!(record.session_id, "s");
            reads += 1;
            if finished {
                break;
            }
        }
        reads
    });

    for round in 1..200 {
        store.put("1", &big_record("s", round)).unwrap();
    }
    done.store(true, Ordering::SeqCst);

    assert!(reader.join().unwrap() > 0);
    assert_eq!(store.list().len(), 1);
}

#[test]
fn concurrent_writers_on_distinct_keys() {
    let temp = tempdir().unwrap();
    let storage = StorageConfig::with_root(temp.path().to_path_buf());
    let store = SessionStore::from_storage(&storage);

    let handles: Vec<_> = (0..8)
        .map(|writer| {
            let store = store.clone();
            thread::spawn(move || {
                let id = format!("writer-{writer}");
                for round in 0..25 {
                    store.put(&id, &big_record(&id, round)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut keys: Vec<String> = store.list().into_iter().map(|(k, _)| k).collect();
    keys.sort();
    assert_eq!(keys.len(), 8);
    assert_eq!(keys[0], "writer-0");

    let leftovers = std::fs::read_dir(storage.sessions_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    let reader = SessionReader::new(store, LivenessOracle::system());
    assert_eq!(reader.load().len(), 8);
}

#[test]
fn missing_store_reads_as_empty() {
    let temp = tempdir().unwrap();
    let storage = StorageConfig::with_root(temp.path().join("never-created"));
    let reader = SessionReader::new(
        SessionStore::from_storage(&storage),
        LivenessOracle::system(),
    );
    assert!(reader.load().is_empty());
}
