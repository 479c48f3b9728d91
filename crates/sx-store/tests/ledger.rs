use sx_store::{ProgressLedger, ProgressState};

#[test]
fn save_load_and_clear() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ProgressLedger::new(dir.path().join("precomputation_progress.json"));
    assert!(ledger.load().is_none());

    let state = ProgressState {
        completed: 300,
        success_count: 297,
        last_batch: 200,
        elapsed_time: 41.25,
        updated_at: None,
    };
    ledger.save(&state).expect("save");

    let loaded = ledger.load().expect("ledger present");
    assert_eq!(loaded.completed, 300);
    assert_eq!(loaded.success_count, 297);
    assert_eq!(loaded.last_batch, 200);
    assert_eq!(loaded.elapsed_time, 41.25);
    assert!(loaded.updated_at.is_some());

    ledger.clear().expect("clear");
    assert!(ledger.load().is_none());
    ledger.clear().expect("clearing twice is fine");
}

#[test]
fn corrupt_ledger_resets_progress() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("progress.json");
    std::fs::write(&path, "{ \"completed\": 12, ").expect("write");

    let ledger = ProgressLedger::new(path);
    assert!(ledger.load().is_none());

    // Still writable after a bad read.
    ledger.save(&ProgressState::default()).expect("save");
    assert_eq!(ledger.load().map(|s| s.completed), Some(0));
}
