mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TestBuilder, records, scheduler, store, test_config};
use serde_json::json;
use sx_artifacts::{ArtifactKind, BoundaryArtifact, DiagnosticsArtifact};
use sx_core::ConfigId;
use sx_pipeline::{FixedMemoryGauge, ItemOutcome, PipelineEvent, PipelineStage};
use sx_store::{ProgressLedger, ProgressState};

#[test]
fn construction_failure_is_contained_to_its_item() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let builder = Arc::new(TestBuilder {
        fail_ids: vec![57],
        ..TestBuilder::default()
    });

    let summary = scheduler(config.clone(), records(100), builder)
        .run()
        .expect("run should succeed");

    assert_eq!(summary.completed, 100);
    assert_eq!(summary.succeeded, 99);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.batches, 1);

    let store = store(&config);
    assert!(!store.is_complete(ConfigId::new(57)));
    assert!(store.is_complete(ConfigId::new(56)));
    assert!(store.is_complete(ConfigId::new(58)));

    let state = ProgressLedger::new(config.ledger_path.clone())
        .load()
        .expect("ledger saved");
    assert_eq!(state.completed, 100);
    assert_eq!(state.success_count, 99);
    assert_eq!(state.last_batch, 0);
}

#[test]
fn second_run_skips_stored_configurations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let builder = Arc::new(TestBuilder::default());

    let first = scheduler(config.clone(), records(30), Arc::clone(&builder))
        .run()
        .expect("first run");
    assert_eq!(first.succeeded, 30);
    assert_eq!(builder.builds(), 30);

    ProgressLedger::new(config.ledger_path.clone())
        .clear()
        .expect("clear ledger");
    let second = scheduler(config, records(30), Arc::clone(&builder))
        .run()
        .expect("second run");

    assert_eq!(second.skipped, 30);
    assert_eq!(second.succeeded, 30);
    assert_eq!(second.completed, 30);
    assert_eq!(builder.builds(), 30, "no model should be rebuilt");
}

#[test]
fn resumed_run_matches_fresh_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let interrupted = {
        let mut config = test_config(&dir.path().join("resumed"));
        config.max_batches = Some(1);
        config
    };
    let builder = Arc::new(TestBuilder::default());

    let partial = scheduler(interrupted.clone(), records(250), Arc::clone(&builder))
        .run()
        .expect("interrupted run");
    assert_eq!(partial.completed, 100);
    assert_eq!(partial.batches, 1);

    let resumed_config = sx_pipeline::PipelineConfig {
        max_batches: None,
        ..interrupted
    };
    let resumed = scheduler(resumed_config, records(250), Arc::clone(&builder))
        .run()
        .expect("resumed run");
    assert_eq!(resumed.resumed_from, 100);
    assert_eq!(resumed.batches, 2);
    assert_eq!(builder.builds(), 250);

    let fresh = scheduler(
        test_config(&dir.path().join("fresh")),
        records(250),
        Arc::new(TestBuilder::default()),
    )
    .run()
    .expect("fresh run");

    assert_eq!(resumed.completed, fresh.completed);
    assert_eq!(resumed.succeeded, fresh.succeeded);
    assert_eq!(fresh.completed, 250);
}

fn stub_boundary(radius: f64) -> BoundaryArtifact {
    BoundaryArtifact {
        image: Some(vec![0x89, b'P', b'N', b'G']),
        interactive: Some(json!({ "data": [], "layout": {} })),
        radius: Some(radius),
        error: None,
    }
}

fn stub_diagnostics() -> DiagnosticsArtifact {
    DiagnosticsArtifact {
        image: Some(vec![0x89, b'P', b'N', b'G']),
        curves: Default::default(),
        error: None,
    }
}

#[test]
fn restart_after_crash_mid_batch_matches_fresh_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(&dir.path().join("crashed"));
    let store = store(&config);

    // Batch 0 finished and was checkpointed. Batch 1 got through ids
    // 101..=140 and was killed while writing id 141.
    let mut writer = store.writer(5);
    for id in (1..=140).map(ConfigId::new) {
        writer.write_boundary(id, &stub_boundary(0.1)).expect("write");
        writer.write_diagnostics(id, &stub_diagnostics()).expect("write");
    }
    writer
        .write_boundary(ConfigId::new(141), &stub_boundary(9.0))
        .expect("write");
    writer.flush().expect("flush");
    ProgressLedger::new(config.ledger_path.clone())
        .save(&ProgressState {
            completed: 100,
            success_count: 100,
            last_batch: 0,
            elapsed_time: 30.0,
            updated_at: None,
        })
        .expect("write ledger");

    let builder = Arc::new(TestBuilder::default());
    let resumed = scheduler(config.clone(), records(250), Arc::clone(&builder))
        .run()
        .expect("restarted run");

    assert_eq!(resumed.resumed_from, 100);
    assert_eq!(resumed.skipped, 40);
    assert_eq!(builder.builds(), 110);
    assert!(resumed.total_elapsed_s >= 30.0);

    let half_written = store
        .load_boundary(ConfigId::new(141))
        .expect("load")
        .expect("present");
    assert_ne!(half_written.radius, Some(9.0), "the stale boundary is regenerated");
    assert!(store.is_complete(ConfigId::new(141)));

    let fresh = scheduler(
        test_config(&dir.path().join("fresh")),
        records(250),
        Arc::new(TestBuilder::default()),
    )
    .run()
    .expect("fresh run");

    assert_eq!(resumed.completed, fresh.completed);
    assert_eq!(resumed.succeeded, fresh.succeeded);

    let state = ProgressLedger::new(config.ledger_path)
        .load()
        .expect("ledger saved");
    assert_eq!(state.completed, 250);
    assert_eq!(state.last_batch, 200);
    assert!(state.elapsed_time >= 30.0);
}

#[test]
fn broken_diagnostics_make_a_partial_item() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let builder = Arc::new(TestBuilder {
        no_diagnostics_ids: vec![4],
        ..TestBuilder::default()
    });

    let mut outcomes = Vec::new();
    let summary = scheduler(config.clone(), records(6), builder)
        .run_with_progress(Some(&mut |event: PipelineEvent| {
            if let (Some(id), Some(outcome)) = (event.config_id, event.outcome) {
                outcomes.push((id, outcome));
            }
        }))
        .expect("run");

    assert_eq!(summary.completed, 6);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.partial, 1);
    assert_eq!(summary.failed, 0);
    assert!(outcomes.contains(&(
        ConfigId::new(4),
        ItemOutcome::Partial {
            failed: ArtifactKind::Diagnostics
        }
    )));

    let store = store(&config);
    let id = ConfigId::new(4);
    assert!(store.exists(id, ArtifactKind::Boundary));
    assert!(!store.exists(id, ArtifactKind::Diagnostics));
    assert!(!store.is_complete(id));
}

#[test]
fn slow_item_times_out_without_blocking_siblings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = sx_pipeline::PipelineConfig {
        item_timeout_s: 0.5,
        workers: Some(2),
        ..test_config(dir.path())
    };
    let builder = Arc::new(TestBuilder {
        slow_ids: vec![3],
        delay: Duration::from_secs(5),
        ..TestBuilder::default()
    });

    let mut outcomes = Vec::new();
    let summary = scheduler(config, records(6), builder)
        .run_with_progress(Some(&mut |event: PipelineEvent| {
            if let (Some(id), Some(outcome)) = (event.config_id, event.outcome) {
                outcomes.push((id, outcome));
            }
        }))
        .expect("run");

    assert_eq!(summary.completed, 6);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.succeeded, 5);
    assert!(outcomes.contains(&(ConfigId::new(3), ItemOutcome::TimedOut)));
}

#[test]
fn high_memory_pauses_before_each_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = sx_pipeline::PipelineConfig {
        batch_size: 4,
        ..test_config(dir.path())
    };

    let mut stages = Vec::new();
    let summary = scheduler(config, records(10), Arc::new(TestBuilder::default()))
        .with_memory_gauge(Box::new(FixedMemoryGauge(Some(95.0))))
        .run_with_progress(Some(&mut |event: PipelineEvent| stages.push(event.stage)))
        .expect("run");

    assert_eq!(summary.batches, 3);
    let pauses = stages
        .iter()
        .filter(|s| **s == PipelineStage::BackpressureWait)
        .count();
    assert_eq!(pauses, 3);
    assert_eq!(
        stages
            .iter()
            .filter(|s| **s == PipelineStage::ItemFinished)
            .count(),
        10
    );
    assert_eq!(stages.last(), Some(&PipelineStage::Completed));
}

#[test]
fn corrupt_ledger_starts_over() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    std::fs::write(&config.ledger_path, "not json").expect("write ledger");

    let summary = scheduler(config, records(5), Arc::new(TestBuilder::default()))
        .run()
        .expect("run");

    assert_eq!(summary.resumed_from, 0);
    assert_eq!(summary.completed, 5);
}
