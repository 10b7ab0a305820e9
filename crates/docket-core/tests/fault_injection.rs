//! Save and audit behavior against stores that misbehave:
//! - a backend that rejects every update
//! - deletes that fail after a successful create
//! - a store that is offline for the whole save

use std::sync::Arc;

use docket_core::audit::{AuditAppender, ChangeLogEntry};
use docket_core::clock::{Clock, ManualClock};
use docket_core::config::{DocketConfig, SaveConfig, UpdateMode};
use docket_core::document::{BusinessKey, Row};
use docket_core::save::{SaveMode, SavePipeline, SaveRequest};
use docket_core::store::{DocumentStore, FaultPlan, MemoryStore, NewDocument, StoreCall};
use docket_core::{ReportBook, ReportDraft};
use serde_json::json;

const BASE_MS: i64 = 1_717_200_000_000;

fn ticking() -> Arc<ManualClock> {
    Arc::new(ManualClock::ticking(BASE_MS, 5))
}

fn key() -> BusinessKey {
    BusinessKey::date("2024-06-01").expect("key")
}

fn row(item: &str, action: &str) -> Row {
    Row {
        box_code: "BX-9".into(),
        item_code: item.into(),
        item_name: "Gasket".into(),
        action: action.into(),
        ..Row::default()
    }
}

#[test]
fn create_only_backend_leaves_exactly_one_live_document() {
    let clock = ticking();
    let store = MemoryStore::with_clock(clock.clone());
    store.set_faults(FaultPlan::no_updates());
    let book = ReportBook::new(&store, &DocketConfig::default()).with_clock(clock);

    let mut previous_id = None;
    for action in ["Keep", "Discard", "Keep", "Scrap"] {
        let outcome = book
            .save_report(&ReportDraft::new(key(), vec![row("I1", action)]))
            .expect("save");
        assert_eq!(outcome.ack.mode, SaveMode::Created);
        assert!(outcome.ack.orphans.is_empty());
        if let Some(old) = previous_id.replace(outcome.ack.id().to_string()) {
            assert_eq!(outcome.ack.deleted, vec![old]);
        }

        let live = store.documents_of("daily-report");
        assert_eq!(live.len(), 1);
        assert_eq!(Some(live[0].id.clone()), previous_id);
    }

    let record = book.load(&key()).expect("load").expect("present");
    assert_eq!(record.items()[0].action, "Scrap");
    assert_eq!(book.history(&key()).expect("history").len(), 3);
    assert_eq!(store.documents_of("daily-report-changes").len(), 1);
}

#[test]
fn update_attempt_precedes_create_then_delete() {
    let store = MemoryStore::new();
    let old = store
        .create(&NewDocument::new("daily-report", json!({"reportDate": "2024-06-01"})))
        .expect("seed")
        .id;
    store.set_faults(FaultPlan::no_updates());
    store.clear_calls();

    let request = SaveRequest {
        key: key(),
        document: NewDocument::new("daily-report", json!({"reportDate": "2024-06-01", "items": []})),
        previous: Some(old.clone()),
        superseded: Vec::new(),
    };
    let ack = SavePipeline::new(&store, &SaveConfig::default())
        .save(&request)
        .expect("save");

    let calls = store.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], StoreCall::Update { id: old.clone() });
    assert!(matches!(calls[1], StoreCall::Create { .. }));
    assert_eq!(calls[2], StoreCall::Delete { id: old });
    assert_eq!(store.documents()[0].id, ack.id());
}

#[test]
fn failed_cleanup_is_reported_and_healed_by_next_read() {
    let clock = ticking();
    let store = MemoryStore::with_clock(clock.clone());
    let book = ReportBook::new(&store, &DocketConfig::default()).with_clock(clock);
    book.save_report(&ReportDraft::new(key(), vec![row("I1", "Keep")]))
        .expect("first save");

    store.set_faults(FaultPlan {
        reject_updates: true,
        fail_deletes: true,
        ..FaultPlan::default()
    });
    let outcome = book
        .save_report(&ReportDraft::new(key(), vec![row("I1", "Discard")]))
        .expect("save succeeds despite orphan");
    assert_eq!(outcome.ack.orphans.len(), 1);
    assert_eq!(store.documents_of("daily-report").len(), 2);

    let record = book.load(&key()).expect("load").expect("present");
    assert_eq!(record.document.id, outcome.ack.id());
    assert_eq!(record.superseded, vec![outcome.ack.orphans[0].id.clone()]);

    // Pruning on the next save clears the orphan.
    store.set_faults(FaultPlan::default());
    let pruning = ReportBook::new(
        &store,
        &DocketConfig {
            save: SaveConfig {
                update_mode: UpdateMode::Auto,
                prune_superseded: true,
            },
            ..DocketConfig::default()
        },
    );
    let outcome = pruning
        .save_report(&ReportDraft::new(key(), vec![row("I1", "Discard")]))
        .expect("save");
    assert_eq!(outcome.ack.mode, SaveMode::Updated);
    assert_eq!(outcome.ack.deleted.len(), 1);
    assert_eq!(store.documents_of("daily-report").len(), 1);
}

#[test]
fn offline_save_reports_nothing_saved() {
    let store = MemoryStore::new();
    store.set_faults(FaultPlan {
        offline: true,
        ..FaultPlan::default()
    });
    let book = ReportBook::new(&store, &DocketConfig::default());
    let draft = ReportDraft::new(key(), vec![row("I1", "Keep")]);

    let err = book.save_report(&draft).expect_err("offline");
    assert!(err.is_retryable());
    assert!(err.user_message().contains("2024-06-01"));
    assert!(store.documents().is_empty());
}

#[test]
fn sequential_appends_keep_every_entry_in_order() {
    let clock = ticking();
    let store = MemoryStore::with_clock(clock.clone());
    let audit = AuditAppender::new(
        &store,
        "daily-report-changes",
        SaveConfig::default(),
        clock.as_ref() as &dyn Clock,
    );

    let n = 25;
    for i in 0..n {
        let entry = ChangeLogEntry {
            key: format!("bx-9|i{i}|gasket"),
            from: "Keep".into(),
            to: "Discard".into(),
            at: BASE_MS + i,
        };
        let appended = audit.append_change(&key(), entry).expect("append");
        assert_eq!(appended.total, usize::try_from(i + 1).expect("small"));
    }

    let log = audit.read_log(&key()).expect("read");
    assert_eq!(log.len(), 25);
    assert!(log.windows(2).all(|pair| pair[0].at < pair[1].at));
}
