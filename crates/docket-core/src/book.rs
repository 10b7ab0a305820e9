//! The report book: one object that owns the store handle and ties loading,
//! layout, saving and auditing together.
//!
//! Callers construct a [`ReportBook`] and pass it around explicitly. It keeps
//! no cache of its own; every read goes to the store and is reconciled
//! fresh, so a second `ReportBook` over the same store sees the same state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::audit::{AuditAppender, AuditError, ChangeLogEntry, detect_changes};
use crate::clock::{Clock, SystemClock};
use crate::config::{DocketConfig, SaveConfig, TypesConfig};
use crate::document::{BusinessKey, ReportPayload, Row, StoredDocument};
use crate::layout::ReportLayout;
use crate::merge::{CanonicalRecord, merge_latest};
use crate::save::{SaveAck, SaveError, SavePipeline, SaveRequest};
use crate::store::{DocumentStore, NewDocument, StoreError};
use crate::timestamp::RawInstant;

/// Edited rows for one report, as the user wants them saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDraft {
    pub key: BusinessKey,
    pub items: Vec<Row>,
    /// Extra payload fields to write alongside the rows.
    pub extra: BTreeMap<String, Value>,
}

impl ReportDraft {
    #[must_use]
    pub const fn new(key: BusinessKey, items: Vec<Row>) -> Self {
        Self {
            key,
            items,
            extra: BTreeMap::new(),
        }
    }
}

/// What happened to the change log after a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AuditStatus {
    /// No row changed its action; nothing was appended.
    NoChanges,
    Appended { total: usize },
    /// The report was saved but its change log was not updated.
    Failed { reason: String },
}

/// Result of [`ReportBook::save_report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub ack: SaveAck,
    pub changes: Vec<ChangeLogEntry>,
    pub audit: AuditStatus,
}

pub struct ReportBook<S> {
    store: S,
    types: TypesConfig,
    save: SaveConfig,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> ReportBook<S> {
    #[must_use]
    pub fn new(store: S, config: &DocketConfig) -> Self {
        Self {
            store,
            types: config.types.clone(),
            save: config.save.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Every report in the store, one canonical record per date.
    ///
    /// # Errors
    ///
    /// Returns the store error when listing fails.
    pub fn load_all(&self) -> Result<BTreeMap<BusinessKey, CanonicalRecord>, StoreError> {
        let docs = self.store.list(&self.types.report, None)?;
        Ok(self.reconcile(docs))
    }

    /// The canonical record for one date, if any document has it.
    ///
    /// # Errors
    ///
    /// Returns the store error when listing fails.
    pub fn load(&self, key: &BusinessKey) -> Result<Option<CanonicalRecord>, StoreError> {
        let docs = self.store.list(&self.types.report, Some(key))?;
        Ok(self.reconcile(docs).remove(key))
    }

    /// Rows and span layout of the canonical record for `key`.
    ///
    /// # Errors
    ///
    /// Returns the store error when listing fails.
    pub fn layout(&self, key: &BusinessKey) -> Result<Option<ReportLayout>, StoreError> {
        Ok(self.load(key)?.map(|record| {
            ReportLayout::new(Some(record.business_key), record.document.payload.items)
        }))
    }

    /// Save a draft, then record which row actions changed.
    ///
    /// The draft is borrowed so the caller still holds it when the save
    /// fails. A failed audit append is logged and reported in the outcome;
    /// the save itself has already succeeded by then.
    ///
    /// # Errors
    ///
    /// Returns a [`SaveError`] when the current record cannot be read or no
    /// save strategy succeeds.
    pub fn save_report(&self, draft: &ReportDraft) -> Result<SaveOutcome, SaveError> {
        let key = &draft.key;
        let current = self.load(key).map_err(|source| SaveError::Lookup {
            key: key.clone(),
            source,
        })?;
        let now = self.clock.now_millis();

        let (previous_rows, previous, superseded, mut extra) = match current {
            Some(record) => (
                record.document.payload.items,
                Some(record.document.id),
                record.superseded,
                record.document.payload.extra,
            ),
            None => (Vec::new(), None, Vec::new(), BTreeMap::new()),
        };
        extra.extend(draft.extra.clone());

        let payload = ReportPayload {
            report_date: key.to_string(),
            items: draft.items.clone(),
            saved_at: Some(RawInstant::Millis(now)),
            extra,
        };
        let request = SaveRequest {
            key: key.clone(),
            document: NewDocument::new(self.types.report.clone(), serde_json::to_value(&payload)?),
            previous,
            superseded,
        };
        let ack = SavePipeline::new(&self.store, &self.save).save(&request)?;

        let changes = detect_changes(&previous_rows, &draft.items, now);
        let audit = if changes.is_empty() {
            AuditStatus::NoChanges
        } else {
            match self.audit().append_changes(key, changes.clone()) {
                Ok(appended) => AuditStatus::Appended {
                    total: appended.total,
                },
                Err(err) => {
                    warn!(key = %key, code = %err.code(), error = %err, "change log not updated");
                    AuditStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        };

        info!(
            key = %key,
            id = %ack.id(),
            mode = ?ack.mode,
            changes = changes.len(),
            "report saved"
        );
        Ok(SaveOutcome {
            ack,
            changes,
            audit,
        })
    }

    /// The change log for `key`, oldest entry first.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when the log cannot be read.
    pub fn history(&self, key: &BusinessKey) -> Result<Vec<ChangeLogEntry>, AuditError> {
        self.audit().read_log(key)
    }

    fn audit(&self) -> AuditAppender<'_> {
        AuditAppender::new(
            &self.store,
            self.types.audit.clone(),
            self.save.clone(),
            self.clock.as_ref(),
        )
    }

    fn reconcile(&self, docs: Vec<StoredDocument>) -> BTreeMap<BusinessKey, CanonicalRecord> {
        let reports = docs
            .into_iter()
            .filter(|doc| doc.doc_type == self.types.report)
            .filter_map(|doc| {
                let id = doc.id.clone();
                doc.into_report()
                    .map_err(|err| warn!(id = %id, error = %err, "skipping malformed report"))
                    .ok()
            });
        merge_latest(reports, |doc| doc.payload.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{FaultPlan, MemoryStore};
    use serde_json::json;

    fn book() -> ReportBook<MemoryStore> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::ticking(1_700_000_000_000, 10));
        ReportBook::new(MemoryStore::with_clock(clock.clone()), &DocketConfig::default())
            .with_clock(clock)
    }

    fn row(item: &str, action: &str) -> Row {
        Row {
            group_id: Some("G1".into()),
            box_code: "B1".into(),
            item_code: item.into(),
            item_name: "Widget".into(),
            action: action.into(),
            ..Row::default()
        }
    }

    fn key() -> BusinessKey {
        BusinessKey::date("2024-05-01").expect("key")
    }

    #[test]
    fn first_save_creates_and_logs_nothing() {
        let book = book();
        let outcome = book
            .save_report(&ReportDraft::new(key(), vec![row("I1", "Keep")]))
            .expect("save");
        assert_eq!(outcome.audit, AuditStatus::NoChanges);
        assert!(outcome.changes.is_empty());

        let record = book.load(&key()).expect("load").expect("present");
        assert_eq!(record.items(), &[row("I1", "Keep")]);
    }

    #[test]
    fn changed_action_is_saved_and_audited() {
        let book = book();
        book.save_report(&ReportDraft::new(key(), vec![row("I1", "Keep"), row("I2", "Keep")]))
            .expect("first save");

        let outcome = book
            .save_report(&ReportDraft::new(
                key(),
                vec![row("I1", "Keep"), row("I2", "Discard")],
            ))
            .expect("second save");
        assert_eq!(outcome.audit, AuditStatus::Appended { total: 1 });

        let history = book.history(&key()).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].key, "b1|i2|widget");
        assert_eq!(history[0].to, "Discard");
    }

    /// Fails every call that touches the audit collection.
    struct AuditDown(MemoryStore);

    impl DocumentStore for AuditDown {
        fn list(
            &self,
            doc_type: &str,
            key: Option<&BusinessKey>,
        ) -> Result<Vec<StoredDocument>, StoreError> {
            if doc_type == "daily-report-changes" {
                return Err(StoreError::Transport("audit shard down".into()));
            }
            self.0.list(doc_type, key)
        }
        fn create(&self, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
            self.0.create(doc)
        }
        fn update(&self, id: &str, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
            self.0.update(id, doc)
        }
        fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.0.delete(id)
        }
    }

    #[test]
    fn audit_failure_does_not_fail_the_save() {
        let book = ReportBook::new(AuditDown(MemoryStore::new()), &DocketConfig::default());
        book.save_report(&ReportDraft::new(key(), vec![row("I1", "Keep")]))
            .expect("first save");

        let outcome = book
            .save_report(&ReportDraft::new(key(), vec![row("I1", "Scrap")]))
            .expect("report still saved");
        assert_eq!(outcome.changes.len(), 1);
        assert!(matches!(outcome.audit, AuditStatus::Failed { .. }));
        let record = book.load(&key()).expect("load").expect("present");
        assert_eq!(record.items()[0].action, "Scrap");
    }

    #[test]
    fn undeletable_old_report_is_an_orphan() {
        let book = book();
        book.save_report(&ReportDraft::new(key(), vec![row("I1", "Keep")]))
            .expect("first save");
        book.store().set_faults(FaultPlan {
            reject_updates: true,
            fail_deletes: true,
            ..FaultPlan::default()
        });

        let outcome = book
            .save_report(&ReportDraft::new(key(), vec![row("I1", "Scrap")]))
            .expect("save");
        assert_eq!(outcome.ack.orphans.len(), 1);
        assert_eq!(outcome.audit, AuditStatus::Appended { total: 1 });
        let record = book.load(&key()).expect("load").expect("present");
        assert_eq!(record.items()[0].action, "Scrap");
        assert_eq!(record.superseded.len(), 1);
    }

    #[test]
    fn offline_store_keeps_draft_and_reports_retryable() {
        let book = book();
        book.store().set_faults(FaultPlan {
            offline: true,
            ..FaultPlan::default()
        });
        let draft = ReportDraft::new(key(), vec![row("I1", "Keep")]);
        let err = book.save_report(&draft).expect_err("offline");
        assert!(err.is_retryable());
        assert_eq!(draft.items.len(), 1);
    }

    #[test]
    fn duplicates_collapse_and_extra_fields_survive() {
        let book = book();
        book.store()
            .insert_raw(json!({
                "_id": "a", "type": "daily-report", "createdAt": 1_000,
                "payload": {"date": "2024-05-01", "rows": [], "shift": "night"}
            }))
            .expect("seed");
        book.store()
            .insert_raw(json!({
                "_id": "b", "type": "daily-report", "createdAt": 2_000,
                "payload": {"reportDate": "2024-05-01", "items": [], "shift": "day"}
            }))
            .expect("seed");

        let all = book.load_all().expect("load");
        assert_eq!(all.len(), 1);
        let record = &all[&key()];
        assert_eq!(record.document.id, "b");
        assert_eq!(record.superseded, vec!["a".to_string()]);

        let outcome = book
            .save_report(&ReportDraft::new(key(), vec![row("I1", "Keep")]))
            .expect("save");
        assert_eq!(outcome.ack.id(), "b");
        let saved = book.load(&key()).expect("load").expect("present");
        assert_eq!(saved.document.payload.extra["shift"], json!("day"));
    }

    #[test]
    fn layout_groups_saved_rows() {
        let book = book();
        let mut loose = row("I3", "Keep");
        loose.group_id = None;
        loose.box_code = String::new();
        book.save_report(&ReportDraft::new(
            key(),
            vec![row("I1", "Keep"), row("I2", "Keep"), loose],
        ))
        .expect("save");

        let layout = book.layout(&key()).expect("layout").expect("present");
        let spans: Vec<usize> = layout.cells.iter().map(|c| c.span).collect();
        assert_eq!(spans, vec![2, 0, 1]);
        let absent = BusinessKey::date("1999-01-01").expect("key");
        assert!(book.layout(&absent).expect("layout").is_none());
    }
}
