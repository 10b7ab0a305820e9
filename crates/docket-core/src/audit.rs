//! Append-only change log per business key.
//!
//! The store only supports whole-document writes, so appending is a
//! read-merge-write: list the audit documents, keep the ones for the key,
//! pick the newest with the same fold used for reports, append, and upsert
//! the longer list through the [`SavePipeline`].
//!
//! The sequence is not atomic. Two writers appending to one key at the same
//! time can race and the loser's entries are lost. Only this secondary log
//! is affected; report records never depend on it.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::SaveConfig;
use crate::document::{
    BusinessKey, REPORT_ALIASES, Row, StoredDocument, apply_aliases, lenient_opt_instant,
    lenient_string,
};
use crate::error::ErrorCode;
use crate::merge::{Merged, merge_documents};
use crate::save::{SaveAck, SaveError, SavePipeline, SaveRequest};
use crate::store::{DocumentStore, NewDocument, StoreError};
use crate::timestamp::{RawInstant, UNKNOWN_TS, parse_instant};

/// One field-level transition of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Content key of the row that changed.
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to: String,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub at: i64,
}

/// Payload of a change log document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub report_date: String,
    #[serde(default)]
    pub items: Vec<ChangeLogEntry>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_instant"
    )]
    pub saved_at: Option<RawInstant>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChangeLogPayload {
    /// Decode a raw payload, mapping report field aliases first.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload or an entry is malformed.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(obj) = &mut value {
            apply_aliases(obj, REPORT_ALIASES);
        }
        serde_json::from_value(value)
    }

    /// The business key this log belongs to.
    #[must_use]
    pub fn key(&self) -> Option<BusinessKey> {
        BusinessKey::parse(&self.report_date)
    }
}

fn lenient_millis<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    Ok(lenient_opt_instant(de)?
        .as_ref()
        .and_then(parse_instant)
        .unwrap_or(UNKNOWN_TS))
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to read change log: {0}")]
    Store(#[from] StoreError),

    #[error("failed to write change log: {0}")]
    Save(#[from] SaveError),

    #[error("failed to encode change log: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AuditError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::AuditAppendFailed
    }
}

/// Result of an append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditAppend {
    /// Entries in the log after the append.
    pub total: usize,
    /// `None` when there was nothing to append and no write happened.
    pub ack: Option<SaveAck>,
}

/// Reads and appends change logs in one audit collection.
pub struct AuditAppender<'s> {
    store: &'s dyn DocumentStore,
    audit_type: String,
    save: SaveConfig,
    clock: &'s dyn Clock,
}

impl<'s> AuditAppender<'s> {
    #[must_use]
    pub fn new(
        store: &'s dyn DocumentStore,
        audit_type: impl Into<String>,
        save: SaveConfig,
        clock: &'s dyn Clock,
    ) -> Self {
        Self {
            store,
            audit_type: audit_type.into(),
            save,
            clock,
        }
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when the log cannot be read or written.
    pub fn append_change(
        &self,
        key: &BusinessKey,
        entry: ChangeLogEntry,
    ) -> Result<AuditAppend, AuditError> {
        self.append_changes(key, vec![entry])
    }

    /// Append entries in order with a single read-merge-write.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when the log cannot be read or written.
    pub fn append_changes(
        &self,
        key: &BusinessKey,
        entries: Vec<ChangeLogEntry>,
    ) -> Result<AuditAppend, AuditError> {
        let current = self.current(key)?;

        if entries.is_empty() {
            let total = current.map_or(0, |merged| merged.winner.payload.items.len());
            return Ok(AuditAppend { total, ack: None });
        }

        let (mut payload, previous, superseded) = match current {
            Some(merged) => (merged.winner.payload, Some(merged.winner.id), merged.superseded),
            None => (ChangeLogPayload::default(), None, Vec::new()),
        };
        let added = entries.len();
        payload.report_date = key.to_string();
        payload.items.extend(entries);
        payload.saved_at = Some(RawInstant::Millis(self.clock.now_millis()));
        let total = payload.items.len();

        let request = SaveRequest {
            key: key.clone(),
            document: NewDocument::new(self.audit_type.clone(), serde_json::to_value(&payload)?),
            previous,
            superseded,
        };
        let ack = SavePipeline::new(self.store, &self.save).save(&request)?;
        debug!(key = %key, added, total, id = %ack.id(), "appended change log");
        Ok(AuditAppend {
            total,
            ack: Some(ack),
        })
    }

    /// Entries of the current log for `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] when the store cannot be listed.
    pub fn read_log(&self, key: &BusinessKey) -> Result<Vec<ChangeLogEntry>, AuditError> {
        Ok(self
            .current(key)?
            .map(|merged| merged.winner.payload.items)
            .unwrap_or_default())
    }

    fn current(
        &self,
        key: &BusinessKey,
    ) -> Result<Option<Merged<ChangeLogPayload>>, AuditError> {
        let docs = self.store.list(&self.audit_type, Some(key))?;
        let logs = docs
            .into_iter()
            .filter(|doc| doc.doc_type == self.audit_type)
            .filter_map(|doc| decode_log(doc, &self.audit_type))
            .filter(|doc| doc.payload.key().as_ref() == Some(key));
        Ok(merge_documents(logs))
    }
}

fn decode_log(doc: StoredDocument, audit_type: &str) -> Option<StoredDocument<ChangeLogPayload>> {
    let id = doc.id.clone();
    match doc.try_map_payload(ChangeLogPayload::from_value) {
        Ok(log) => Some(log),
        Err(err) => {
            warn!(id = %id, audit_type, error = %err, "skipping malformed change log");
            None
        }
    }
}

/// Entries for rows whose display action changed.
///
/// Rows are matched by content key. Rows with an empty content key, or
/// without a counterpart in `previous`, produce nothing.
#[must_use]
pub fn detect_changes(previous: &[Row], next: &[Row], at: i64) -> Vec<ChangeLogEntry> {
    let mut before: HashMap<String, String> = HashMap::new();
    for row in previous {
        let key = row.content_key();
        if !key.is_empty() {
            before.entry(key).or_insert_with(|| row.display_action());
        }
    }

    next.iter()
        .filter_map(|row| {
            let key = row.content_key();
            let from = before.get(&key)?;
            let to = row.display_action();
            (*from != to).then(|| ChangeLogEntry {
                key,
                from: from.clone(),
                to,
                at,
            })
        })
        .collect()
}
