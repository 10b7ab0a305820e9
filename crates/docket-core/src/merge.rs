//! Last-write-wins reconciliation of stored documents.
//!
//! Many stored documents may describe the same logical record (same
//! [`BusinessKey`]). Reconciliation picks one canonical document per key by
//! folding the key's documents left to right with [`newer`].
//!
//! # Tie-breaking
//!
//! `newer(a, b)` returns `b` when `ts(b) >= ts(a)`. Ties therefore go to the
//! document folded **later**, which is the one that appeared later in the
//! input stream. Results are deterministic for a fixed input order; with
//! three or more documents sharing one resolved timestamp, the winner
//! depends on the order the store returned them in.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::{BusinessKey, ReportPayload, Row, StoredDocument};
use crate::timestamp::resolve_timestamp;

/// The single document chosen to represent a business key.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord<P = ReportPayload> {
    pub business_key: BusinessKey,
    pub document: StoredDocument<P>,
    /// Resolved timestamp of `document` in epoch milliseconds.
    pub effective_timestamp: i64,
    /// Ids of the other documents that shared the key, in input order.
    /// Never contains the winner's id.
    pub superseded: Vec<String>,
}

impl CanonicalRecord<ReportPayload> {
    #[must_use]
    pub fn items(&self) -> &[Row] {
        &self.document.payload.items
    }
}

/// Outcome of folding one key's documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<P> {
    pub winner: StoredDocument<P>,
    pub effective_timestamp: i64,
    pub superseded: Vec<String>,
}

/// Pick the newer of two documents; ties go to `b`.
#[must_use]
pub fn newer<'a, P>(a: &'a StoredDocument<P>, b: &'a StoredDocument<P>) -> &'a StoredDocument<P> {
    if resolve_timestamp(b) >= resolve_timestamp(a) {
        b
    } else {
        a
    }
}

/// Fold documents that already share a key. `None` for empty input.
pub fn merge_documents<P, I>(docs: I) -> Option<Merged<P>>
where
    I: IntoIterator<Item = StoredDocument<P>>,
{
    let mut docs = docs.into_iter();
    let first = docs.next()?;
    let mut merged = Merged {
        effective_timestamp: resolve_timestamp(&first),
        winner: first,
        superseded: Vec::new(),
    };
    for doc in docs {
        merged.absorb(doc);
    }
    merged.finish();
    Some(merged)
}

/// Reduce an unordered document stream to one canonical record per key.
///
/// Documents for which `key_of` returns `None` are dropped before grouping.
pub fn merge_latest<P, I, F>(docs: I, mut key_of: F) -> BTreeMap<BusinessKey, CanonicalRecord<P>>
where
    I: IntoIterator<Item = StoredDocument<P>>,
    F: FnMut(&StoredDocument<P>) -> Option<BusinessKey>,
{
    let mut groups: BTreeMap<BusinessKey, Merged<P>> = BTreeMap::new();
    let mut dropped = 0usize;

    for doc in docs {
        let Some(key) = key_of(&doc) else {
            dropped += 1;
            debug!(id = %doc.id, "dropping document without a business key");
            continue;
        };
        match groups.get_mut(&key) {
            Some(merged) => merged.absorb(doc),
            None => {
                let merged = Merged {
                    effective_timestamp: resolve_timestamp(&doc),
                    winner: doc,
                    superseded: Vec::new(),
                };
                groups.insert(key, merged);
            }
        }
    }

    if dropped > 0 {
        debug!(dropped, "documents excluded from reconciliation");
    }

    groups
        .into_iter()
        .map(|(key, mut merged)| {
            merged.finish();
            debug!(
                key = %key,
                winner = %merged.winner.id,
                ts = merged.effective_timestamp,
                superseded = merged.superseded.len(),
                "reconciled"
            );
            let record = CanonicalRecord {
                business_key: key.clone(),
                document: merged.winner,
                effective_timestamp: merged.effective_timestamp,
                superseded: merged.superseded,
            };
            (key, record)
        })
        .collect()
}

impl<P> Merged<P> {
    fn absorb(&mut self, doc: StoredDocument<P>) {
        let ts = resolve_timestamp(&doc);
        if ts >= self.effective_timestamp {
            let loser = std::mem::replace(&mut self.winner, doc);
            self.effective_timestamp = ts;
            self.superseded.push(loser.id);
        } else {
            self.superseded.push(doc.id);
        }
    }

    /// Drop the winner's own id (the stream may repeat a document) and
    /// duplicate ids, keeping first-seen order.
    fn finish(&mut self) {
        let winner = self.winner.id.clone();
        let mut seen = std::collections::HashSet::new();
        self.superseded
            .retain(|id| *id != winner && seen.insert(id.clone()));
    }
}
