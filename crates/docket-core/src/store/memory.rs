//! In-process document store with fault injection.
//!
//! Behaves like a minimal REST backend: it ignores the key filtering hint,
//! stamps `createdAt`/`updatedAt` from its clock, mints ObjectId-shaped ids,
//! and returns documents in insertion order. A [`FaultPlan`] makes it
//! reject updates (like create+read+delete-only deployments), fail creates
//! or deletes, or go offline entirely.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::trace;

use super::{DocumentStore, NewDocument, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::document::{BusinessKey, StoredDocument, normalize_document};
use crate::timestamp::RawInstant;

/// Which operations the store should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// `PUT` answers `405 Method Not Allowed`.
    pub reject_updates: bool,
    /// `POST` answers `500`.
    pub fail_creates: bool,
    /// `DELETE` answers `500`.
    pub fail_deletes: bool,
    /// Every call fails as a transport error.
    pub offline: bool,
}

impl FaultPlan {
    /// A backend that supports create, read and delete but not update.
    #[must_use]
    pub const fn no_updates() -> Self {
        Self {
            reject_updates: true,
            fail_creates: false,
            fail_deletes: false,
            offline: false,
        }
    }
}

/// One call observed by the store, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List { doc_type: String },
    Create { doc_type: String },
    Update { id: String },
    Delete { id: String },
}

#[derive(Debug, Default)]
struct Inner {
    docs: Vec<StoredDocument>,
    faults: FaultPlan,
    counter: u32,
    calls: Vec<StoreCall>,
}

/// A thread-safe in-memory [`DocumentStore`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("docs", &inner.docs.len())
            .field("faults", &inner.faults)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        self.lock().faults = faults;
    }

    /// Seed a document exactly as a backend would have returned it, aliases
    /// and all. No timestamps are added.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the value has no usable id.
    pub fn insert_raw(&self, value: Value) -> Result<StoredDocument, StoreError> {
        let doc = normalize_document(value)?;
        self.lock().docs.push(doc.clone());
        Ok(doc)
    }

    /// Snapshot of every stored document in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<StoredDocument> {
        self.lock().docs.clone()
    }

    /// Snapshot of the documents of one type.
    #[must_use]
    pub fn documents_of(&self, doc_type: &str) -> Vec<StoredDocument> {
        self.lock()
            .docs
            .iter()
            .filter(|doc| doc.doc_type == doc_type)
            .cloned()
            .collect()
    }

    /// Calls observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mint_id(&self, inner: &mut Inner) -> String {
        inner.counter = inner.counter.wrapping_add(1);
        let seconds = u32::try_from(self.clock.now_millis() / 1000).unwrap_or(0);
        let random = rand::random::<u64>() & 0xff_ffff_ffff;
        format!("{seconds:08x}{random:010x}{:06x}", inner.counter & 0x00ff_ffff)
    }
}

fn check_online(inner: &Inner) -> Result<(), StoreError> {
    if inner.faults.offline {
        return Err(StoreError::Transport("connection refused (offline)".into()));
    }
    Ok(())
}

fn injected(status: u16, body: &str) -> StoreError {
    StoreError::Status {
        status,
        body: body.to_string(),
    }
}

impl DocumentStore for MemoryStore {
    fn list(
        &self,
        doc_type: &str,
        _key: Option<&BusinessKey>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::List {
            doc_type: doc_type.to_string(),
        });
        check_online(&inner)?;
        Ok(inner
            .docs
            .iter()
            .filter(|doc| doc.doc_type == doc_type)
            .cloned()
            .collect())
    }

    fn create(&self, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Create {
            doc_type: doc.doc_type.clone(),
        });
        check_online(&inner)?;
        if inner.faults.fail_creates {
            return Err(injected(500, "create failed"));
        }

        let now = self.clock.now_millis();
        let id = self.mint_id(&mut inner);
        let mut stored = StoredDocument::new(id, doc.doc_type.clone(), doc.payload.clone())
            .with_created_at(now)
            .with_updated_at(now);
        stored.saved_at = saved_at_of(&doc.payload);
        trace!(id = %stored.id, doc_type = %stored.doc_type, "memory store create");
        inner.docs.push(stored.clone());
        Ok(stored)
    }

    fn update(&self, id: &str, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Update { id: id.to_string() });
        check_online(&inner)?;
        if inner.faults.reject_updates {
            return Err(injected(405, "update not supported"));
        }

        let now = self.clock.now_millis();
        let existing = inner
            .docs
            .iter_mut()
            .find(|stored| stored.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        existing.doc_type.clone_from(&doc.doc_type);
        existing.payload = doc.payload.clone();
        existing.updated_at = Some(RawInstant::Millis(now));
        existing.saved_at = saved_at_of(&doc.payload);
        Ok(existing.clone())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Delete { id: id.to_string() });
        check_online(&inner)?;
        if inner.faults.fail_deletes {
            return Err(injected(500, "delete failed"));
        }
        inner.docs.retain(|stored| stored.id != id);
        Ok(())
    }
}

fn saved_at_of(payload: &Value) -> Option<RawInstant> {
    payload.get("savedAt").and_then(RawInstant::from_json)
}
