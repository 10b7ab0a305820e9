//! The external document store.
//!
//! The store is a generic collection of `{ id, type, payload }` documents
//! filterable by `type`. It is treated as an untrusted, loosely consistent
//! collaborator: server-side key filtering is best-effort, update support is
//! optional, and deletes of absent documents succeed.
//!
//! Implementations:
//!
//! - [`HttpStore`]: the REST client (`GET/POST/PUT/DELETE /collection`).
//! - [`MemoryStore`]: an in-process store with fault injection, used by
//!   tests and offline tooling.

pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::{FaultPlan, MemoryStore, StoreCall};

use serde::Serialize;
use serde_json::Value;

use crate::document::{BusinessKey, NormalizeError, StoredDocument};
use crate::error::ErrorCode;

/// Body of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDocument {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub payload: Value,
}

impl NewDocument {
    pub fn new(doc_type: impl Into<String>, payload: Value) -> Self {
        Self {
            doc_type: doc_type.into(),
            payload,
        }
    }
}

/// Errors returned by a [`DocumentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No response: connection refused, DNS failure, timeout.
    #[error("store unreachable: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("document {0} not found")]
    NotFound(String),

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed store response: {0}")]
    Invalid(#[from] NormalizeError),
}

impl StoreError {
    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 502 | 503 | 504),
            Self::NotFound(_) | Self::Decode(_) | Self::Invalid(_) => false,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::StoreUnreachable,
            Self::Status { .. } => ErrorCode::StoreRejected,
            Self::NotFound(_) => ErrorCode::DocumentNotFound,
            Self::Decode(_) | Self::Invalid(_) => ErrorCode::InvalidDocument,
        }
    }
}

/// Whole-document access to a typed collection.
pub trait DocumentStore {
    /// Documents of `doc_type`. `key` is a filtering hint the store may
    /// ignore; callers re-filter locally.
    ///
    /// # Errors
    ///
    /// Transport, status, or decode failures.
    fn list(
        &self,
        doc_type: &str,
        key: Option<&BusinessKey>,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Create a document; the store assigns its id.
    ///
    /// # Errors
    ///
    /// Transport, status, or decode failures.
    fn create(&self, doc: &NewDocument) -> Result<StoredDocument, StoreError>;

    /// Replace a document in place. Backends without update support return
    /// a non-success status.
    ///
    /// # Errors
    ///
    /// Transport, status, or decode failures.
    fn update(&self, id: &str, doc: &NewDocument) -> Result<StoredDocument, StoreError>;

    /// Delete a document. Deleting an absent document succeeds.
    ///
    /// # Errors
    ///
    /// Transport or status failures other than "not found".
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn list(
        &self,
        doc_type: &str,
        key: Option<&BusinessKey>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        (**self).list(doc_type, key)
    }

    fn create(&self, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        (**self).create(doc)
    }

    fn update(&self, id: &str, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        (**self).update(id, doc)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Box<S> {
    fn list(
        &self,
        doc_type: &str,
        key: Option<&BusinessKey>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        (**self).list(doc_type, key)
    }

    fn create(&self, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        (**self).create(doc)
    }

    fn update(&self, id: &str, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        (**self).update(id, doc)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id)
    }
}
