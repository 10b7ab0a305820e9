//! Write-back of a canonical record to a store with uneven update support.
//!
//! Some store deployments accept create, read and delete but not update.
//! Saving runs an ordered list of [`SaveStrategy`] values until one
//! succeeds:
//!
//! 1. [`UpdateInPlace`]: `PUT` the previous document, when one is known and
//!    updates are enabled.
//! 2. [`CreateNew`]: `POST` a fresh document with the full payload.
//!
//! When a fresh document replaced a previous one, the previous id is deleted
//! best-effort. A failed delete leaves an orphan: it is logged and reported
//! in the [`SaveAck`], but the save still succeeds because the newer document
//! wins on the next read. If every strategy fails, nothing is reported as
//! saved.
//!
//! Nothing here is atomic. Two concurrent saves for one key race and the
//! last response to land wins.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SaveConfig, UpdateMode};
use crate::document::{BusinessKey, StoredDocument};
use crate::error::ErrorCode;
use crate::store::{DocumentStore, NewDocument, StoreError};

/// Everything needed to write one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub key: BusinessKey,
    pub document: NewDocument,
    /// Id of the current canonical document for the key, if any.
    pub previous: Option<String>,
    /// Ids of older duplicates of the key.
    pub superseded: Vec<String>,
}

/// How the record reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Updated,
    Created,
}

/// A superseded document that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub id: String,
    pub reason: String,
}

/// Acknowledgement of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveAck {
    pub key: BusinessKey,
    pub document: StoredDocument,
    pub mode: SaveMode,
    pub strategy: &'static str,
    /// Superseded ids removed by cleanup.
    pub deleted: Vec<String>,
    /// Superseded ids cleanup could not remove.
    pub orphans: Vec<Orphan>,
}

impl SaveAck {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// One failed strategy attempt.
#[derive(Debug)]
pub struct FailedAttempt {
    pub strategy: &'static str,
    pub error: StoreError,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// No strategy managed to write the record.
    #[error("save of {key} failed after {} attempt(s): {}", .attempts.len(), describe(.attempts))]
    AllStrategiesFailed {
        key: BusinessKey,
        attempts: Vec<FailedAttempt>,
    },

    /// The current record could not be read before writing.
    #[error("could not read current record for {key}: {source}")]
    Lookup {
        key: BusinessKey,
        #[source]
        source: StoreError,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SaveError {
    /// Whether retrying later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AllStrategiesFailed { attempts, .. } => {
                attempts.iter().any(|attempt| attempt.error.is_retryable())
            }
            Self::Lookup { source, .. } => source.is_retryable(),
            Self::Encode(_) => false,
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AllStrategiesFailed { attempts, .. } => {
                if attempts.iter().all(|attempt| attempt.error.is_retryable()) {
                    ErrorCode::StoreUnreachable
                } else {
                    ErrorCode::SaveFailed
                }
            }
            Self::Lookup { source, .. } => source.code(),
            Self::Encode(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Short status line for end users.
    #[must_use]
    pub fn user_message(&self) -> String {
        let key = match self {
            Self::AllStrategiesFailed { key, .. } | Self::Lookup { key, .. } => key.as_str(),
            Self::Encode(_) => return "Could not prepare the report for saving.".to_string(),
        };
        if self.is_retryable() {
            format!("Could not reach the report store; {key} was not saved. Try again.")
        } else {
            format!("The report store refused to save {key}. Your edits are kept.")
        }
    }
}

fn describe(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.strategy, attempt.error))
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of getting a record into the store.
pub trait SaveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn mode(&self) -> SaveMode;

    /// Whether this strategy can run for `request` at all.
    fn applies(&self, request: &SaveRequest) -> bool;

    /// # Errors
    ///
    /// The store's error for this attempt.
    fn attempt(
        &self,
        store: &dyn DocumentStore,
        request: &SaveRequest,
    ) -> Result<StoredDocument, StoreError>;
}

/// `PUT` over the previous document.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateInPlace;

impl SaveStrategy for UpdateInPlace {
    fn name(&self) -> &'static str {
        "update-in-place"
    }

    fn mode(&self) -> SaveMode {
        SaveMode::Updated
    }

    fn applies(&self, request: &SaveRequest) -> bool {
        request.previous.is_some()
    }

    fn attempt(
        &self,
        store: &dyn DocumentStore,
        request: &SaveRequest,
    ) -> Result<StoredDocument, StoreError> {
        let id = request
            .previous
            .as_deref()
            .ok_or_else(|| StoreError::NotFound(request.key.to_string()))?;
        store.update(id, &request.document)
    }
}

/// `POST` a brand-new document.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateNew;

impl SaveStrategy for CreateNew {
    fn name(&self) -> &'static str {
        "create-new"
    }

    fn mode(&self) -> SaveMode {
        SaveMode::Created
    }

    fn applies(&self, _request: &SaveRequest) -> bool {
        true
    }

    fn attempt(
        &self,
        store: &dyn DocumentStore,
        request: &SaveRequest,
    ) -> Result<StoredDocument, StoreError> {
        store.create(&request.document)
    }
}

/// The strategy list for an update mode.
#[must_use]
pub fn standard_strategies(mode: UpdateMode) -> Vec<Box<dyn SaveStrategy>> {
    match mode {
        UpdateMode::Auto => vec![Box::new(UpdateInPlace), Box::new(CreateNew)],
        UpdateMode::Never => vec![Box::new(CreateNew)],
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs save strategies in order, then cleans up superseded documents.
pub struct SavePipeline<'s> {
    store: &'s dyn DocumentStore,
    strategies: Vec<Box<dyn SaveStrategy>>,
    prune_superseded: bool,
}

impl<'s> SavePipeline<'s> {
    #[must_use]
    pub fn new(store: &'s dyn DocumentStore, config: &SaveConfig) -> Self {
        Self {
            store,
            strategies: standard_strategies(config.update_mode),
            prune_superseded: config.prune_superseded,
        }
    }

    /// A pipeline with a caller-chosen strategy order.
    #[must_use]
    pub fn with_strategies(
        store: &'s dyn DocumentStore,
        strategies: Vec<Box<dyn SaveStrategy>>,
        prune_superseded: bool,
    ) -> Self {
        Self {
            store,
            strategies,
            prune_superseded,
        }
    }

    /// Write `request`, falling back through the strategies.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::AllStrategiesFailed`] when no strategy succeeds.
    pub fn save(&self, request: &SaveRequest) -> Result<SaveAck, SaveError> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            if !strategy.applies(request) {
                debug!(key = %request.key, strategy = strategy.name(), "strategy not applicable");
                continue;
            }
            match strategy.attempt(self.store, request) {
                Ok(document) => {
                    info!(
                        key = %request.key,
                        id = %document.id,
                        strategy = strategy.name(),
                        "saved"
                    );
                    let (deleted, orphans) = self.cleanup(request, strategy.mode(), &document.id);
                    return Ok(SaveAck {
                        key: request.key.clone(),
                        document,
                        mode: strategy.mode(),
                        strategy: strategy.name(),
                        deleted,
                        orphans,
                    });
                }
                Err(error) => {
                    warn!(
                        key = %request.key,
                        strategy = strategy.name(),
                        error = %error,
                        "save strategy failed"
                    );
                    attempts.push(FailedAttempt {
                        strategy: strategy.name(),
                        error,
                    });
                }
            }
        }

        Err(SaveError::AllStrategiesFailed {
            key: request.key.clone(),
            attempts,
        })
    }

    fn cleanup(
        &self,
        request: &SaveRequest,
        mode: SaveMode,
        new_id: &str,
    ) -> (Vec<String>, Vec<Orphan>) {
        let mut targets: Vec<&str> = Vec::new();
        if mode == SaveMode::Created
            && let Some(previous) = request.previous.as_deref()
        {
            targets.push(previous);
        }
        if self.prune_superseded {
            targets.extend(request.superseded.iter().map(String::as_str));
        }

        let mut deleted = Vec::new();
        let mut orphans = Vec::new();
        for id in targets {
            if id == new_id
                || deleted.iter().any(|d| d == id)
                || orphans.iter().any(|o: &Orphan| o.id == id)
            {
                continue;
            }
            match self.store.delete(id) {
                Ok(()) => deleted.push(id.to_string()),
                Err(error) => {
                    warn!(
                        key = %request.key,
                        id,
                        error = %error,
                        code = %ErrorCode::OrphanDocument,
                        "could not delete superseded document"
                    );
                    orphans.push(Orphan {
                        id: id.to_string(),
                        reason: error.to_string(),
                    });
                }
            }
        }
        (deleted, orphans)
    }
}
