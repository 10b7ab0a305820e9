//! docket-core library.
//!
//! Reconciles a duplicated, unordered stream of report documents into one
//! canonical record per business key, lays report rows out in grouped runs,
//! saves edits safely against stores with partial update support, and
//! keeps an append-only change log beside the reports.
//!
//! # Conventions
//!
//! - **Errors**: Library operations return `thiserror` enums; `anyhow::Result`
//!   only where a file or the environment is read.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod audit;
pub mod book;
pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod layout;
pub mod merge;
pub mod save;
pub mod store;
pub mod timestamp;

pub use book::{ReportBook, ReportDraft};
pub use document::{BusinessKey, ReportPayload, Row, StoredDocument};
pub use store::{DocumentStore, HttpStore, MemoryStore};
