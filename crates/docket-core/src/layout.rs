//! Run-length grouping of report rows into merged table cells.
//!
//! Rows that share a parent (a box) sit in contiguous runs. For every row
//! this module emits a [`SpanCell`] telling a table renderer whether the
//! parent cell starts here, how many rows it spans, whether the run ends
//! here, and the run's 1-based ordinal. Interior rows carry `span == 0`
//! (their parent cell is merged into the run's first row).
//!
//! Invariants:
//!
//! - runs partition the rows: `sum(span of start cells) == rows.len()`
//! - a row with an empty key is always its own singleton run
//! - the ordinal increases by one per run, singleton or not

use serde::Serialize;

use crate::document::{BusinessKey, Row};

/// Layout metadata for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanCell {
    /// Rows covered by the merged cell; `0` on non-start rows.
    pub span: usize,
    pub is_start: bool,
    pub is_end: bool,
    /// 1-based run number, shared by every row of the run.
    pub ordinal: usize,
    /// Normalized group key of the run; empty for keyless singletons.
    pub group_id: String,
}

/// A maximal contiguous run of rows sharing one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunGroup {
    pub start: usize,
    pub len: usize,
    pub ordinal: usize,
    pub group_id: String,
}

impl RunGroup {
    /// Row indices covered by this run.
    #[must_use]
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Normalize a raw group key for comparison.
#[must_use]
pub fn normalize_group_id(raw: &str) -> &str {
    raw.trim()
}

/// Compute per-row span metadata for a sequence of group keys.
#[must_use]
pub fn group_spans<S: AsRef<str>>(keys: &[S]) -> Vec<SpanCell> {
    let mut cells = Vec::with_capacity(keys.len());
    let mut ordinal = 0;
    let mut i = 0;

    while i < keys.len() {
        let gid = normalize_group_id(keys[i].as_ref());
        ordinal += 1;

        if gid.is_empty() {
            cells.push(SpanCell {
                span: 1,
                is_start: true,
                is_end: true,
                ordinal,
                group_id: String::new(),
            });
            i += 1;
            continue;
        }

        let span = keys[i..]
            .iter()
            .take_while(|key| normalize_group_id(key.as_ref()) == gid)
            .count();
        for offset in 0..span {
            cells.push(SpanCell {
                span: if offset == 0 { span } else { 0 },
                is_start: offset == 0,
                is_end: offset + 1 == span,
                ordinal,
                group_id: gid.to_string(),
            });
        }
        i += span;
    }

    cells
}

/// Layout for report rows, using each row's explicit group id or, when
/// blank, its fallback key built from the box fields.
#[must_use]
pub fn layout_rows(rows: &[Row]) -> Vec<SpanCell> {
    let keys: Vec<String> = rows.iter().map(Row::effective_group_key).collect();
    group_spans(&keys)
}

/// Recover the run partition from a cell sequence.
#[must_use]
pub fn run_groups(cells: &[SpanCell]) -> Vec<RunGroup> {
    cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.is_start)
        .map(|(start, cell)| RunGroup {
            start,
            len: cell.span,
            ordinal: cell.ordinal,
            group_id: cell.group_id.clone(),
        })
        .collect()
}

/// Rows of one report together with their span layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<BusinessKey>,
    pub rows: Vec<Row>,
    pub cells: Vec<SpanCell>,
    pub groups: Vec<RunGroup>,
}

impl ReportLayout {
    #[must_use]
    pub fn new(key: Option<BusinessKey>, rows: Vec<Row>) -> Self {
        let cells = layout_rows(&rows);
        let groups = run_groups(&cells);
        Self {
            key,
            rows,
            cells,
            groups,
        }
    }

    /// Rows of each run, in order.
    pub fn runs(&self) -> impl Iterator<Item = (&RunGroup, &[Row])> {
        self.groups
            .iter()
            .map(|group| (group, &self.rows[group.range()]))
    }
}
