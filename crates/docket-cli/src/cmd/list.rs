//! `docket list`: one line per reconciled report.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use docket_core::layout::{layout_rows, run_groups};
use docket_core::timestamp::resolve_with_source;
use serde::Serialize;

use super::{Context, format_millis};
use crate::output::{pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list reports on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<String>,

    /// Only list reports that still have superseded duplicates.
    #[arg(long)]
    pub duplicates: bool,
}

#[derive(Debug, Serialize)]
pub struct ListEntry {
    pub key: String,
    pub id: String,
    pub rows: usize,
    pub groups: usize,
    pub effective_timestamp: i64,
    pub source: &'static str,
    pub superseded: usize,
}

/// Execute `docket list`.
///
/// # Errors
///
/// Returns an error if the store cannot be listed or output fails.
pub fn run_list(args: &ListArgs, ctx: &Context) -> Result<()> {
    let since = args
        .since
        .as_deref()
        .map(|raw| ctx.report_key(raw))
        .transpose()?;

    let records = ctx
        .book()
        .load_all()
        .map_err(|err| ctx.store_failure(&err))?;

    let entries: Vec<ListEntry> = records
        .into_values()
        .filter(|record| since.as_ref().is_none_or(|since| record.business_key >= *since))
        .filter(|record| !args.duplicates || !record.superseded.is_empty())
        .map(|record| {
            let (_, source) = resolve_with_source(&record.document);
            let groups = run_groups(&layout_rows(record.items())).len();
            ListEntry {
                key: record.business_key.to_string(),
                rows: record.items().len(),
                groups,
                effective_timestamp: record.effective_timestamp,
                source: source.as_str(),
                superseded: record.superseded.len(),
                id: record.document.id,
            }
        })
        .collect();

    render_mode(
        ctx.output,
        &entries,
        |entries, w| render_text(entries, w),
        |entries, w| render_pretty(entries, w),
    )
}

fn render_text(entries: &[ListEntry], w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "key\tid\trows\tgroups\tsaved\tsource\tsuperseded")?;
    for entry in entries {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            entry.key,
            entry.id,
            entry.rows,
            entry.groups,
            entry.effective_timestamp,
            entry.source,
            entry.superseded
        )?;
    }
    Ok(())
}

fn render_pretty(entries: &[ListEntry], w: &mut dyn Write) -> std::io::Result<()> {
    if entries.is_empty() {
        return writeln!(w, "No reports found.");
    }
    pretty_section(w, &format!("Reports ({})", entries.len()))?;
    for entry in entries {
        let dupes = if entry.superseded > 0 {
            format!("  (+{} superseded)", entry.superseded)
        } else {
            String::new()
        };
        writeln!(
            w,
            "{}  {:>4} rows in {:>3} groups  {}  [{}]{dupes}",
            entry.key,
            entry.rows,
            entry.groups,
            format_millis(entry.effective_timestamp),
            entry.source,
        )?;
    }
    pretty_rule(w)
}
