//! `docket show`: the canonical record for one date, rows grouped by box.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use docket_core::error::ErrorCode;
use docket_core::layout::layout_rows;
use docket_core::merge::CanonicalRecord;
use docket_core::timestamp::{parse_instant, resolve_with_source};
use serde::Serialize;

use super::{Context, format_millis};
use crate::output::{CliError, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Report date (YYYY-MM-DD).
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct ShowReport {
    pub key: String,
    pub id: String,
    pub effective_timestamp: i64,
    /// Which document field the timestamp came from.
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
    pub superseded: Vec<String>,
    pub rows: Vec<ShowRow>,
}

#[derive(Debug, Serialize)]
pub struct ShowRow {
    pub ordinal: usize,
    pub span: usize,
    pub group_id: String,
    pub box_code: String,
    pub box_name: String,
    pub declared_qty: String,
    pub location: String,
    pub item_code: String,
    pub item_name: String,
    pub action: String,
}

impl ShowReport {
    fn from_record(record: CanonicalRecord) -> Self {
        let (effective_timestamp, source) = resolve_with_source(&record.document);
        let saved_at = record
            .document
            .saved_at
            .as_ref()
            .or(record.document.payload.saved_at.as_ref())
            .and_then(parse_instant);
        let cells = layout_rows(record.items());
        let rows = record
            .items()
            .iter()
            .zip(cells)
            .map(|(row, cell)| ShowRow {
                ordinal: cell.ordinal,
                span: cell.span,
                group_id: cell.group_id,
                box_code: row.box_code.clone(),
                box_name: row.box_name.clone(),
                declared_qty: row.declared_qty.clone(),
                location: row.location.clone(),
                item_code: row.item_code.clone(),
                item_name: row.item_name.clone(),
                action: row.display_action(),
            })
            .collect();

        Self {
            key: record.business_key.to_string(),
            id: record.document.id,
            effective_timestamp,
            source: source.as_str(),
            saved_at,
            superseded: record.superseded,
            rows,
        }
    }
}

/// Execute `docket show <date>`.
///
/// # Errors
///
/// Returns an error if the date is invalid, the store fails, or no report
/// exists for the date.
pub fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    let key = ctx.report_key(&args.date)?;
    let record = ctx
        .book()
        .load(&key)
        .map_err(|err| ctx.store_failure(&err))?
        .ok_or_else(|| {
            ctx.fail(&CliError::coded(
                format!("no report for {key}"),
                ErrorCode::DocumentNotFound,
            ))
        })?;

    let report = ShowReport::from_record(record);
    render_mode(
        ctx.output,
        &report,
        |report, w| render_text(report, w),
        |report, w| render_pretty(report, w),
    )
}

fn render_text(report: &ShowReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}\t{}\t{}\t{}", report.key, report.id, report.effective_timestamp, report.source)?;
    for row in &report.rows {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.ordinal, row.span, row.box_code, row.item_code, row.item_name, row.action
        )?;
    }
    Ok(())
}

fn render_pretty(report: &ShowReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Report {}", report.key))?;
    pretty_kv(w, "id", &report.id)?;
    pretty_kv(
        w,
        "timestamp",
        format!("{} (from {})", format_millis(report.effective_timestamp), report.source),
    )?;
    if let Some(saved_at) = report.saved_at {
        pretty_kv(w, "saved", format_millis(saved_at))?;
    }
    if !report.superseded.is_empty() {
        pretty_kv(w, "superseded", report.superseded.join(", "))?;
    }
    writeln!(w)?;

    for row in &report.rows {
        if row.span > 0 {
            let parent = [&row.box_code, &row.box_name, &row.declared_qty, &row.location]
                .iter()
                .filter(|part| !part.trim().is_empty())
                .map(|part| part.trim())
                .collect::<Vec<_>>()
                .join(" / ");
            let parent = if parent.is_empty() { "(no box)" } else { &parent };
            writeln!(w, "{:>3}. {parent}", row.ordinal)?;
        }
        writeln!(w, "       {:<10} {:<28} {}", row.item_code, row.item_name, row.action)?;
    }
    pretty_rule(w)
}
