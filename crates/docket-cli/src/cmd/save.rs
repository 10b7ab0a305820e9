//! `docket save`: write edited rows for one date back to the store.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use docket_core::ReportDraft;
use docket_core::book::{AuditStatus, SaveOutcome};
use tracing::warn;

use super::{Context, read_report_file};
use crate::output::{CliError, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Report date (YYYY-MM-DD).
    pub date: String,

    /// JSON file with the rows to save.
    #[arg(long)]
    pub file: PathBuf,
}

/// Execute `docket save <date> --file <rows.json>`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or no save strategy succeeds.
pub fn run_save(args: &SaveArgs, ctx: &Context) -> Result<()> {
    let key = ctx.report_key(&args.date)?;
    let report = read_report_file(&args.file)?;

    if let Some(file_key) = report.key()
        && file_key != key
    {
        warn!(file = %file_key, date = %key, "file date differs; saving under the given date");
    }

    let mut draft = ReportDraft::new(key, report.items);
    draft.extra = report.extra;
    draft.extra.retain(|_, value| !value.is_null());

    let outcome = ctx.book().save_report(&draft).map_err(|err| {
        let mut cli = CliError::coded(err.user_message(), err.code());
        cli.message = format!("{} ({err})", cli.message);
        ctx.fail(&cli)
    })?;

    render_mode(
        ctx.output,
        &outcome,
        |outcome, w| render_text(outcome, w),
        |outcome, w| render_pretty(outcome, w),
    )
}

fn audit_label(status: &AuditStatus) -> String {
    match status {
        AuditStatus::NoChanges => "no changes".to_string(),
        AuditStatus::Appended { total } => format!("appended ({total} entries)"),
        AuditStatus::Failed { reason } => format!("FAILED: {reason}"),
    }
}

fn render_text(outcome: &SaveOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{:?}\t{}\t{}",
        outcome.ack.key,
        outcome.ack.id(),
        outcome.ack.mode,
        outcome.changes.len(),
        audit_label(&outcome.audit)
    )
}

fn render_pretty(outcome: &SaveOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Saved {}", outcome.ack.key))?;
    pretty_kv(w, "id", outcome.ack.id())?;
    pretty_kv(w, "via", outcome.ack.strategy)?;
    if !outcome.ack.deleted.is_empty() {
        pretty_kv(w, "replaced", outcome.ack.deleted.join(", "))?;
    }
    for orphan in &outcome.ack.orphans {
        pretty_kv(w, "left over", format!("{} ({})", orphan.id, orphan.reason))?;
    }
    pretty_kv(w, "changes", outcome.changes.len().to_string())?;
    for change in &outcome.changes {
        writeln!(w, "  {}: {} -> {}", change.key, change.from, change.to)?;
    }
    pretty_kv(w, "history", audit_label(&outcome.audit))
}
