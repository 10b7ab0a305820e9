use std::io::Write;

use anyhow::Result;
use clap::Args;
use docket_core::audit::ChangeLogEntry;

use super::{Context, format_millis};
use crate::output::{CliError, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Report date (YYYY-MM-DD).
    pub date: String,
}

/// Execute `docket history <date>`.
///
/// # Errors
///
/// Returns an error if the date is invalid or the change log cannot be read.
pub fn run_history(args: &HistoryArgs, ctx: &Context) -> Result<()> {
    let key = ctx.report_key(&args.date)?;
    let entries = ctx
        .book()
        .history(&key)
        .map_err(|err| ctx.fail(&CliError::coded(err.to_string(), err.code())))?;

    render_mode(
        ctx.output,
        &entries,
        |entries, w| render_text(entries, w),
        |entries, w| render_pretty(&key.to_string(), entries, w),
    )
}

fn render_text(entries: &[ChangeLogEntry], w: &mut dyn Write) -> std::io::Result<()> {
    for entry in entries {
        writeln!(w, "{}\t{}\t{}\t{}", entry.at, entry.key, entry.from, entry.to)?;
    }
    Ok(())
}

fn render_pretty(key: &str, entries: &[ChangeLogEntry], w: &mut dyn Write) -> std::io::Result<()> {
    if entries.is_empty() {
        return writeln!(w, "No changes recorded for {key}.");
    }
    pretty_section(w, &format!("History {key} ({} changes)", entries.len()))?;
    for entry in entries {
        writeln!(
            w,
            "{}  {}: {} -> {}",
            format_millis(entry.at),
            entry.key,
            entry.from,
            entry.to
        )?;
    }
    pretty_rule(w)
}
