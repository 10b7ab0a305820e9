//! `docket layout`: span layout of a report, from the store or a local file.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use docket_core::error::ErrorCode;
use docket_core::layout::ReportLayout;
use tracing::debug;

use super::{Context, read_report_file};
use crate::output::{CliError, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Report date to fetch from the store (YYYY-MM-DD).
    #[arg(required_unless_present = "file")]
    pub date: Option<String>,

    /// Lay out rows from a JSON file instead; no store access.
    #[arg(long, conflicts_with = "date")]
    pub file: Option<PathBuf>,
}

/// Execute `docket layout`.
///
/// # Errors
///
/// Returns an error if the input cannot be read or output fails.
pub fn run_layout(args: &LayoutArgs, ctx: &Context) -> Result<()> {
    let layout = match (&args.file, &args.date) {
        (Some(path), _) => {
            let report = read_report_file(path)?;
            debug!(path = %path.display(), rows = report.items.len(), "laying out file");
            ReportLayout::new(report.key(), report.items)
        }
        (None, Some(date)) => {
            let key = ctx.report_key(date)?;
            ctx.book()
                .layout(&key)
                .map_err(|err| ctx.store_failure(&err))?
                .ok_or_else(|| {
                    ctx.fail(&CliError::coded(
                        format!("no report for {key}"),
                        ErrorCode::DocumentNotFound,
                    ))
                })?
        }
        (None, None) => {
            return Err(ctx.fail(&CliError::new("give a report date or --file")));
        }
    };

    render_mode(
        ctx.output,
        &layout,
        |layout, w| render_text(layout, w),
        |layout, w| render_pretty(layout, w),
    )
}

fn render_text(layout: &ReportLayout, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "row\tordinal\tspan\tstart\tend\tgroup")?;
    for (i, cell) in layout.cells.iter().enumerate() {
        writeln!(
            w,
            "{i}\t{}\t{}\t{}\t{}\t{}",
            cell.ordinal,
            cell.span,
            u8::from(cell.is_start),
            u8::from(cell.is_end),
            cell.group_id
        )?;
    }
    Ok(())
}

fn render_pretty(layout: &ReportLayout, w: &mut dyn Write) -> std::io::Result<()> {
    let title = layout
        .key
        .as_ref()
        .map_or_else(|| "Layout".to_string(), |key| format!("Layout {key}"));
    pretty_section(
        w,
        &format!("{title}: {} rows in {} groups", layout.rows.len(), layout.groups.len()),
    )?;
    for (group, rows) in layout.runs() {
        let label = if group.group_id.is_empty() {
            "(ungrouped)"
        } else {
            group.group_id.as_str()
        };
        writeln!(w, "{:>3}. {label}  [{} row(s)]", group.ordinal, group.len)?;
        for row in rows {
            writeln!(
                w,
                "       {:<10} {:<28} {}",
                row.item_code,
                row.item_name,
                row.display_action()
            )?;
        }
    }
    pretty_rule(w)
}
