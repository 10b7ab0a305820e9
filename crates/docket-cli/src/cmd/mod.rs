pub mod completions;
pub mod history;
pub mod layout;
pub mod list;
pub mod save;
pub mod show;

use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use docket_core::config::DocketConfig;
use docket_core::document::{BusinessKey, ReportPayload};
use docket_core::error::ErrorCode;
use docket_core::store::{HttpStore, StoreError};
use docket_core::ReportBook;
use serde_json::{Value, json};

use crate::output::{CliError, OutputMode, render_error};

/// Resolved configuration and output mode shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: DocketConfig,
    pub output: OutputMode,
}

impl Context {
    pub fn book(&self) -> ReportBook<HttpStore> {
        ReportBook::new(HttpStore::new(&self.config.store), &self.config)
    }

    /// Render `error` to stderr and turn it into the command's failure.
    pub fn fail(&self, error: &CliError) -> anyhow::Error {
        if let Err(render_err) = render_error(self.output, error) {
            return render_err;
        }
        anyhow::anyhow!("{}", error.message)
    }

    pub fn store_failure(&self, err: &StoreError) -> anyhow::Error {
        self.fail(&CliError::coded(err.to_string(), err.code()))
    }

    /// Parse a report date argument.
    pub fn report_key(&self, raw: &str) -> Result<BusinessKey> {
        BusinessKey::date(raw).ok_or_else(|| {
            self.fail(&CliError::coded(
                format!("not a report date: {raw:?}"),
                ErrorCode::MissingBusinessKey,
            ))
        })
    }
}

/// Read report rows from a JSON file.
///
/// Accepts a bare array of rows, a report payload object, or a stored
/// document wrapping one under `payload` or `data`.
pub fn read_report_file(path: &Path) -> Result<ReportPayload> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {} as JSON", path.display()))?;
    report_from_value(value).with_context(|| format!("{} is not a report", path.display()))
}

fn report_from_value(value: Value) -> Result<ReportPayload> {
    match value {
        Value::Array(rows) => Ok(ReportPayload::from_value(json!({ "items": rows }))?),
        Value::Object(mut obj) if !obj.contains_key("items") && !obj.contains_key("rows") => {
            match obj.remove("payload").or_else(|| obj.remove("data")) {
                Some(Value::String(embedded)) => report_from_value(serde_json::from_str(&embedded)?),
                Some(inner) => report_from_value(inner),
                None => Ok(ReportPayload::from_value(Value::Object(obj))?),
            }
        }
        other => Ok(ReportPayload::from_value(other)?),
    }
}

/// Epoch milliseconds as a UTC timestamp; `unknown` for zero.
pub fn format_millis(ms: i64) -> String {
    if ms <= 0 {
        return "unknown".to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_row_array_is_a_report() {
        let report =
            report_from_value(json!([{"sku": "S1", "disposition": "Keep"}])).expect("report");
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].item_code, "S1");
        assert_eq!(report.items[0].action, "Keep");
    }

    #[test]
    fn stored_document_is_unwrapped() {
        let report = report_from_value(json!({
            "_id": "x",
            "type": "daily-report",
            "data": "{\"date\":\"2024-02-02\",\"rows\":[{\"itemCode\":\"A\"}]}"
        }))
        .expect("report");
        assert_eq!(report.report_date, "2024-02-02");
        assert_eq!(report.items[0].item_code, "A");
    }

    #[test]
    fn payload_object_is_read_directly() {
        let report = report_from_value(json!({"reportDate": "2024-02-03", "items": []}))
            .expect("report");
        assert!(report.key().is_some());
    }

    #[test]
    fn non_report_is_an_error() {
        assert!(report_from_value(json!("nope")).is_err());
    }

    #[test]
    fn millis_format_as_utc() {
        assert_eq!(format_millis(1_717_200_000_000), "2024-06-01 00:00:00 UTC");
        assert_eq!(format_millis(0), "unknown");
    }
}
