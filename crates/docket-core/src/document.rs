//! Stored documents, business keys, and report rows.
//!
//! The store hands back loosely shaped JSON: the same logical field shows up
//! under different names depending on which save path wrote it. Everything
//! is mapped onto one canonical schema here, at the store boundary, before
//! any reconciliation logic sees it.
//!
//! # Canonical document fields
//!
//! | canonical   | accepted aliases                                  |
//! |-------------|---------------------------------------------------|
//! | `id`        | `_id`, `{"$oid": …}`                              |
//! | `type`      | `kind`, `docType`                                 |
//! | `createdAt` | `created_at`, `createdOn`                         |
//! | `updatedAt` | `updated_at`, `modifiedAt`                        |
//! | `timestamp` | `ts`                                              |
//! | `payload`   | `data` (a JSON string payload is parsed)          |
//! | `savedAt`   | payload `savedAt`, `_savedAt`, `clientSavedAt`, `saved_at` |

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::timestamp::{RawInstant, TimeFields, resolve_timestamp};

const ID_FIELDS: &[&str] = &["id", "_id"];
const TYPE_FIELDS: &[&str] = &["type", "kind", "docType"];
const CREATED_FIELDS: &[&str] = &["createdAt", "created_at", "createdOn"];
const UPDATED_FIELDS: &[&str] = &["updatedAt", "updated_at", "modifiedAt"];
const TIMESTAMP_FIELDS: &[&str] = &["timestamp", "ts"];
const PAYLOAD_FIELDS: &[&str] = &["payload", "data"];
const SAVED_FIELDS: &[&str] = &["savedAt", "_savedAt", "clientSavedAt", "saved_at"];
const LIST_WRAPPERS: &[&str] = &["data", "items", "results"];

pub(crate) type AliasTable = &'static [(&'static str, &'static [&'static str])];

pub(crate) const REPORT_ALIASES: AliasTable = &[
    ("reportDate", &["report_date", "date"]),
    ("items", &["rows"]),
    ("savedAt", &["_savedAt", "clientSavedAt", "saved_at"]),
];

const ROW_ALIASES: AliasTable = &[
    ("groupId", &["group_id", "boxGroupId"]),
    ("boxCode", &["box_code", "containerCode"]),
    ("boxName", &["box_name", "containerName"]),
    ("declaredQty", &["declared_qty", "quantity", "qty"]),
    ("location", &["loc"]),
    ("itemCode", &["item_code", "sku"]),
    ("itemName", &["item_name", "name"]),
    ("action", &["disposition"]),
    ("actionOther", &["action_other", "otherAction", "customAction"]),
];

/// Separator used when joining fields into composite keys.
pub const KEY_SEPARATOR: &str = "|";

/// Enumerated action value meaning "see the free-text field".
pub const OTHER_SENTINEL: &str = "Other";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A store response that cannot be mapped onto the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("document has no id")]
    MissingId,

    #[error("response is not a document list")]
    NotAList,
}

// ---------------------------------------------------------------------------
// StoredDocument
// ---------------------------------------------------------------------------

/// A document as kept by the external store, with its payload decoded to `P`.
///
/// `P` is [`Value`] at the store boundary and a typed payload such as
/// [`ReportPayload`] once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument<P = Value> {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub payload: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<RawInstant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<RawInstant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawInstant>,
    /// Client save timestamp lifted out of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<RawInstant>,
}

impl<P> StoredDocument<P> {
    /// A document with no timestamp fields.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            payload,
            created_at: None,
            updated_at: None,
            timestamp: None,
            saved_at: None,
        }
    }

    #[must_use]
    pub fn with_created_at(mut self, raw: impl Into<RawInstant>) -> Self {
        self.created_at = Some(raw.into());
        self
    }

    #[must_use]
    pub fn with_updated_at(mut self, raw: impl Into<RawInstant>) -> Self {
        self.updated_at = Some(raw.into());
        self
    }

    #[must_use]
    pub fn with_saved_at(mut self, raw: impl Into<RawInstant>) -> Self {
        self.saved_at = Some(raw.into());
        self
    }

    /// Resolved effective timestamp in epoch milliseconds (0 = unknown).
    #[must_use]
    pub fn effective_timestamp(&self) -> i64 {
        resolve_timestamp(self)
    }

    /// Replace the payload, keeping id, type and timestamps.
    pub fn try_map_payload<Q, E>(
        self,
        f: impl FnOnce(P) -> Result<Q, E>,
    ) -> Result<StoredDocument<Q>, E> {
        Ok(StoredDocument {
            id: self.id,
            doc_type: self.doc_type,
            payload: f(self.payload)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            timestamp: self.timestamp,
            saved_at: self.saved_at,
        })
    }
}

impl StoredDocument<Value> {
    /// Decode the payload as a report.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload is not a report object.
    pub fn into_report(self) -> Result<StoredDocument<ReportPayload>, serde_json::Error> {
        self.try_map_payload(ReportPayload::from_value)
    }
}

impl<P> TimeFields for StoredDocument<P> {
    fn created_at(&self) -> Option<&RawInstant> {
        self.created_at.as_ref()
    }

    fn updated_at(&self) -> Option<&RawInstant> {
        self.updated_at.as_ref()
    }

    fn timestamp(&self) -> Option<&RawInstant> {
        self.timestamp.as_ref()
    }

    fn object_id(&self) -> &str {
        &self.id
    }

    fn saved_at(&self) -> Option<&RawInstant> {
        self.saved_at.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Wire normalization
// ---------------------------------------------------------------------------

/// Map one raw store document onto the canonical schema.
///
/// # Errors
///
/// Returns [`NormalizeError::NotAnObject`] for non-objects and
/// [`NormalizeError::MissingId`] when no usable id is present.
pub fn normalize_document(value: Value) -> Result<StoredDocument, NormalizeError> {
    let Value::Object(mut obj) = value else {
        return Err(NormalizeError::NotAnObject);
    };

    let id = take_first(&mut obj, ID_FIELDS)
        .and_then(|v| id_text(&v))
        .filter(|id| !id.trim().is_empty())
        .ok_or(NormalizeError::MissingId)?;
    let doc_type = take_first(&mut obj, TYPE_FIELDS)
        .map(|v| scalar_text(&v))
        .unwrap_or_default();
    let created_at = take_first(&mut obj, CREATED_FIELDS).and_then(|v| RawInstant::from_json(&v));
    let updated_at = take_first(&mut obj, UPDATED_FIELDS).and_then(|v| RawInstant::from_json(&v));
    let timestamp = take_first(&mut obj, TIMESTAMP_FIELDS).and_then(|v| RawInstant::from_json(&v));
    let payload = take_first(&mut obj, PAYLOAD_FIELDS)
        .map(parse_embedded_json)
        .unwrap_or(Value::Null);
    let saved_at = payload
        .as_object()
        .and_then(|p| SAVED_FIELDS.iter().find_map(|f| p.get(*f)))
        .and_then(RawInstant::from_json);

    Ok(StoredDocument {
        id,
        doc_type,
        payload,
        created_at,
        updated_at,
        timestamp,
        saved_at,
    })
}

/// Normalize a single-document response, unwrapping a `{"data": {...}}`
/// envelope when present.
///
/// # Errors
///
/// Same as [`normalize_document`].
pub fn normalize_single(value: Value) -> Result<StoredDocument, NormalizeError> {
    let value = match value {
        Value::Object(mut obj)
            if !ID_FIELDS.iter().any(|f| obj.contains_key(*f))
                && obj.get("data").is_some_and(Value::is_object) =>
        {
            obj.remove("data").unwrap_or_default()
        }
        other => other,
    };
    normalize_document(value)
}

/// Normalize a list response: a bare array, or one wrapped in `data`,
/// `items` or `results`. Malformed entries are skipped with a warning.
///
/// # Errors
///
/// Returns [`NormalizeError::NotAList`] when no list can be found.
pub fn normalize_list(value: Value) -> Result<Vec<StoredDocument>, NormalizeError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut obj) => LIST_WRAPPERS
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or(NormalizeError::NotAList)?,
        _ => return Err(NormalizeError::NotAList),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match normalize_document(item) {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!(error = %err, "skipping malformed document in store listing");
                None
            }
        })
        .collect())
}

fn take_first(obj: &mut Map<String, Value>, fields: &[&str]) -> Option<Value> {
    fields
        .iter()
        .find(|f| obj.get(**f).is_some_and(|v| !v.is_null()))
        .and_then(|f| obj.remove(*f))
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(inner) => inner.get("$oid").map(scalar_text),
        Value::String(_) | Value::Number(_) => Some(scalar_text(value)),
        _ => None,
    }
}

fn parse_embedded_json(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

pub(crate) fn apply_aliases(obj: &mut Map<String, Value>, table: AliasTable) {
    for (canonical, aliases) in table {
        if obj.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = aliases.iter().find_map(|alias| obj.remove(*alias)) {
            obj.insert((*canonical).to_string(), value);
        }
    }
}

/// Text of a scalar JSON value; empty for null, arrays and objects.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(scalar_text(&Value::deserialize(de)?))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(de)?
        .map(|v| scalar_text(&v))
        .filter(|s| !s.trim().is_empty()))
}

pub(crate) fn lenient_opt_instant<'de, D: Deserializer<'de>>(
    de: D,
) -> Result<Option<RawInstant>, D::Error> {
    Ok(Option::<Value>::deserialize(de)?.and_then(|v| RawInstant::from_json(&v)))
}

// ---------------------------------------------------------------------------
// BusinessKey
// ---------------------------------------------------------------------------

/// Identifies "the same logical record" across many stored documents.
///
/// Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessKey(String);

impl BusinessKey {
    /// A key from arbitrary text; `None` when blank.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// A calendar-date key normalized to `YYYY-MM-DD`.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, and any string starting with a
    /// `YYYY-MM-DD` date followed by `T` or a space (RFC 3339 and friends).
    #[must_use]
    pub fn date(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
            .ok()
            .or_else(|| {
                let (head, rest) = trimmed.split_at_checked(10)?;
                if !rest.starts_with(['T', ' ']) {
                    return None;
                }
                NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
            })?;
        Some(Self(date.format("%Y-%m-%d").to_string()))
    }

    /// A date key when `raw` looks like a date, otherwise the trimmed text.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::date(raw).or_else(|| Self::new(raw))
    }

    /// Join trimmed parts with [`KEY_SEPARATOR`]; `None` when all are blank.
    #[must_use]
    pub fn composite<I, S>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = parts
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .collect();
        if parts.iter().all(String::is_empty) {
            return None;
        }
        Some(Self(parts.join(KEY_SEPARATOR)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BusinessKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Report payload and rows
// ---------------------------------------------------------------------------

/// Payload of a report document: a date and its ordered rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub report_date: String,
    #[serde(default)]
    pub items: Vec<Row>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_instant"
    )]
    pub saved_at: Option<RawInstant>,
    /// Fields this crate does not interpret, written back unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ReportPayload {
    /// Decode a raw payload, mapping field aliases first.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload is not an object or a row is
    /// not an object.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(obj) = &mut value {
            apply_aliases(obj, REPORT_ALIASES);
            if let Some(Value::Array(items)) = obj.get_mut("items") {
                for item in items.iter_mut() {
                    if let Value::Object(row) = item {
                        apply_aliases(row, ROW_ALIASES);
                    }
                }
            }
        }
        serde_json::from_value(value)
    }

    /// The report's date key, if the date parses.
    #[must_use]
    pub fn key(&self) -> Option<BusinessKey> {
        BusinessKey::date(&self.report_date)
    }
}

/// One line of a report: a child item, optionally inside a parent box.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub group_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub box_code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub box_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub declared_qty: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action_other: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Row {
    /// Group key synthesized from the box fields when `group_id` is absent.
    ///
    /// Empty when every box field is blank.
    #[must_use]
    pub fn fallback_group_key(&self) -> String {
        let parts = [
            &self.box_code,
            &self.box_name,
            &self.declared_qty,
            &self.location,
        ]
        .map(|part| part.trim());
        if parts.iter().all(|part| part.is_empty()) {
            return String::new();
        }
        parts.join(KEY_SEPARATOR)
    }

    /// The explicit group id when non-blank, otherwise the fallback key.
    #[must_use]
    pub fn effective_group_key(&self) -> String {
        match self.group_id.as_deref().map(str::trim) {
            Some(gid) if !gid.is_empty() => gid.to_string(),
            _ => self.fallback_group_key(),
        }
    }

    /// Lower-cased identity of the row's content, stable across edits of its
    /// action. Empty when the identifying fields are all blank.
    #[must_use]
    pub fn content_key(&self) -> String {
        let parts = [&self.box_code, &self.item_code, &self.item_name].map(|part| part.trim());
        if parts.iter().all(|part| part.is_empty()) {
            return String::new();
        }
        parts.join(KEY_SEPARATOR).to_lowercase()
    }

    /// The action as shown to users: the free-text value stands in for the
    /// `Other` sentinel. Whitespace is collapsed.
    #[must_use]
    pub fn display_action(&self) -> String {
        let shown = if self.action.trim().eq_ignore_ascii_case(OTHER_SENTINEL)
            && !self.action_other.trim().is_empty()
        {
            &self.action_other
        } else {
            &self.action
        };
        shown.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_mongo_style_document() {
        let doc = normalize_document(json!({
            "_id": {"$oid": "507f191e810c19729de860ea"},
            "kind": "daily-report",
            "created_at": "2024-01-01T08:00:00Z",
            "data": {"reportDate": "2024-01-01", "items": [], "_savedAt": 123}
        }))
        .expect("normalize");

        assert_eq!(doc.id, "507f191e810c19729de860ea");
        assert_eq!(doc.doc_type, "daily-report");
        assert_eq!(doc.created_at, Some(RawInstant::from("2024-01-01T08:00:00Z")));
        assert_eq!(doc.saved_at, Some(RawInstant::Millis(123)));
        assert_eq!(doc.payload["reportDate"], "2024-01-01");
    }

    #[test]
    fn canonical_name_wins_over_alias() {
        let doc = normalize_document(json!({
            "id": "a",
            "_id": "b",
            "type": "t",
            "createdAt": 5,
            "created_at": 9,
            "payload": {}
        }))
        .expect("normalize");
        assert_eq!(doc.id, "a");
        assert_eq!(doc.created_at, Some(RawInstant::Millis(5)));
    }

    #[test]
    fn null_field_falls_back_to_alias() {
        let doc = normalize_document(json!({"id": "a", "createdAt": null, "created_at": 9}))
            .expect("normalize");
        assert_eq!(doc.created_at, Some(RawInstant::Millis(9)));
        assert_eq!(doc.payload, Value::Null);
    }

    #[test]
    fn string_payload_is_parsed() {
        let doc = normalize_document(json!({
            "id": 17,
            "type": "t",
            "payload": "{\"reportDate\":\"2024-02-02\"}"
        }))
        .expect("normalize");
        assert_eq!(doc.id, "17");
        assert_eq!(doc.payload["reportDate"], "2024-02-02");
    }

    #[test]
    fn missing_id_is_rejected() {
        assert_eq!(
            normalize_document(json!({"type": "t"})),
            Err(NormalizeError::MissingId)
        );
        assert_eq!(
            normalize_document(json!({"id": "  "})),
            Err(NormalizeError::MissingId)
        );
        assert_eq!(normalize_document(json!([1])), Err(NormalizeError::NotAnObject));
    }

    #[test]
    fn list_accepts_wrappers_and_skips_malformed() {
        let bare = normalize_list(json!([{"id": "a"}, {"type": "no-id"}, 7])).expect("list");
        assert_eq!(bare.len(), 1);

        let wrapped = normalize_list(json!({"results": [{"id": "a"}, {"id": "b"}]})).expect("list");
        assert_eq!(wrapped.len(), 2);

        assert!(normalize_list(Value::Null).expect("list").is_empty());
        assert_eq!(
            normalize_list(json!({"count": 0})),
            Err(NormalizeError::NotAList)
        );
    }

    #[test]
    fn single_unwraps_data_envelope() {
        let doc = normalize_single(json!({"data": {"id": "x", "type": "t", "payload": {}}}))
            .expect("single");
        assert_eq!(doc.id, "x");

        // `data` as a payload alias is left alone when an id is present.
        let doc = normalize_single(json!({"id": "y", "data": {"k": 1}})).expect("single");
        assert_eq!(doc.id, "y");
        assert_eq!(doc.payload["k"], 1);
    }

    #[test]
    fn report_payload_maps_aliases() {
        let payload = ReportPayload::from_value(json!({
            "date": "2024-03-04",
            "rows": [{
                "group_id": "G1",
                "containerCode": "BX-1",
                "quantity": 12,
                "sku": "A-100",
                "disposition": "Other",
                "customAction": "Return to vendor",
                "note": "fragile"
            }],
            "clientSavedAt": "2024-03-04T10:00:00Z",
            "author": "kim"
        }))
        .expect("decode");

        assert_eq!(payload.report_date, "2024-03-04");
        assert_eq!(payload.saved_at, Some(RawInstant::from("2024-03-04T10:00:00Z")));
        assert_eq!(payload.extra["author"], "kim");
        let row = &payload.items[0];
        assert_eq!(row.group_id.as_deref(), Some("G1"));
        assert_eq!(row.box_code, "BX-1");
        assert_eq!(row.declared_qty, "12");
        assert_eq!(row.item_code, "A-100");
        assert_eq!(row.display_action(), "Return to vendor");
        assert_eq!(row.extra["note"], "fragile");
    }

    #[test]
    fn blank_group_id_reads_as_none() {
        let payload = ReportPayload::from_value(json!({"items": [{"groupId": "   "}]}))
            .expect("decode");
        assert_eq!(payload.items[0].group_id, None);
    }

    #[test]
    fn report_payload_round_trips_extra_fields() {
        let payload = ReportPayload::from_value(json!({
            "reportDate": "2024-03-04",
            "items": [],
            "signature": {"by": "kim"}
        }))
        .expect("decode");
        let back = serde_json::to_value(&payload).expect("encode");
        assert_eq!(back["signature"]["by"], "kim");
        assert_eq!(back["reportDate"], "2024-03-04");
    }

    #[test]
    fn date_keys_normalize() {
        for raw in [
            "2024-01-01",
            " 2024-01-01 ",
            "2024/01/01",
            "2024-01-01T09:30:00Z",
            "2024-01-01 09:30",
        ] {
            assert_eq!(
                BusinessKey::date(raw).map(|k| k.to_string()),
                Some("2024-01-01".to_string()),
                "{raw}"
            );
        }
        for raw in ["", "2024-13-01", "yesterday", "2024-01-01x", "01/02/2024"] {
            assert_eq!(BusinessKey::date(raw), None, "{raw}");
        }
    }

    #[test]
    fn composite_keys_join_trimmed_parts() {
        assert_eq!(
            BusinessKey::composite([" WH1 ", "2024-01-01", ""]).map(|k| k.to_string()),
            Some("WH1|2024-01-01|".to_string())
        );
        assert_eq!(BusinessKey::composite(["", "  "]), None);
        assert_eq!(BusinessKey::parse("dock-7").map(|k| k.to_string()), Some("dock-7".into()));
        assert_eq!(BusinessKey::new("  "), None);
    }

    #[test]
    fn fallback_group_key_joins_box_fields() {
        let row = Row {
            box_code: "BX-1".into(),
            declared_qty: " 4 ".into(),
            ..Row::default()
        };
        assert_eq!(row.fallback_group_key(), "BX-1||4|");
        assert_eq!(row.effective_group_key(), "BX-1||4|");
        assert_eq!(Row::default().fallback_group_key(), "");
    }

    #[test]
    fn explicit_group_id_wins() {
        let row = Row {
            group_id: Some(" G-9 ".into()),
            box_code: "BX-1".into(),
            ..Row::default()
        };
        assert_eq!(row.effective_group_key(), "G-9");
    }

    #[test]
    fn content_key_is_lowercased() {
        let row = Row {
            box_code: "BX-1".into(),
            item_code: " A-100 ".into(),
            item_name: "Widget".into(),
            ..Row::default()
        };
        assert_eq!(row.content_key(), "bx-1|a-100|widget");
        assert_eq!(Row::default().content_key(), "");
    }

    #[test]
    fn display_action_uses_sentinel_substitution() {
        let mut row = Row {
            action: "other".into(),
            action_other: "  send   back ".into(),
            ..Row::default()
        };
        assert_eq!(row.display_action(), "send back");

        row.action_other.clear();
        assert_eq!(row.display_action(), "other");

        row.action = " Scrap  it ".into();
        row.action_other = "ignored".into();
        assert_eq!(row.display_action(), "Scrap it");
    }
}
