//! REST client for the generic reports collection.
//!
//! ```text
//! GET    {base}/{collection}?type=T[&key=K]   list
//! POST   {base}/{collection}                  create   {type, payload}
//! PUT    {base}/{collection}/{id}             update   {type, payload}
//! DELETE {base}/{collection}/{id}             delete   (404 = already absent)
//! ```

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{DocumentStore, NewDocument, StoreError};
use crate::config::StoreConfig;
use crate::document::{BusinessKey, StoredDocument, normalize_list, normalize_single};

/// Longest error body kept in a [`StoreError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Blocking HTTP implementation of [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct HttpStore {
    agent: ureq::Agent,
    collection_url: String,
    token: Option<String>,
}

impl HttpStore {
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("docket/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            collection_url: collection_url(&config.base_url, &config.collection),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url, encode_segment(id))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }
}

impl DocumentStore for HttpStore {
    fn list(
        &self,
        doc_type: &str,
        key: Option<&BusinessKey>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let mut request = self
            .request("GET", &self.collection_url)
            .query("type", doc_type);
        if let Some(key) = key {
            request = request.query("key", key.as_str());
        }
        let body = read_body(request.call())?;
        let docs = normalize_list(parse_json(&body)?)?;
        debug!(doc_type, count = docs.len(), "listed documents");
        Ok(docs)
    }

    fn create(&self, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        let body = read_body(self.request("POST", &self.collection_url).send_json(doc))?;
        Ok(normalize_single(parse_json(&body)?)?)
    }

    fn update(&self, id: &str, doc: &NewDocument) -> Result<StoredDocument, StoreError> {
        let url = self.document_url(id);
        let body = read_body(self.request("PUT", &url).send_json(doc))?;
        // Any 2xx is an accepted update. An empty body or a bare
        // acknowledgement like `{"ok":true}` stands for the document as sent.
        let returned = parse_json(&body)
            .ok()
            .and_then(|value| normalize_single(value).ok());
        Ok(returned.unwrap_or_else(|| {
            debug!(id, "update acknowledged without a document");
            StoredDocument::new(id, doc.doc_type.clone(), doc.payload.clone())
        }))
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(id);
        match self.request("DELETE", &url).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(404, _)) => {
                debug!(id, "delete of absent document");
                Ok(())
            }
            Err(err) => Err(map_error(err)),
        }
    }
}

fn read_body(result: Result<ureq::Response, ureq::Error>) -> Result<String, StoreError> {
    result
        .map_err(map_error)?
        .into_string()
        .map_err(|err| StoreError::Transport(format!("failed to read response body: {err}")))
}

fn parse_json(body: &str) -> Result<Value, StoreError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body)?)
}

fn map_error(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(status, response) => {
            let mut body = response.into_string().unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
            StoreError::Status { status, body }
        }
        ureq::Error::Transport(transport) => StoreError::Transport(transport.to_string()),
    }
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

fn collection_url(base_url: &str, collection: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let collection = collection.trim().trim_matches('/');
    if collection.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{collection}")
    }
}

/// Percent-encode an id for use as one path segment.
fn encode_segment(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
