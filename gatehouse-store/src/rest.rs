//! REST document-collection client.
//!
//! Wire contract (JSON over HTTP):
//!
//! ```text
//! GET    {base}/{collection}/{key}              -> 200 record | 404
//! PATCH  {base}/{collection}/{key}              -> 200 (merge upsert, creates)
//! PATCH  {base}/{collection}/{key}?exists=true  -> 200 | 404 (update-only)
//! DELETE {base}/{collection}/{key}              -> 200 | 404
//! GET    {base}/{collection}                    -> 200 {"documents": [...]}
//! POST   {base}/{collection}:commit             -> 200 (atomic batch)
//! ```
//!
//! The server applies a `:commit` batch transactionally; this client never
//! retries on its own, callers decide retry policy.

use std::time::Duration;

use serde::Deserialize;

use gatehouse_core::config::StoreConfig;
use gatehouse_core::{AccessRecord, EmailKey, RecordPatch, WriteOp};

use crate::error::{decode_err, transport_err, StoreError};
use crate::store::RecordStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestStore {
    agent: ureq::Agent,
    base_url: String,
    collection: String,
    bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<AccessRecord>,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .timeout_write(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.collection)
    }

    fn document_url(&self, key: &EmailKey) -> String {
        format!("{}/{}", self.collection_url(), key)
    }

    fn authorize(&self, req: ureq::Request) -> ureq::Request {
        match &self.bearer_token {
            Some(token) => req.set("authorization", &format!("Bearer {token}")),
            None => req,
        }
    }
}

impl RecordStore for RestStore {
    fn get(&self, key: &EmailKey) -> Result<Option<AccessRecord>, StoreError> {
        let req = self.authorize(self.agent.get(&self.document_url(key)));
        match req.call() {
            Ok(resp) => {
                let record = resp
                    .into_json::<AccessRecord>()
                    .map_err(|e| decode_err(e.to_string()))?;
                Ok(Some(record))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(ureq::Error::Status(code, resp)) => Err(status_err(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }

    fn upsert(&self, key: &EmailKey, patch: &RecordPatch) -> Result<(), StoreError> {
        let req = self.authorize(self.agent.request("PATCH", &self.document_url(key)));
        match req.send_json(patch) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => Err(status_err(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }

    fn set_avatar(&self, key: &EmailKey, avatar_url: &str) -> Result<(), StoreError> {
        // `exists=true` is the update-only precondition: the server answers
        // 404 instead of creating a document.
        let url = format!("{}?exists=true", self.document_url(key));
        let patch = RecordPatch {
            avatar_url: Some(avatar_url.to_string()),
            ..Default::default()
        };
        match self.authorize(self.agent.request("PATCH", &url)).send_json(&patch) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(404, _)) => {
                Err(StoreError::MissingRecord { key: key.clone() })
            }
            Err(ureq::Error::Status(code, resp)) => Err(status_err(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }

    fn delete(&self, key: &EmailKey) -> Result<bool, StoreError> {
        let req = self.authorize(self.agent.delete(&self.document_url(key)));
        match req.call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(ureq::Error::Status(code, resp)) => Err(status_err(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }

    fn list(&self) -> Result<Vec<AccessRecord>, StoreError> {
        let req = self.authorize(self.agent.get(&self.collection_url()));
        match req.call() {
            Ok(resp) => {
                let list = resp
                    .into_json::<DocumentList>()
                    .map_err(|e| decode_err(e.to_string()))?;
                let mut records = list.documents;
                records.sort_by(|a, b| a.key.cmp(&b.key));
                Ok(records)
            }
            Err(ureq::Error::Status(code, resp)) => Err(status_err(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }

    fn commit(&self, batch: &[WriteOp]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let url = format!("{}:commit", self.collection_url());
        let body = serde_json::json!({ "writes": batch });
        match self.authorize(self.agent.post(&url)).send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => Err(status_err(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }
}

/// Map a non-2xx response to [`StoreError::Http`], keeping the first line of
/// the body as detail.
pub(crate) fn status_err(status: u16, resp: ureq::Response) -> StoreError {
    let body = resp.into_string().unwrap_or_default();
    StoreError::Http {
        status,
        detail: first_line_truncated(&body),
    }
}

fn first_line_truncated(body: &str) -> String {
    const MAX: usize = 200;
    let line = body.lines().next().unwrap_or("").trim();
    if line.len() <= MAX {
        return line.to_string();
    }
    let mut end = MAX;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    line[..end].to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestStore {
        RestStore::new(&StoreConfig {
            base_url: "http://records.test/v1/".to_string(),
            collection: "whitelist".to_string(),
            bearer_token: None,
        })
    }

    #[test]
    fn urls_are_built_from_config() {
        let store = store();
        assert_eq!(store.collection_url(), "http://records.test/v1/whitelist");
        assert_eq!(
            store.document_url(&EmailKey::from("Ada@Co.Com ")),
            "http://records.test/v1/whitelist/ada@co.com",
            "document URL must carry the normalized key"
        );
    }

    #[test]
    fn commit_wire_body_shape() {
        let batch = vec![
            WriteOp::Upsert {
                key: EmailKey::from("ada@co.com"),
                patch: RecordPatch {
                    name: Some("Ada".to_string()),
                    ..Default::default()
                },
            },
            WriteOp::Delete { key: EmailKey::from("gone@co.com") },
        ];
        let body = serde_json::json!({ "writes": batch });
        assert_eq!(body["writes"][0]["upsert"]["key"], "ada@co.com");
        assert_eq!(body["writes"][1]["delete"]["key"], "gone@co.com");
    }

    #[test]
    fn detail_keeps_first_line_and_respects_char_boundaries() {
        assert_eq!(first_line_truncated("bad request\nsecond line"), "bad request");
        let long = "é".repeat(300);
        let truncated = first_line_truncated(&long);
        assert!(truncated.len() <= 200);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
