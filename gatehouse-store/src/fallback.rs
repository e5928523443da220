//! Secondary lookup used when the primary store is slow or failing.
//!
//! The transport is a plain document fetch authenticated with the caller's
//! own bearer token. A 404 maps to `Ok(None)` so "no record" stays a denial
//! rather than a fault.

use std::time::Duration;

use gatehouse_core::config::ResolverConfig;
use gatehouse_core::{AccessRecord, EmailKey};

use crate::error::{decode_err, transport_err, StoreError};
use crate::rest::status_err;

/// Record lookup over the fallback transport.
pub trait FallbackLookup: Send + Sync {
    fn fetch(&self, key: &EmailKey, bearer: &str) -> Result<Option<AccessRecord>, StoreError>;
}

/// `GET {fallback_base}/{collection}/{key}` with `Authorization: Bearer`.
pub struct RestFallback {
    agent: ureq::Agent,
    base_url: String,
    collection: String,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl RestFallback {
    pub fn new(config: &ResolverConfig, collection: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .timeout_write(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: config.fallback_base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        }
    }

    fn document_url(&self, key: &EmailKey) -> String {
        format!("{}/{}/{}", self.base_url, self.collection, key)
    }
}

impl FallbackLookup for RestFallback {
    fn fetch(&self, key: &EmailKey, bearer: &str) -> Result<Option<AccessRecord>, StoreError> {
        let req = self
            .agent
            .get(&self.document_url(key))
            .set("authorization", &format!("Bearer {bearer}"));
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
}
