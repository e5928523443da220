//! Sign-in authorization against the record store.
//!
//! One `resolve` call per sign-in. The primary lookup is the record store,
//! raced against a timeout; when the store misbehaves (error or timeout) a
//! secondary document lookup gets one bounded attempt with the caller's own
//! bearer. A store that answers "no record" is authoritative: membership was
//! checked and the member is not on the list, so the fallback is never
//! consulted. Every remaining failure collapses into a denial; this function
//! has no error channel.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;

use gatehouse_core::{
    AccessRecord, EmailKey, Profile, VerifiedIdentity, DEFAULT_MEMBER_NAME,
};
use gatehouse_store::{FallbackLookup, RecordStore};

/// Default window for each lookup attempt.
pub const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_secs(10);

/// Answer to one sign-in check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl Resolution {
    fn denied() -> Self {
        Self {
            authorized: false,
            profile: None,
        }
    }

    fn granted(profile: Profile) -> Self {
        Self {
            authorized: true,
            profile: Some(profile),
        }
    }
}

enum PrimaryOutcome {
    Hit(AccessRecord),
    /// The store answered and the record does not exist.
    Miss,
    /// Error, timeout, or task failure; membership is still unknown.
    Unavailable,
}

pub struct Resolver {
    store: Arc<dyn RecordStore>,
    fallback: Arc<dyn FallbackLookup>,
    primary_timeout: Duration,
}

impl Resolver {
    pub fn new(store: Arc<dyn RecordStore>, fallback: Arc<dyn FallbackLookup>) -> Self {
        Self::with_timeout(store, fallback, DEFAULT_PRIMARY_TIMEOUT)
    }

    pub fn with_timeout(
        store: Arc<dyn RecordStore>,
        fallback: Arc<dyn FallbackLookup>,
        primary_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fallback,
            primary_timeout,
        }
    }

    /// Decide whether this identity may sign in.
    ///
    /// Dropping the returned future abandons the whole lookup; a blocking
    /// store call that already started runs to completion in the pool, but
    /// it only reads and its result is discarded.
    pub async fn resolve(&self, identity: &VerifiedIdentity) -> Resolution {
        let key = identity.key();
        if key.is_empty() {
            tracing::debug!("resolve called without an email, denying");
            return Resolution::denied();
        }

        match self.primary(&key).await {
            PrimaryOutcome::Hit(record) => {
                Resolution::granted(build_profile(&key, &record, identity))
            }
            PrimaryOutcome::Miss => {
                tracing::debug!(key = %key, "no record in the store, denied");
                Resolution::denied()
            }
            PrimaryOutcome::Unavailable => self.via_fallback(&key, identity).await,
        }
    }

    async fn primary(&self, key: &EmailKey) -> PrimaryOutcome {
        let store = Arc::clone(&self.store);
        let lookup_key = key.clone();
        let handle = tokio::task::spawn_blocking(move || store.get(&lookup_key));

        match timeout(self.primary_timeout, handle).await {
            Ok(Ok(Ok(Some(record)))) => PrimaryOutcome::Hit(record),
            Ok(Ok(Ok(None))) => PrimaryOutcome::Miss,
            Ok(Ok(Err(err))) => {
                tracing::warn!(key = %key, error = %err, "record store lookup failed");
                PrimaryOutcome::Unavailable
            }
            Ok(Err(join_err)) => {
                tracing::warn!(key = %key, error = %join_err, "record store lookup task failed");
                PrimaryOutcome::Unavailable
            }
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    timeout_ms = self.primary_timeout.as_millis() as u64,
                    "record store lookup timed out",
                );
                PrimaryOutcome::Unavailable
            }
        }
    }

    /// Secondary lookup with the caller's bearer, bounded by the same window
    /// as the primary so a dead endpoint cannot hang sign-in.
    async fn via_fallback(&self, key: &EmailKey, identity: &VerifiedIdentity) -> Resolution {
        let fallback = Arc::clone(&self.fallback);
        let lookup_key = key.clone();
        let bearer = identity.bearer.clone();
        let handle = tokio::task::spawn_blocking(move || fallback.fetch(&lookup_key, &bearer));

        match timeout(self.primary_timeout, handle).await {
            Ok(Ok(Ok(Some(record)))) => {
                tracing::info!(key = %key, "authorized via fallback lookup");
                Resolution::granted(build_profile(key, &record, identity))
            }
            Ok(Ok(Ok(None))) => {
                tracing::debug!(key = %key, "fallback found no document, denied");
                Resolution::denied()
            }
            Ok(Ok(Err(err))) => {
                tracing::warn!(key = %key, error = %err, "fallback lookup failed, denying");
                Resolution::denied()
            }
            Ok(Err(join_err)) => {
                tracing::warn!(key = %key, error = %join_err, "fallback task failed, denying");
                Resolution::denied()
            }
            Err(_) => {
                tracing::warn!(key = %key, "fallback lookup timed out, denying");
                Resolution::denied()
            }
        }
    }
}

/// Display profile for an authorized record. Identity fields fill in only
/// where the stored field is empty.
fn build_profile(key: &EmailKey, record: &AccessRecord, identity: &VerifiedIdentity) -> Profile {
    let name = if record.name.trim().is_empty() {
        identity
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MEMBER_NAME.to_string())
    } else {
        record.name.clone()
    };

    let avatar_url = record
        .avatar_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| identity.photo_url.clone());

    Profile {
        name,
        email: key.to_string(),
        avatar_url,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
