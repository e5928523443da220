//! Domain types for Gatehouse access records.
//!
//! Every identity flows through [`EmailKey`]; raw strings never act as record
//! keys. All wire-facing types serialize camelCase via serde, matching the
//! document-store and socket payload formats.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Display-name fallback for roster rows and profiles that carry no name.
pub const DEFAULT_MEMBER_NAME: &str = "unknown member";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The normalized identity key: trimmed, lower-cased email address.
///
/// Construction always normalizes, so two raw emails differing only in case
/// or surrounding whitespace are the same key. The inner string is private;
/// a non-normalized key cannot be smuggled in from outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EmailKey(String);

impl EmailKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the raw input held no identity at all (empty after trim).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EmailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EmailKey {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for EmailKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// Deserialization re-normalizes, so a key read off the wire is as safe as a
// constructed one.
impl<'de> Deserialize<'de> for EmailKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A whitelist entry. Presence of a record is exactly what authorizes its
/// member; there is no separate flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub key: EmailKey,
    pub name: String,
    /// Email as the roster provided it (original casing preserved); the key
    /// holds the normalized form.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Field-level merge patch: `None` leaves the stored field untouched.
///
/// Roster sync patches carry no avatar field, which is what makes it
/// impossible for a sync to clobber a member's avatar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.avatar_url.is_none()
            && self.last_updated.is_none()
    }
}

/// One operation inside an atomic batch commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOp {
    Upsert { key: EmailKey, patch: RecordPatch },
    Delete { key: EmailKey },
}

impl WriteOp {
    pub fn key(&self) -> &EmailKey {
        match self {
            WriteOp::Upsert { key, .. } => key,
            WriteOp::Delete { key } => key,
        }
    }
}

/// An identity some external provider has already verified.
///
/// Resolution receives this explicitly per call; nothing in the crate keeps
/// ambient signed-in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Credential forwarded to the fallback lookup transport.
    pub bearer: String,
}

impl VerifiedIdentity {
    pub fn key(&self) -> EmailKey {
        EmailKey::new(&self.email)
    }
}

/// What a successful sign-in displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
