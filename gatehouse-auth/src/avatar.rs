//! Avatar update endpoint.
//!
//! An authenticated member may change exactly one field of their own record:
//! `avatar_url`. The endpoint never creates records; membership comes from
//! the roster sync alone. Checks run in a fixed order so callers always get
//! the most specific rejection: credential, then argument, then membership.

use serde::Serialize;

use gatehouse_core::VerifiedIdentity;
use gatehouse_store::{RecordStore, StoreError};

use crate::error::EndpointError;

/// Confirmed result of an avatar update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvatarUpdate {
    pub avatar_url: String,
}

/// Set the caller's own avatar URL.
///
/// The read and the write are separate store calls; a roster sync may land
/// between them, and on `avatar_url` the last writer wins.
/// A record deleted in that window surfaces as `PermissionDenied`, same as
/// if it had never existed.
pub fn update_avatar(
    store: &dyn RecordStore,
    identity: Option<&VerifiedIdentity>,
    avatar_url: &str,
) -> Result<AvatarUpdate, EndpointError> {
    let identity = identity.ok_or(EndpointError::Unauthenticated)?;

    let avatar_url = avatar_url.trim();
    if avatar_url.is_empty() {
        return Err(EndpointError::InvalidArgument(
            "avatar URL must not be empty".to_string(),
        ));
    }

    let key = identity.key();
    if key.is_empty() {
        // No email, no record; nothing such an identity could own.
        return Err(EndpointError::PermissionDenied);
    }

    match store.get(&key) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(EndpointError::PermissionDenied),
        Err(err) => {
            tracing::error!(key = %key, error = %err, "record lookup failed during avatar update");
            return Err(EndpointError::Internal);
        }
    }

    match store.set_avatar(&key, avatar_url) {
        Ok(()) => {
            tracing::info!(key = %key, "avatar updated");
            Ok(AvatarUpdate {
                avatar_url: avatar_url.to_string(),
            })
        }
        Err(StoreError::MissingRecord { .. }) => Err(EndpointError::PermissionDenied),
        Err(err) => {
            tracing::error!(key = %key, error = %err, "avatar write failed");
            Err(EndpointError::Internal)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{AccessRecord, EmailKey, RecordPatch, WriteOp};
    use gatehouse_store::MemoryStore;

    fn member(key: &str) -> AccessRecord {
        AccessRecord {
            key: EmailKey::from(key),
            name: "Ada Lovelace".to_string(),
            email: key.to_string(),
            avatar_url: None,
            last_updated: None,
        }
    }

    fn identity(email: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            email: email.to_string(),
            display_name: None,
            photo_url: None,
            bearer: "tok-test".to_string(),
        }
    }

    /// Record exists on read but vanishes before the write.
    struct VanishingStore(MemoryStore);

    impl RecordStore for VanishingStore {
        fn get(&self, key: &EmailKey) -> Result<Option<AccessRecord>, StoreError> {
            Ok(Some(member(key.as_str())))
        }
        fn upsert(&self, key: &EmailKey, patch: &RecordPatch) -> Result<(), StoreError> {
            self.0.upsert(key, patch)
        }
        fn set_avatar(&self, key: &EmailKey, _avatar_url: &str) -> Result<(), StoreError> {
            Err(StoreError::MissingRecord { key: key.clone() })
        }
        fn delete(&self, key: &EmailKey) -> Result<bool, StoreError> {
            self.0.delete(key)
        }
        fn list(&self) -> Result<Vec<AccessRecord>, StoreError> {
            self.0.list()
        }
        fn commit(&self, batch: &[WriteOp]) -> Result<(), StoreError> {
            self.0.commit(batch)
        }
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn get(&self, _key: &EmailKey) -> Result<Option<AccessRecord>, StoreError> {
            Err(StoreError::Transport {
                detail: "connection refused".to_string(),
            })
        }
        fn upsert(&self, _key: &EmailKey, _patch: &RecordPatch) -> Result<(), StoreError> {
            Ok(())
        }
        fn set_avatar(&self, _key: &EmailKey, _avatar_url: &str) -> Result<(), StoreError> {
            Ok(())
        }
        fn delete(&self, _key: &EmailKey) -> Result<bool, StoreError> {
            Ok(false)
        }
        fn list(&self) -> Result<Vec<AccessRecord>, StoreError> {
            Ok(Vec::new())
        }
        fn commit(&self, _batch: &[WriteOp]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn missing_credential_rejects_before_anything_else() {
        let store = MemoryStore::new();
        // Even a blank URL reports the credential problem first.
        let err = update_avatar(&store, None, "  ").unwrap_err();
        assert!(matches!(err, EndpointError::Unauthenticated));
    }

    #[test]
    fn blank_url_is_an_invalid_argument() {
        let store = MemoryStore::with_records([member("ada@co.com")]);
        let id = identity("ada@co.com");
        let err = update_avatar(&store, Some(&id), "   \n").unwrap_err();
        assert!(matches!(err, EndpointError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_member_is_denied_and_no_record_appears() {
        let store = MemoryStore::new();
        let id = identity("stranger@elsewhere.org");
        let err = update_avatar(&store, Some(&id), "https://img/s.png").unwrap_err();
        assert!(matches!(err, EndpointError::PermissionDenied));
        assert!(store.is_empty(), "the endpoint must never create records");
    }

    #[test]
    fn member_updates_only_the_avatar_field() {
        let store = MemoryStore::with_records([member("ada@co.com")]);
        let id = identity("Ada@Co.Com");

        let update =
            update_avatar(&store, Some(&id), "  https://img/ada.png ").expect("update");
        assert_eq!(update.avatar_url, "https://img/ada.png", "stored value is trimmed");

        let record = store
            .get(&EmailKey::from("ada@co.com"))
            .expect("get")
            .expect("record");
        assert_eq!(record.avatar_url.as_deref(), Some("https://img/ada.png"));
        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(record.email, "ada@co.com");
    }

    #[test]
    fn store_failure_maps_to_internal() {
        let id = identity("ada@co.com");
        let err = update_avatar(&BrokenStore, Some(&id), "https://img/a.png").unwrap_err();
        assert!(matches!(err, EndpointError::Internal));
    }

    #[test]
    fn record_deleted_between_read_and_write_is_denied() {
        let store = VanishingStore(MemoryStore::new());
        let id = identity("ada@co.com");
        let err = update_avatar(&store, Some(&id), "https://img/a.png").unwrap_err();
        assert!(matches!(err, EndpointError::PermissionDenied));
    }

    #[test]
    fn identity_without_an_email_is_denied() {
        let store = MemoryStore::with_records([member("ada@co.com")]);
        let id = identity("   ");
        let err = update_avatar(&store, Some(&id), "https://img/a.png").unwrap_err();
        assert!(matches!(err, EndpointError::PermissionDenied));
    }
}
