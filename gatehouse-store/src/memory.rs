//! In-memory record store.
//!
//! Backs the test suite and doubles as a scratch store for local runs. Batch
//! commits take a single write lock, giving the same all-or-nothing
//! visibility the REST store's `:commit` endpoint provides.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use gatehouse_core::{AccessRecord, EmailKey, RecordPatch, WriteOp, DEFAULT_MEMBER_NAME};

use crate::error::StoreError;
use crate::store::RecordStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<EmailKey, AccessRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records(records: impl IntoIterator<Item = AccessRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            records: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge a patch into the map. Absent patch fields leave stored fields alone;
/// `last_updated` only ever moves forward.
fn apply_upsert(map: &mut BTreeMap<EmailKey, AccessRecord>, key: &EmailKey, patch: &RecordPatch) {
    match map.get_mut(key) {
        Some(record) => {
            if let Some(name) = &patch.name {
                record.name = name.clone();
            }
            if let Some(email) = &patch.email {
                record.email = email.clone();
            }
            if let Some(avatar_url) = &patch.avatar_url {
                record.avatar_url = Some(avatar_url.clone());
            }
            if let Some(incoming) = patch.last_updated {
                record.last_updated =
                    Some(record.last_updated.map_or(incoming, |old| old.max(incoming)));
            }
        }
        None => {
            map.insert(
                key.clone(),
                AccessRecord {
                    key: key.clone(),
                    name: patch
                        .name
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MEMBER_NAME.to_string()),
                    email: patch
                        .email
                        .clone()
                        .unwrap_or_else(|| key.as_str().to_string()),
                    avatar_url: patch.avatar_url.clone(),
                    last_updated: patch.last_updated,
                },
            );
        }
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &EmailKey) -> Result<Option<AccessRecord>, StoreError> {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn upsert(&self, key: &EmailKey, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        apply_upsert(&mut map, key, patch);
        Ok(())
    }

    fn set_avatar(&self, key: &EmailKey, avatar_url: &str) -> Result<(), StoreError> {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(key) {
            Some(record) => {
                record.avatar_url = Some(avatar_url.to_string());
                Ok(())
            }
            None => Err(StoreError::MissingRecord { key: key.clone() }),
        }
    }

    fn delete(&self, key: &EmailKey) -> Result<bool, StoreError> {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.remove(key).is_some())
    }

    fn list(&self) -> Result<Vec<AccessRecord>, StoreError> {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        // BTreeMap iteration is already key-ordered.
        Ok(map.values().cloned().collect())
    }

    fn commit(&self, batch: &[WriteOp]) -> Result<(), StoreError> {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for op in batch {
            match op {
                WriteOp::Upsert { key, patch } => apply_upsert(&mut map, key, patch),
                WriteOp::Delete { key } => {
                    map.remove(key);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(key: &str, name: &str, avatar: Option<&str>) -> AccessRecord {
        AccessRecord {
            key: EmailKey::from(key),
            name: name.to_string(),
            email: key.to_string(),
            avatar_url: avatar.map(str::to_string),
            last_updated: None,
        }
    }

    fn roster_patch(name: &str, email: &str) -> RecordPatch {
        RecordPatch {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            last_updated: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn get_missing_is_none_not_error() {
        let store = MemoryStore::new();
        assert!(store.get(&EmailKey::from("nobody@co.com")).expect("get").is_none());
    }

    #[test]
    fn upsert_creates_then_updates() {
        let store = MemoryStore::new();
        let key = EmailKey::from("ada@co.com");
        store.upsert(&key, &roster_patch("Ada", "ada@co.com")).expect("create");
        store.upsert(&key, &roster_patch("Ada Lovelace", "ada@co.com")).expect("update");

        let record = store.get(&key).expect("get").expect("record");
        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_without_avatar_keeps_stored_avatar() {
        let store =
            MemoryStore::with_records([record("ada@co.com", "Ada", Some("https://img/a.png"))]);
        let key = EmailKey::from("ada@co.com");
        store.upsert(&key, &roster_patch("Ada Lovelace", "ada@co.com")).expect("upsert");

        let record = store.get(&key).expect("get").expect("record");
        assert_eq!(record.avatar_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(record.name, "Ada Lovelace");
    }

    #[test]
    fn upsert_create_fills_defaults() {
        let store = MemoryStore::new();
        let key = EmailKey::from("ghost@co.com");
        store
            .upsert(&key, &RecordPatch { last_updated: Some(Utc::now()), ..Default::default() })
            .expect("upsert");

        let record = store.get(&key).expect("get").expect("record");
        assert_eq!(record.name, DEFAULT_MEMBER_NAME);
        assert_eq!(record.email, "ghost@co.com");
        assert!(record.avatar_url.is_none());
    }

    #[test]
    fn last_updated_never_moves_backwards() {
        let store = MemoryStore::new();
        let key = EmailKey::from("ada@co.com");
        let newer = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        store
            .upsert(&key, &RecordPatch { last_updated: Some(newer), ..Default::default() })
            .expect("newer");
        store
            .upsert(&key, &RecordPatch { last_updated: Some(older), ..Default::default() })
            .expect("older");

        let record = store.get(&key).expect("get").expect("record");
        assert_eq!(record.last_updated, Some(newer));
    }

    #[test]
    fn set_avatar_on_missing_record_errors() {
        let store = MemoryStore::new();
        let err = store
            .set_avatar(&EmailKey::from("nobody@co.com"), "https://img/x.png")
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRecord { .. }));
    }

    #[test]
    fn set_avatar_touches_only_avatar() {
        let store = MemoryStore::with_records([record("ada@co.com", "Ada", None)]);
        let key = EmailKey::from("ada@co.com");
        store.set_avatar(&key, "https://img/new.png").expect("set");

        let record = store.get(&key).expect("get").expect("record");
        assert_eq!(record.avatar_url.as_deref(), Some("https://img/new.png"));
        assert_eq!(record.name, "Ada");
        assert!(record.last_updated.is_none(), "set_avatar must not stamp last_updated");
    }

    #[test]
    fn delete_reports_existence() {
        let store = MemoryStore::with_records([record("ada@co.com", "Ada", None)]);
        assert!(store.delete(&EmailKey::from("ada@co.com")).expect("delete"));
        assert!(!store.delete(&EmailKey::from("ada@co.com")).expect("delete again"));
    }

    #[test]
    fn list_is_sorted_by_key() {
        let store = MemoryStore::with_records([
            record("zoe@co.com", "Zoe", None),
            record("ada@co.com", "Ada", None),
            record("mia@co.com", "Mia", None),
        ]);
        let keys: Vec<_> =
            store.list().expect("list").into_iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, ["ada@co.com", "mia@co.com", "zoe@co.com"]);
    }

    #[test]
    fn commit_applies_upserts_and_deletes_together() {
        let store = MemoryStore::with_records([
            record("keep@co.com", "Keep", None),
            record("drop@co.com", "Drop", None),
        ]);
        let batch = vec![
            WriteOp::Upsert {
                key: EmailKey::from("new@co.com"),
                patch: roster_patch("New Member", "new@co.com"),
            },
            WriteOp::Delete { key: EmailKey::from("drop@co.com") },
        ];
        store.commit(&batch).expect("commit");

        assert!(store.get(&EmailKey::from("new@co.com")).expect("get").is_some());
        assert!(store.get(&EmailKey::from("drop@co.com")).expect("get").is_none());
        assert!(store.get(&EmailKey::from("keep@co.com")).expect("get").is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn commit_empty_batch_is_noop() {
        let store = MemoryStore::with_records([record("ada@co.com", "Ada", None)]);
        store.commit(&[]).expect("commit");
        assert_eq!(store.len(), 1);
    }
}
