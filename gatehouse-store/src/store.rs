//! The [`RecordStore`] trait — the seam every store implementation fills.

use gatehouse_core::{AccessRecord, EmailKey, RecordPatch, WriteOp};

use crate::error::StoreError;

/// Keyed access-record storage.
///
/// Implementations are blocking; async callers wrap calls in
/// `tokio::task::spawn_blocking`. A missing record is `Ok(None)` on reads,
/// never an error.
pub trait RecordStore: Send + Sync {
    /// Fetch the record for `key`.
    fn get(&self, key: &EmailKey) -> Result<Option<AccessRecord>, StoreError>;

    /// Merge-upsert by key. Fields absent from the patch leave the stored
    /// fields untouched; a missing record is created.
    fn upsert(&self, key: &EmailKey, patch: &RecordPatch) -> Result<(), StoreError>;

    /// Update-only write of the avatar URL. Never creates a record
    /// ([`StoreError::MissingRecord`] when absent) and touches no other field.
    fn set_avatar(&self, key: &EmailKey, avatar_url: &str) -> Result<(), StoreError>;

    /// Remove the record for `key`. Returns whether a record existed.
    fn delete(&self, key: &EmailKey) -> Result<bool, StoreError>;

    /// Every record, sorted by key.
    fn list(&self) -> Result<Vec<AccessRecord>, StoreError>;

    /// Apply a batch of writes atomically: all ops land or none do.
    fn commit(&self, batch: &[WriteOp]) -> Result<(), StoreError>;
}
