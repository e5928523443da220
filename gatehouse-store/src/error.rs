//! Error types for gatehouse-store.

use thiserror::Error;

use gatehouse_core::EmailKey;

/// All errors that can arise from record-store operations.
///
/// A missing record is never an error on reads: `get` and `fetch` return
/// `Ok(None)` so absence stays a denial instead of a fault.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection-level failure (DNS, refused, reset, timeout mid-body).
    #[error("store transport error: {detail}")]
    Transport { detail: String },

    /// The store answered with an unexpected HTTP status.
    #[error("store returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// The store answered 2xx but the body did not decode.
    #[error("failed to decode store response: {detail}")]
    Decode { detail: String },

    /// Update-only write against a key that has no record (`set_avatar`).
    #[error("no record exists for {key}")]
    MissingRecord { key: EmailKey },
}

/// Convenience constructor for [`StoreError::Transport`].
pub(crate) fn transport_err(detail: impl Into<String>) -> StoreError {
    StoreError::Transport {
        detail: detail.into(),
    }
}

/// Convenience constructor for [`StoreError::Decode`].
pub(crate) fn decode_err(detail: impl Into<String>) -> StoreError {
    StoreError::Decode {
        detail: detail.into(),
    }
}
