//! Error types for gatehouse-sync.

use thiserror::Error;

use gatehouse_store::StoreError;

/// All errors that can arise from sync jobs.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The spreadsheet transport failed (connect, reset, timeout).
    #[error("sheet transport error: {detail}")]
    SheetTransport { detail: String },

    /// The spreadsheet service answered with an unexpected HTTP status.
    #[error("sheet returned HTTP {status}: {detail}")]
    SheetHttp { status: u16, detail: String },

    /// The spreadsheet payload did not decode.
    #[error("failed to decode sheet response: {detail}")]
    SheetDecode { detail: String },

    /// An error from the record store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience constructor for [`SyncError::SheetTransport`].
pub(crate) fn sheet_transport_err(detail: impl Into<String>) -> SyncError {
    SyncError::SheetTransport {
        detail: detail.into(),
    }
}

/// Convenience constructor for [`SyncError::SheetDecode`].
pub(crate) fn sheet_decode_err(detail: impl Into<String>) -> SyncError {
    SyncError::SheetDecode {
        detail: detail.into(),
    }
}
