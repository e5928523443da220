use thiserror::Error;

/// Caller-facing error surface of the avatar update endpoint.
///
/// `Internal` carries no detail: store failures are logged on the server
/// side and never forwarded to the caller.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not on the access list")]
    PermissionDenied,

    #[error("internal error")]
    Internal,
}
