use std::path::PathBuf;

use thiserror::Error;

/// Error surface for daemon runtime, protocol, and service management.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config: {0}")]
    Config(#[from] gatehouse_core::ConfigError),

    #[error("protocol JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("socket protocol: {0}")]
    Protocol(String),

    #[error("daemon is not running (no socket at {socket})")]
    DaemonNotRunning { socket: PathBuf },

    #[error("launchd: {0}")]
    Launchd(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
