//! Error types for gatehouse-core.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong loading or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem failure underneath a read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config could not be rendered as YAML on save.
    #[error("failed to render config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file exists but is not valid config YAML; serde_yaml's message
    /// carries the line and column.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No home directory, so `~/.gatehouse/` cannot be located.
    #[error("could not determine a home directory ($HOME unset?)")]
    HomeNotFound,

    /// Nothing at the expected config path yet.
    #[error("config not found at {path}; run `gatehouse init` first")]
    ConfigNotFound { path: PathBuf },
}
