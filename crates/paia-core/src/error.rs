//! Error types for session persistence and configuration.

use std::path::PathBuf;

/// Failures writing a session document. Read failures never surface here:
/// an unreadable document is replaced by a fresh session.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write context file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not resolve home directory")]
    NoHomeDir,
}
