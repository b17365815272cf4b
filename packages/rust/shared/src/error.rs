//! The one error enum shared by every curator crate.
//!
//! Binaries convert it into `color_eyre::Report` at the edge; nothing below
//! the CLI depends on eyre.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CuratorError {
    /// Unreadable or incomplete `curator.toml`, or a missing API key.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure or non-2xx reply from the model API.
    #[error("network error: {0}")]
    Network(String),

    /// The model replied but the envelope could not be read. A well-formed
    /// envelope carrying a bad paper list is not an error; it decodes to
    /// zero candidates.
    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Rejected topic input, checked before anything is written.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The topic is gone from the store. Runs that race a deletion end here.
    #[error("topic not found: {id}")]
    TopicNotFound { id: String },
}

pub type Result<T> = std::result::Result<T, CuratorError>;

impl CuratorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn topic_not_found(id: impl Into<String>) -> Self {
        Self::TopicNotFound { id: id.into() }
    }

    /// Attach the offending path to an I/O failure.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
