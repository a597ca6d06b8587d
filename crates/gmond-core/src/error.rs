//! Error type shared by the transport and configuration layers.
//!
//! Parsing never fails: malformed or truncated streams yield partial results.

use thiserror::Error;

/// Errors surfaced by `gmond-core`.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Host name resolved to no addresses.
    #[error("could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    /// Configuration is structurally valid JSON but semantically wrong.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file is not valid JSON for [`crate::CollectorConfig`].
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    /// A fetch worker panicked before producing a result.
    #[error("fetch worker for {0} panicked")]
    WorkerPanicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
