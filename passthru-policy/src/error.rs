//! Error types for passthru-policy
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for passthru-policy
#[derive(Error, Debug)]
pub enum Error {
    /// Backend descriptor was not of the form `key=tok1;tok2;...`
    #[error("Malformed descriptor: {0:?}")]
    MalformedDescriptor(String),

    /// Backend returned a non-zero status for a key-value assignment
    #[error("Backend rejected parameters {key_values:?} with status {status}")]
    BackendRejected { status: i32, key_values: String },

    /// Settings store read or write failure
    #[error("Settings error: {0}")]
    Settings(String),

    /// Inbound command could not be decoded
    #[error("Bad command: {0}")]
    BadCommand(String),

    /// Errors from passthru-common (config, unknown ordinals)
    #[error(transparent)]
    Common(#[from] passthru_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using passthru-policy Error
pub type Result<T> = std::result::Result<T, Error>;
