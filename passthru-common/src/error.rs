//! Common error types for passthru

use thiserror::Error;

/// Common result type for passthru operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the passthru crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML could not be serialized
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted device ordinal outside the known table
    #[error("Unrecognized output device ordinal: {0}")]
    UnknownDevice(i32),

    /// Format value outside the known table
    #[error("Unrecognized output format: {0}")]
    UnknownFormat(i32),
}
