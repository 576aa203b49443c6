//! Common error types for ilgraph

use thiserror::Error;

/// Common result type for ilgraph support operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while bootstrapping a graph front end
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML or does not match the schema
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
