//! Error types for lifegrid
//!
//! Centralized error handling using snafu for ergonomic error definitions.

use snafu::Snafu;

/// Main error type for the grid engine
#[derive(Debug, Snafu)]
pub enum Error {
    /// Invalid grid, layout, or cache configuration. Raised synchronously and
    /// never coerced into a valid value.
    #[snafu(display("Configuration error: {message}"))]
    Configuration { message: String },

    /// Loader rejected a range of items
    #[snafu(display("Load error for {start}..{end}: {message}"))]
    Load {
        start: usize,
        end: usize,
        message: String,
    },

    /// Durable storage could not be read or written
    #[snafu(display("Storage unavailable: {message}"))]
    Storage { message: String },

    /// Invalid date input for week calculations
    #[snafu(display("Invalid date: {message}"))]
    InvalidDate { message: String },

    /// IO error (file operations)
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// JSON serialization/deserialization error
    #[snafu(display("JSON error: {source}"))]
    Json { source: serde_json::Error },

    /// TOML deserialization error
    #[snafu(display("TOML parse error: {source}"))]
    TomlDe { source: toml::de::Error },

    /// TOML serialization error
    #[snafu(display("TOML serialize error: {source}"))]
    TomlSe { source: toml::ser::Error },
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Whether this error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json { source }
    }
}

impl From<toml::de::Error> for Error {
    fn from(source: toml::de::Error) -> Self {
        Error::TomlDe { source }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(source: toml::ser::Error) -> Self {
        Error::TomlSe { source }
    }
}

/// Result type alias for convenience
pub type Result<T, E = Error> = std::result::Result<T, E>;
