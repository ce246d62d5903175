//! Error handling for the har2jmx conversion library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! # Examples
//!
//! ```
//! use har2jmx_core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     // Operations that might fail...
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type for har2jmx conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for har2jmx conversion operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The capture could not be read as a HAR document
    #[error("HAR error: {0}")]
    Har(String),

    /// The capture has neither pages nor entries
    #[error("No page and no entry, can't convert this HAR file")]
    EmptyArchive,

    /// A request URL (or page title used as one) is not a valid URI
    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A filter pattern failed to compile
    #[error("Invalid URL filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Template error
    #[error("Template error: {0}")]
    Template(String),

    /// Template engine error
    #[error("Template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new HAR error
    pub fn har<S: Into<String>>(msg: S) -> Self {
        Self::Har(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a new invalid URL error
    pub fn url<S: Into<String>>(url: S, source: url::ParseError) -> Self {
        Self::Url {
            url: url.into(),
            source,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
