//! Error types for the flattening pipeline
//!
//! Every failure in a run is one of three kinds: the zone listing could not
//! be fetched, a target hostname could not be resolved, or a write was
//! rejected. Invalid configuration is the only other failure.

use thiserror::Error;

/// Result type alias for flattening operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the flattening pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// The zone's custom record list could not be retrieved or decoded
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A flatten target could not be resolved
    #[error("Resolution error for {hostname}: {message}")]
    Resolution {
        /// Hostname that was being resolved
        hostname: String,
        /// Error message
        message: String,
    },

    /// A write to the zone management API failed
    #[error("Write error ({url}): {message}")]
    Write {
        /// Destination URL of the failed write
        url: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(hostname: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            hostname: hostname.into(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
