//! Error types for relctl-core

use std::time::Duration;
use thiserror::Error;

/// Result type alias using relctl-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every relctl crate.
///
/// None of these are retried internally. A failed operation is retried by
/// re-invoking it, which is safe because publication is idempotent.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller asked for something the build or flags cannot satisfy
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Local artifact is missing or does not match its recorded checksum
    #[error("Integrity error: {message}")]
    Integrity { message: String },

    /// A remote system broke an assumed contract
    #[error("Remote protocol violation: {message}")]
    RemoteProtocol { message: String },

    /// The signing authority answered with anything but success
    #[error("Signing failed: {message}")]
    SigningFailure { message: String },

    /// A signature did not verify
    #[error("Signature verification failed: {message}")]
    VerificationFailure { message: String },

    /// No correlated response arrived in time
    #[error("Timed out after {}s waiting for {what}", after.as_secs())]
    Timeout { what: String, after: Duration },

    /// The wait was cancelled by the caller
    #[error("Cancelled while waiting for {what}")]
    Cancelled { what: String },

    /// External tool exited unsuccessfully
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Object storage error
    #[error("Object storage error: {message}")]
    Storage { message: String },

    /// Message bus error
    #[error("Message bus error: {message}")]
    Bus { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create a remote protocol error
    pub fn remote_protocol(message: impl Into<String>) -> Self {
        Self::RemoteProtocol {
            message: message.into(),
        }
    }

    /// Create a signing failure
    pub fn signing_failure(message: impl Into<String>) -> Self {
        Self::SigningFailure {
            message: message.into(),
        }
    }

    /// Create a verification failure
    pub fn verification_failure(message: impl Into<String>) -> Self {
        Self::VerificationFailure {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(what: impl Into<String>) -> Self {
        Self::Cancelled { what: what.into() }
    }

    /// Create an external tool error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an object storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a message bus error
    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus {
            message: message.into(),
        }
    }

    /// Process exit code for this error category
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::YamlParse(_) => 2,
            Self::Integrity { .. } => 3,
            Self::RemoteProtocol { .. } => 4,
            Self::SigningFailure { .. } => 5,
            Self::VerificationFailure { .. } => 6,
            Self::Timeout { .. } | Self::Cancelled { .. } => 7,
            _ => 1,
        }
    }
}
