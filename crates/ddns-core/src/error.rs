//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Public IP could not be determined
    #[error("IP resolution error: {0}")]
    Resolution(String),

    /// DNS provider API returned a non-2xx status or could not be reached
    #[error(
        "DNS provider error{}: {body}",
        .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
    )]
    Provider {
        /// HTTP status, absent for transport failures
        status: Option<u16>,
        /// Response body or transport error message
        body: String,
    },

    /// Notification could not be rendered or sent
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A provider failure while reconciling one domain
    #[error("domain {domain} (zone {zone_id}): {source}")]
    Zone {
        /// Domain being reconciled
        domain: String,
        /// Zone the domain belongs to
        zone_id: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// I/O errors (configuration and log files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an IP resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a provider error carrying the HTTP status and response body
    pub fn provider(status: u16, body: impl Into<String>) -> Self {
        Self::Provider {
            status: Some(status),
            body: body.into(),
        }
    }

    /// Create a provider error for a request that never got a response
    pub fn provider_transport(msg: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            body: msg.into(),
        }
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach domain and zone context to an error
    pub fn in_zone(self, domain: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self::Zone {
            domain: domain.into(),
            zone_id: zone_id.into(),
            source: Box::new(self),
        }
    }

    /// HTTP status of the innermost provider error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            Self::Zone { source, .. } => source.status(),
            _ => None,
        }
    }
}
