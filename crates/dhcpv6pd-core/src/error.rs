//! Error types for the DHCPv6-PD system
//!
//! This module defines the crate-wide error type. Failures of a single
//! address synthesis are reported separately through
//! [`SynthesisError`](crate::address::SynthesisError) so that one bad
//! entry never fails a whole reconciliation.

use thiserror::Error;

/// Result type alias for DHCPv6-PD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DHCPv6-PD system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config cache persistence errors
    #[error("Config cache error: {0}")]
    ConfigCache(String),

    /// Batch executor errors (address programming failed)
    #[error("Batch executor error: {0}")]
    Executor(String),

    /// Lease file scanning errors
    #[error("Lease error: {0}")]
    Lease(String),

    /// Notification transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// An external call did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A pipeline component has shut down
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a config cache error
    pub fn config_cache(msg: impl Into<String>) -> Self {
        Self::ConfigCache(msg.into())
    }

    /// Create a batch executor error
    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    /// Create a lease error
    pub fn lease(msg: impl Into<String>) -> Self {
        Self::Lease(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a "channel closed" error for the named component
    pub fn channel_closed(component: impl Into<String>) -> Self {
        Self::ChannelClosed(component.into())
    }
}
