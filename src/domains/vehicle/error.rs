//! Vehicle link error types.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while acquiring or using the vehicle link.
#[derive(Debug, Error)]
pub enum LifespanError {
    /// The configured address is not an `ip:port` pair.
    #[error("Invalid vehicle address '{0}' (expected udpin://ip:port, udp://ip:port or ip:port)")]
    InvalidAddress(String),

    /// The configured address uses a scheme other than UDP.
    #[error("Unsupported vehicle link scheme in '{0}' (only udp:// and udpin:// are supported)")]
    UnsupportedScheme(String),

    /// The UDP socket could not be bound.
    #[error("Failed to bind vehicle link on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No datagram arrived before the deadline.
    #[error("No datagram received from the vehicle within {0:?}")]
    Timeout(Duration),

    /// I/O error on an established link.
    #[error("Vehicle link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifespanError {
    /// Create an invalid address error.
    pub fn invalid_address(raw: impl Into<String>) -> Self {
        Self::InvalidAddress(raw.into())
    }

    /// Create a bind error.
    pub fn bind(address: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { address, source }
    }
}
