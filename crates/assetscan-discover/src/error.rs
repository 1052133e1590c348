//! Error types for the assetscan-discover crate.

use thiserror::Error;

/// Message returned to callers for a malformed `ipRange`.
pub const INVALID_RANGE_MESSAGE: &str =
    "Invalid IP range format. Use CIDR notation (e.g., 192.168.1.0/24)";

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Invalid IP range format. Use CIDR notation (e.g., 192.168.1.0/24): {input}")]
    InvalidRange { input: String },

    #[error("Reverse DNS lookup failed: {0}")]
    Dns(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
