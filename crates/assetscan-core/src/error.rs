use thiserror::Error;

/// Top-level error type shared by assetscan crates.
#[derive(Error, Debug)]
pub enum AssetScanError {
    #[error("Invalid DNS server address: {0}")]
    InvalidDnsServer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
