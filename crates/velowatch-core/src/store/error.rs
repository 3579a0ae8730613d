//! Store errors

use thiserror::Error;

/// Errors that can occur when subscribing to the store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid store URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Subscription pipeline has shut down")]
    Closed,
}
