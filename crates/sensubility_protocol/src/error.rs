use thiserror::Error;

/// Errors raised while decoding wire messages or the check catalog.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),
}
