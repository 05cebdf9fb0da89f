use thiserror::Error;

/// Connection failures are fatal at startup. Per-message publish/decode
/// failures are not represented here — they are logged and discarded in
/// place.
#[derive(Debug, Error)]
pub enum SensuTransportError {
    #[error("failed to connect to broker: {0}")]
    Connect(#[from] lapin::Error),
}
