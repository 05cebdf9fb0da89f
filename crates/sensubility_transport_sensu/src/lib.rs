pub mod config;
pub mod error;
mod naming;
pub mod transport;

pub use config::SensuTransportConfig;
pub use error::SensuTransportError;
pub use transport::{SensuTransport, SensuTransportHandle};
