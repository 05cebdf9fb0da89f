pub mod config;
pub mod error;
pub mod transport;

pub use config::Amqp1TransportConfig;
pub use error::Amqp1TransportError;
pub use transport::{Amqp1Transport, Amqp1TransportHandle};
