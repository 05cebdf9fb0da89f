use thiserror::Error;

#[derive(Debug, Error)]
pub enum Amqp1TransportError {
    #[error("failed to open amqp 1.0 connection: {0}")]
    Connect(#[from] fe2o3_amqp::connection::OpenError),
    #[error("failed to begin amqp 1.0 session: {0}")]
    Session(#[from] fe2o3_amqp::session::BeginError),
    #[error("failed to attach amqp 1.0 sender: {0}")]
    Sender(#[from] fe2o3_amqp::link::SenderAttachError),
    #[error("failed to attach amqp 1.0 receiver: {0}")]
    Receiver(#[from] fe2o3_amqp::link::ReceiverAttachError),
}
