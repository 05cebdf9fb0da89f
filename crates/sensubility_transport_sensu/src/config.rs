/// Connection parameters for the Sensu (AMQP 0-9-1) transport.
#[derive(Debug, Clone)]
pub struct SensuTransportConfig {
    pub address: String,
    pub subscriptions: Vec<String>,
    pub client_name: String,
    pub client_address: String,
    pub keepalive_interval: u64,
}
