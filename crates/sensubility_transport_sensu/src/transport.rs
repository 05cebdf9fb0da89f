//! Classic Sensu broker bridge: fanout exchange + client queue + subscription
//! bindings, request decode-and-forward, and two publish sinks
//! (spec.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use sensubility_protocol::{build_keepalive, CheckRequest, ClientResult};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SensuTransportConfig;
use crate::error::SensuTransportError;

const KEEPALIVE_QUEUE: &str = "keepalives";
const RESULTS_QUEUE: &str = "results";
const CONTENT_TYPE_JSON: &str = "text/json";

pub struct SensuTransport {
    config: SensuTransportConfig,
    in_connection: Connection,
    out_connection: Connection,
    in_channel: Channel,
    /// Shared by the results-publisher and keepalive tasks; a single AMQP
    /// 0-9-1 channel is not safe for concurrent publish from multiple tasks
    /// (spec.md §5, §9), so both serialize through this mutex rather than
    /// each owning an independent channel.
    out_channel: Arc<Mutex<Channel>>,
    queue_name: String,
    exchange_name: String,
}

/// Join handles for the transport's three long-lived tasks.
pub struct SensuTransportHandle {
    pub consumer: tokio::task::JoinHandle<()>,
    pub publisher: tokio::task::JoinHandle<()>,
    pub keepalive: tokio::task::JoinHandle<()>,
}

impl SensuTransport {
    /// Open two sessions against `config.address` (inbound/outbound) and
    /// declare the client's exchange, queue and subscription bindings
    /// (spec.md §4.3 topology).
    pub async fn connect(config: SensuTransportConfig) -> Result<Self, SensuTransportError> {
        let in_connection =
            Connection::connect(&config.address, ConnectionProperties::default()).await?;
        let out_connection =
            Connection::connect(&config.address, ConnectionProperties::default()).await?;

        let in_channel = in_connection.create_channel().await?;
        let out_channel = out_connection.create_channel().await?;

        let exchange_name = crate::naming::exchange_name(&config.client_name);
        let queue_name = crate::naming::queue_name(&config.client_name, epoch_seconds());

        in_channel
            .exchange_declare(
                &exchange_name,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        in_channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    durable: false,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        for subscription in &config.subscriptions {
            in_channel
                .queue_bind(
                    &queue_name,
                    subscription,
                    "",
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        Ok(Self {
            config,
            in_connection,
            out_connection,
            in_channel,
            out_channel: Arc::new(Mutex::new(out_channel)),
            queue_name,
            exchange_name,
        })
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Close both sessions. Reconnection-on-failure is out of scope
    /// (spec.md §4.3, §9 open question).
    pub async fn disconnect(self) {
        let _ = self.in_channel.close(200, "bye").await;
        let _ = self.in_connection.close(200, "bye").await;
        let out_channel = self.out_channel.lock().await;
        let _ = out_channel.close(200, "bye").await;
        drop(out_channel);
        let _ = self.out_connection.close(200, "bye").await;
    }

    /// Spawn the consumer, results-publisher and keepalive tasks
    /// (spec.md §4.3, §5).
    pub fn start(
        &self,
        requests_out: mpsc::Sender<CheckRequest>,
        results_in: mpsc::Receiver<ClientResult>,
        cancel: CancellationToken,
    ) -> SensuTransportHandle {
        let consumer = tokio::spawn(run_consumer(
            self.in_channel.clone(),
            self.queue_name.clone(),
            self.config.client_name.clone(),
            requests_out,
            cancel.clone(),
        ));

        let publisher = tokio::spawn(run_publisher(Arc::clone(&self.out_channel), results_in));

        let keepalive = tokio::spawn(run_keepalive(
            Arc::clone(&self.out_channel),
            self.config.clone(),
            cancel,
        ));

        SensuTransportHandle {
            consumer,
            publisher,
            keepalive,
        }
    }
}

async fn run_consumer(
    channel: Channel,
    queue_name: String,
    client_name: String,
    requests_out: mpsc::Sender<CheckRequest>,
    cancel: CancellationToken,
) {
    let consumer = match channel
        .basic_consume(
            &queue_name,
            &client_name,
            BasicConsumeOptions {
                no_ack: false,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(e) => {
            warn!(error = %e, "failed to register sensu consumer");
            return;
        }
    };
    tokio::pin!(consumer);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = consumer.next() => {
                let Some(delivery) = next else { return };
                let delivery = match delivery {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(error = %e, "sensu consumer delivery error");
                        continue;
                    }
                };
                // Manual ack after decode-and-forward, never before: the
                // broker does not implement at-least-once for this client
                // (spec.md §4.3, §9).
                match serde_json::from_slice::<CheckRequest>(&delivery.data) {
                    Ok(request) => {
                        let _ = delivery.ack(BasicAckOptions::default()).await;
                        if requests_out.send(request).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable sensu request");
                        let _ = delivery.ack(BasicAckOptions::default()).await;
                    }
                }
            }
        }
    }
}

/// Drains `results_in` until it closes, publishing each result to the
/// results queue. No `cancel` arm: the channel closes once every worker
/// drops its egress sender on shutdown, and the loop must keep draining
/// whatever is already queued rather than discarding it (spec.md §5:
/// "publisher loops exit when their egress channel is closed").
async fn run_publisher(out_channel: Arc<Mutex<Channel>>, mut results_in: mpsc::Receiver<ClientResult>) {
    while let Some(result) = results_in.recv().await {
        let body = match serde_json::to_vec(&result) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to serialize sensu result");
                continue;
            }
        };
        publish(&out_channel, RESULTS_QUEUE, body).await;
    }
}

async fn run_keepalive(
    out_channel: Arc<Mutex<Channel>>,
    config: SensuTransportConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.keepalive_interval.max(1)));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let keepalive = build_keepalive(
                    &config.client_name,
                    &config.client_address,
                    &config.subscriptions,
                    epoch_seconds(),
                );
                match serde_json::to_vec(&keepalive) {
                    Ok(body) => publish(&out_channel, KEEPALIVE_QUEUE, body).await,
                    Err(e) => warn!(error = %e, "failed to serialize keepalive"),
                }
            }
        }
    }
}

async fn publish(out_channel: &Arc<Mutex<Channel>>, routing_key: &str, body: Vec<u8>) {
    let channel = out_channel.lock().await;
    let properties = BasicProperties::default()
        .with_content_type(CONTENT_TYPE_JSON.into())
        .with_delivery_mode(1) // transient
        .with_priority(0);
    let publish_result = channel
        .basic_publish(
            "",
            routing_key,
            BasicPublishOptions {
                mandatory: false,
                immediate: false,
            },
            &body,
            properties,
        )
        .await;
    match publish_result {
        Ok(confirm) => {
            if let Err(e) = confirm.await {
                warn!(error = %e, queue = routing_key, "sensu publish was not confirmed");
            } else {
                debug!(queue = routing_key, "published to sensu broker");
            }
        }
        Err(e) => warn!(error = %e, queue = routing_key, "failed to publish to sensu broker"),
    }
}

fn epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
