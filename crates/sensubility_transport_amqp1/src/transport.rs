//! Thin publish client over an AMQP 1.0 event bus, with an optional
//! inbound side gated on `listen_channels` (spec.md §4.4).

use std::time::Duration;

use fe2o3_amqp::connection::Connection;
use fe2o3_amqp::session::Session;
use fe2o3_amqp::{Receiver, Sender};
use fe2o3_amqp_types::messaging::Message;
use sensubility_protocol::{Amqp1Message, CheckRequest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Amqp1TransportConfig;
use crate::error::Amqp1TransportError;

pub struct Amqp1Transport {
    config: Amqp1TransportConfig,
    connection: Connection,
    session: Session,
    sender: Sender,
    receivers: Vec<Receiver>,
}

/// Join handles for the publisher and any listener tasks. The publisher
/// owns the connection and session and closes both once `results_in` is
/// drained and closed, so joining `publisher` doubles as the transport's
/// disconnect step (spec.md §4.7: "wait for AMQP1 publisher to drain →
/// disconnect AMQP1").
pub struct Amqp1TransportHandle {
    pub publisher: tokio::task::JoinHandle<()>,
    pub listeners: Vec<tokio::task::JoinHandle<()>>,
}

impl Amqp1Transport {
    /// Connect, begin a session, and attach a sender targeting
    /// `config.results_channel`. Attaches one receiver per entry in
    /// `config.listen_channels`, if any. Connect failure is fatal
    /// (spec.md §4.4).
    pub async fn connect(config: Amqp1TransportConfig) -> Result<Self, Amqp1TransportError> {
        let mut connection =
            Connection::open(config.client_name.as_str(), config.connection.as_str()).await?;
        let mut session = Session::begin(&mut connection).await?;
        let sender = Sender::attach(
            &mut session,
            format!("{}-results-sender", config.client_name),
            config.results_channel.clone(),
        )
        .await?;

        let mut receivers = Vec::with_capacity(config.listen_channels.len());
        for (i, channel) in config.listen_channels.iter().enumerate() {
            let receiver = Receiver::attach(
                &mut session,
                format!("{}-listener-{i}", config.client_name),
                channel.clone(),
            )
            .await?;
            receivers.push(receiver);
        }

        Ok(Self {
            config,
            connection,
            session,
            sender,
            receivers,
        })
    }

    pub fn listens(&self) -> bool {
        self.config.listens()
    }

    /// Consume the transport and spawn its tasks: one publisher that
    /// drains `results_in` onto `sender`, and one listener per attached
    /// receiver forwarding decoded requests onto `requests_out`.
    pub fn start(
        self,
        requests_out: mpsc::Sender<CheckRequest>,
        results_in: mpsc::Receiver<Amqp1Message>,
        cancel: CancellationToken,
    ) -> Amqp1TransportHandle {
        let Amqp1Transport {
            config,
            connection,
            session,
            sender,
            receivers,
        } = self;

        let listeners = receivers
            .into_iter()
            .enumerate()
            .map(|(i, receiver)| {
                tokio::spawn(run_listener(receiver, i, requests_out.clone(), cancel.clone()))
            })
            .collect();

        let send_timeout = Duration::from_secs(config.send_timeout.max(1));
        let publisher = tokio::spawn(run_publisher(connection, session, sender, results_in, send_timeout));

        Amqp1TransportHandle {
            publisher,
            listeners,
        }
    }
}

/// Drains `results_in` until it closes, publishing each message to
/// `sender` with a `send_timeout`-second deadline. No `cancel` arm: the
/// channel closes once every worker drops its egress sender on shutdown,
/// and the loop must keep draining whatever is already queued rather than
/// discarding it (spec.md §5, §4.7: "wait for the AMQP1 publisher to
/// drain").
async fn run_publisher(
    mut connection: Connection,
    mut session: Session,
    mut sender: Sender,
    mut results_in: mpsc::Receiver<Amqp1Message>,
    send_timeout: Duration,
) {
    while let Some(message) = results_in.recv().await {
        let outgoing = Message::builder()
            .properties(
                fe2o3_amqp_types::messaging::Properties::builder()
                    .to(message.address.clone())
                    .build(),
            )
            .value(message.body)
            .build();
        match tokio::time::timeout(send_timeout, sender.send(outgoing)).await {
            Ok(Ok(outcome)) => {
                if !outcome.is_accepted() {
                    warn!(address = %message.address, "amqp 1.0 publish was not accepted");
                } else {
                    debug!(address = %message.address, "published to amqp 1.0 event bus");
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, address = %message.address, "failed to publish to amqp 1.0 event bus")
            }
            Err(_) => warn!(address = %message.address, timeout_secs = send_timeout.as_secs(), "amqp 1.0 publish timed out"),
        }
    }

    let _ = sender.close().await;
    let _ = session.end().await;
    let _ = connection.close().await;
}

async fn run_listener(
    mut receiver: Receiver,
    index: usize,
    requests_out: mpsc::Sender<CheckRequest>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            delivery = receiver.recv::<String>() => {
                let delivery = match delivery {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(error = %e, listener = index, "amqp 1.0 receive error");
                        continue;
                    }
                };
                match serde_json::from_str::<CheckRequest>(delivery.body()) {
                    Ok(request) => {
                        let _ = receiver.accept(&delivery).await;
                        if requests_out.send(request).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, listener = index, "dropping undecodable amqp 1.0 request");
                        let _ = receiver.accept(&delivery).await;
                    }
                }
            }
        }
    }

    let _ = receiver.close().await;
}
