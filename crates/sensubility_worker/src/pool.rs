//! N interchangeable workers that consume check requests, invoke the
//! executor, and fan the result out to every enabled egress (spec.md §4.5).

use std::sync::Arc;

use sensubility_executor::Executor;
use sensubility_protocol::{
    to_client_result, to_smart_gateway_result, Amqp1Message, CheckRequest, ClientResult,
    ResultsFormat,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Static, per-process configuration shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub client_name: String,
    pub worker_count: usize,
    pub results_format: ResultsFormat,
    /// Address stamped onto every outbound [`Amqp1Message`].
    pub amqp1_results_channel: String,
}

/// Spawn `config.worker_count` workers pulling from `requests_in`. Each
/// completed result is sent to `sensu_out` and/or `amqp1_out` when present;
/// either sink may be absent if its transport is disabled (spec.md §4.5).
pub fn spawn_workers(
    config: WorkerPoolConfig,
    executor: Arc<Executor>,
    requests_in: mpsc::Receiver<CheckRequest>,
    sensu_out: Option<mpsc::Sender<ClientResult>>,
    amqp1_out: Option<mpsc::Sender<Amqp1Message>>,
    cancel: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let requests_in = Arc::new(Mutex::new(requests_in));

    (0..config.worker_count.max(1))
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                config.clone(),
                Arc::clone(&executor),
                Arc::clone(&requests_in),
                sensu_out.clone(),
                amqp1_out.clone(),
                cancel.clone(),
            ))
        })
        .collect()
}

async fn run_worker(
    id: usize,
    config: WorkerPoolConfig,
    executor: Arc<Executor>,
    requests_in: Arc<Mutex<mpsc::Receiver<CheckRequest>>>,
    sensu_out: Option<mpsc::Sender<ClientResult>>,
    amqp1_out: Option<mpsc::Sender<Amqp1Message>>,
    cancel: CancellationToken,
) {
    loop {
        // Poll both the request channel and the shutdown signal; on
        // signal, exit promptly without draining remaining requests
        // (spec.md §4.5).
        let request = {
            let mut requests_in = requests_in.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                next = requests_in.recv() => next,
            }
        };
        let Some(request) = request else { return };

        let result = match executor.execute(&request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(worker = id, error = %e, check = %request.name, "check execution failed");
                continue;
            }
        };

        if let Some(sensu_out) = &sensu_out {
            let client_result = to_client_result(&config.client_name, result.clone());
            if sensu_out.send(client_result).await.is_err() {
                warn!(worker = id, "sensu egress channel closed");
            }
        }

        if let Some(amqp1_out) = &amqp1_out {
            match build_amqp1_message(&config, &result) {
                Ok(message) => {
                    if amqp1_out.send(message).await.is_err() {
                        warn!(worker = id, "amqp1 egress channel closed");
                    }
                }
                Err(e) => warn!(worker = id, error = %e, check = %request.name, "failed to serialize result for amqp1 egress"),
            }
        }
    }
}

fn build_amqp1_message(
    config: &WorkerPoolConfig,
    result: &sensubility_protocol::CheckResult,
) -> Result<Amqp1Message, serde_json::Error> {
    let body = match config.results_format {
        ResultsFormat::Sensu => {
            serde_json::to_string(&to_client_result(&config.client_name, result.clone()))?
        }
        ResultsFormat::SmartGateway => {
            let now = chrono::Utc::now().to_rfc3339();
            serde_json::to_string(&to_smart_gateway_result(&config.client_name, result, now)?)?
        }
    };

    Ok(Amqp1Message {
        address: config.amqp1_results_channel.clone(),
        body,
    })
}
