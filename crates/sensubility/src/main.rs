//! Lifecycle binary: wires the config, logging, executor, scheduler,
//! transports and worker pool together and drives startup/shutdown
//! (spec.md §4.7).

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sensubility_config::AgentConfig;
use sensubility_executor::Executor;
use sensubility_logging::LogLevel;
use sensubility_protocol::{Amqp1Message, CheckRequest, ClientResult};
use sensubility_scheduler::Scheduler;
use sensubility_transport_amqp1::{Amqp1Transport, Amqp1TransportConfig};
use sensubility_transport_sensu::{SensuTransport, SensuTransportConfig};
use sensubility_worker::WorkerPoolConfig;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const CONFIG_PATH_ENV: &str = "COLLECTD_SENSUBILITY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "/etc/collectd-sensubility.conf";
/// Rendezvous-per-send channel capacity matching the spec's unbuffered
/// channel model (spec.md §5).
const CHANNEL_CAPACITY: usize = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Args::parse();

    let early_log_path = args.log.clone().unwrap_or_else(sensubility_logging::default_log_path);
    let early_level = LogLevel::from_cli_flags(args.debug, args.verbose, args.silent, LogLevel::Warn);
    if let Err(e) = sensubility_logging::init_logging(&early_log_path, early_level) {
        eprintln!("failed to open log file at {}: {e:#}", early_log_path.display());
        return ExitCode::from(2);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::from(2)
        }
    }
}

async fn run(args: cli::Args) -> anyhow::Result<()> {
    let config_path = config_path();
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();

    let config = sensubility_config::load(&config_path, &hostname)?;

    let log_path = resolve_log_path(&args, &config);
    let fallback_level = LogLevel::from_config_value(&config.default.log_level).unwrap_or_default();
    let level = LogLevel::from_cli_flags(args.debug, args.verbose, args.silent, fallback_level);
    sensubility_logging::init_logging(&log_path, level)?;

    info!(config = %config_path.display(), "configuration loaded");

    let executor = Arc::new(Executor::new(
        config.sensu.tmp_base_dir.clone(),
        config.sensu.shell_path.clone(),
    )?);

    let cancel = CancellationToken::new();
    let (requests_tx, requests_rx) = mpsc::channel::<CheckRequest>(CHANNEL_CAPACITY);

    let sensu = if config.sensu.enabled() {
        Some(SensuTransport::connect(sensu_transport_config(&config)).await?)
    } else {
        None
    };

    let amqp1 = if config.amqp1.enabled() {
        Some(Amqp1Transport::connect(amqp1_transport_config(&config)).await?)
    } else {
        None
    };

    let scheduler = Scheduler::new(&config.sensu.checks)?;
    let scheduler_handle = scheduler.start(requests_tx.clone(), cancel.clone());

    let mut sensu_results_tx: Option<mpsc::Sender<ClientResult>> = None;
    let mut sensu_handle = None;
    let sensu_transport = if let Some(sensu) = sensu {
        let (results_tx, results_rx) = mpsc::channel::<ClientResult>(CHANNEL_CAPACITY);
        sensu_results_tx = Some(results_tx);
        let handle = sensu.start(requests_tx.clone(), results_rx, cancel.clone());
        sensu_handle = Some(handle);
        Some(sensu)
    } else {
        None
    };

    let mut amqp1_results_tx: Option<mpsc::Sender<Amqp1Message>> = None;
    let mut amqp1_handle = None;
    if let Some(amqp1) = amqp1 {
        let (results_tx, results_rx) = mpsc::channel::<Amqp1Message>(CHANNEL_CAPACITY);
        amqp1_results_tx = Some(results_tx);
        amqp1_handle = Some(amqp1.start(requests_tx.clone(), results_rx, cancel.clone()));
    }
    drop(requests_tx);

    let worker_config = WorkerPoolConfig {
        client_name: config.sensu.client_name.clone(),
        worker_count: config.sensu.worker_count,
        results_format: config.amqp1.results_format,
        amqp1_results_channel: config.amqp1.results_channel.clone(),
    };
    let worker_handles = sensubility_worker::spawn_workers(
        worker_config,
        Arc::clone(&executor),
        requests_rx,
        sensu_results_tx,
        amqp1_results_tx,
        cancel.clone(),
    );

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    cancel.cancel();

    for handle in worker_handles {
        let _ = handle.await;
    }

    // Wait for the AMQP1 publisher to drain before disconnecting, then
    // disconnect Sensu (spec.md §4.7).
    if let Some(handle) = amqp1_handle {
        let _ = handle.publisher.await;
        for listener in handle.listeners {
            let _ = listener.await;
        }
    }

    if let Some(handle) = sensu_handle {
        let _ = handle.consumer.await;
        let _ = handle.publisher.await;
        let _ = handle.keepalive.await;
    }
    if let Some(sensu_transport) = sensu_transport {
        sensu_transport.disconnect().await;
    }

    scheduler_handle.stop();
    executor.clean();
    info!("shutdown complete");
    Ok(())
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn resolve_log_path(args: &cli::Args, config: &AgentConfig) -> PathBuf {
    if let Some(path) = &args.log {
        return path.clone();
    }
    if !config.default.log_file.is_empty() {
        return PathBuf::from(&config.default.log_file);
    }
    sensubility_logging::default_log_path()
}

fn sensu_transport_config(config: &AgentConfig) -> SensuTransportConfig {
    SensuTransportConfig {
        address: config.sensu.connection.clone(),
        subscriptions: config.sensu.subscriptions.clone(),
        client_name: config.sensu.client_name.clone(),
        client_address: config.sensu.client_address.clone(),
        keepalive_interval: config.sensu.keepalive_interval,
    }
}

fn amqp1_transport_config(config: &AgentConfig) -> Amqp1TransportConfig {
    Amqp1TransportConfig {
        connection: config.amqp1.connection.clone(),
        client_name: config.amqp1.client_name.clone(),
        results_channel: config.amqp1.results_channel.clone(),
        listen_channels: config.amqp1.listen_channels.clone(),
        send_timeout: config.amqp1.send_timeout,
    }
}

async fn wait_for_shutdown_signal() {
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = terminate.recv() => {},
        _ = interrupt.recv() => {},
    }
}
