mod pool;

pub use pool::{spawn_workers, WorkerPoolConfig};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use sensubility_executor::Executor;
    use sensubility_protocol::{CheckRequest, ResultsFormat};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn test_executor() -> Arc<Executor> {
        let dir = tempfile::tempdir().unwrap().into_path();
        Arc::new(Executor::new(dir, "/bin/sh".into()).unwrap())
    }

    #[tokio::test]
    async fn a_completed_check_is_fanned_out_to_both_enabled_egresses() {
        let config = WorkerPoolConfig {
            client_name: "host1".into(),
            worker_count: 1,
            results_format: ResultsFormat::Sensu,
            amqp1_results_channel: "collectd/events".into(),
        };

        let (requests_tx, requests_rx) = mpsc::channel(4);
        let (sensu_tx, mut sensu_rx) = mpsc::channel(4);
        let (amqp1_tx, mut amqp1_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let handles = spawn_workers(
            config,
            test_executor(),
            requests_rx,
            Some(sensu_tx),
            Some(amqp1_tx),
            cancel.clone(),
        );

        requests_tx
            .send(CheckRequest {
                command: "echo ok".into(),
                name: "check1".into(),
                issued: 0,
            })
            .await
            .unwrap();

        let sensu_result = tokio::time::timeout(Duration::from_secs(5), sensu_rx.recv())
            .await
            .expect("sensu result in time")
            .expect("sensu channel open");
        assert_eq!(sensu_result.check.name, "check1");

        let amqp1_result = tokio::time::timeout(Duration::from_secs(5), amqp1_rx.recv())
            .await
            .expect("amqp1 result in time")
            .expect("amqp1 channel open");
        assert_eq!(amqp1_result.address, "collectd/events");

        cancel.cancel();
        drop(requests_tx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }

    #[tokio::test]
    async fn workers_exit_promptly_on_cancellation_without_draining() {
        let config = WorkerPoolConfig {
            client_name: "host1".into(),
            worker_count: 2,
            results_format: ResultsFormat::SmartGateway,
            amqp1_results_channel: "collectd/events".into(),
        };

        let (requests_tx, requests_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handles = spawn_workers(config, test_executor(), requests_rx, None, None, cancel.clone());

        cancel.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("worker exits promptly")
                .unwrap();
        }
        drop(requests_tx);
    }
}
