//! Catalog-driven multi-timer scheduler (spec.md §4.1).
//!
//! REDESIGN FLAG applied: the original drives a runtime-reflective dynamic
//! `select` over one channel per armed check. This implementation instead
//! spawns one `tokio` task per armed interval, each ticking its own
//! `tokio::time::interval` and sending onto one shared `mpsc` channel —
//! fairness falls out of each timer running independently, and shutdown can
//! abort each task's `JoinHandle` explicitly instead of leaking timers at
//! process exit.

use std::collections::HashMap;
use std::time::Duration;

use sensubility_protocol::{CheckCatalogEntry, CheckRequest, ProtocolError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct Scheduler {
    catalog: HashMap<String, CheckCatalogEntry>,
}

/// Handle to the armed timer tasks; `stop` aborts every one of them.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn armed_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn stop(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

impl Scheduler {
    /// Parse the `[sensu] checks` JSON blob into a named catalog. Parse
    /// failure is a fatal startup error (spec.md §4.1).
    pub fn new(checks_json: &str) -> Result<Self, ProtocolError> {
        let catalog = sensubility_protocol::parse_catalog(checks_json)?;
        Ok(Self { catalog })
    }

    /// Arm one timer per catalog entry with `interval >= 1`, each emitting a
    /// `CheckRequest` onto `out` whenever it fires. Entries with
    /// `interval < 1` are skipped with a warning (spec.md §4.1); the
    /// scheduler still "runs" even if zero entries are valid, it simply never
    /// emits.
    pub fn start(&self, out: mpsc::Sender<CheckRequest>, cancel: CancellationToken) -> SchedulerHandle {
        let mut tasks = Vec::new();
        for (name, entry) in &self.catalog {
            if entry.interval < 1 {
                warn!(check = %name, interval = entry.interval, "skipping check with interval < 1");
                continue;
            }
            let name = name.clone();
            let command = entry.command.clone();
            let out = out.clone();
            let cancel = cancel.clone();
            let interval_secs = entry.interval as u64;
            tasks.push(tokio::spawn(async move {
                run_timer(name, command, interval_secs, out, cancel).await;
            }));
        }
        SchedulerHandle { tasks }
    }
}

async fn run_timer(
    name: String,
    command: String,
    interval_secs: u64,
    out: mpsc::Sender<CheckRequest>,
    cancel: CancellationToken,
) {
    // First fire lands at t=interval, not t=0: `tokio::time::interval` ticks
    // immediately on its first poll, but the original scheduler's
    // `time.Tick(interval)` only fires after the interval elapses.
    let period = Duration::from_secs(interval_secs);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let request = CheckRequest {
                    command: command.clone(),
                    name: name.clone(),
                    issued: epoch_seconds(),
                };
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = out.send(request) => {
                        if result.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_with_interval_below_one_are_skipped() {
        let scheduler = Scheduler::new(
            r#"{"bad": {"command": "exit 0", "interval": 0}, "good": {"command": "exit 0", "interval": 1}}"#,
        )
        .unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let handle = scheduler.start(tx, CancellationToken::new());
        assert_eq!(handle.armed_count(), 1);
        handle.stop();
    }

    #[tokio::test]
    async fn empty_catalog_runs_without_emitting() {
        let scheduler = Scheduler::new("{}").unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler.start(tx, CancellationToken::new());
        assert_eq!(handle.armed_count(), 0);
        assert!(rx.try_recv().is_err());
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_emits_a_request_carrying_catalog_fields() {
        let scheduler = Scheduler::new(r#"{"disk": {"command": "df -h", "interval": 1}}"#).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler.start(tx, CancellationToken::new());
        tokio::time::advance(Duration::from_secs(1)).await;
        let request = rx.recv().await.unwrap();
        assert_eq!(request.name, "disk");
        assert_eq!(request.command, "df -h");
        handle.stop();
    }

    /// The first emission lands at t=interval, not t=0 (matching the
    /// original scheduler's `time.Tick`, not `tokio::time::interval`'s
    /// immediate-first-tick default).
    #[tokio::test(start_paused = true)]
    async fn first_emission_does_not_land_at_t_zero() {
        let scheduler = Scheduler::new(r#"{"disk": {"command": "df -h", "interval": 5}}"#).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler.start(tx, CancellationToken::new());
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(rx.recv().await.is_some());
        handle.stop();
    }

    #[tokio::test]
    async fn malformed_catalog_json_is_a_fatal_error() {
        assert!(Scheduler::new("not json").is_err());
    }

    #[tokio::test]
    async fn cancellation_stops_emission_without_blocking_forever() {
        let scheduler = Scheduler::new(r#"{"disk": {"command": "df -h", "interval": 1}}"#).unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let cancel = CancellationToken::new();
        let handle = scheduler.start(tx, cancel.clone());
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    }
}
