//! Runs a [`CheckRequest`] as a cached shell script and produces a
//! [`CheckResult`] (spec.md §4.2).

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use sensubility_protocol::{CheckRequest, CheckResult, EXIT_CODE_FAILURE};
use tokio::process::Command;

use crate::cache::ScriptCache;
use crate::error::ExecutorError;

pub struct Executor {
    shell_path: PathBuf,
    cache: ScriptCache,
}

impl Executor {
    pub fn new(tmp_base_dir: PathBuf, shell_path: PathBuf) -> Result<Self, ExecutorError> {
        Ok(Self {
            shell_path,
            cache: ScriptCache::new(tmp_base_dir)?,
        })
    }

    /// Execute `request.command` via the cached script and the configured
    /// shell. Returns `Err` only for filesystem failures preparing the
    /// script; everything about the command's own execution (non-zero exit,
    /// signal death, missing interpreter) is encoded in the returned
    /// `CheckResult` instead (spec.md §4.2, §7).
    pub async fn execute(&self, request: &CheckRequest) -> Result<CheckResult, ExecutorError> {
        let script_path = self.cache.path_for(&request.command).await?;

        let executed = epoch_seconds();
        let start = std::time::Instant::now();

        // The shell and its script are spawned with combined output
        // approximated as stdout-then-stderr concatenation: true fd-level
        // interleaving (as Go's exec.Cmd.CombinedOutput gives) would need a
        // shared pipe the std/tokio process APIs don't expose directly, and
        // no check in this agent's contract depends on cross-stream order.
        let spawn_result = Command::new(&self.shell_path)
            .arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let duration = start.elapsed().as_secs_f64();

        let (output, status) = match spawn_result {
            Ok(out) => {
                let mut combined = out.stdout;
                combined.extend_from_slice(&out.stderr);
                let status = out.status.code().unwrap_or(EXIT_CODE_FAILURE);
                (String::from_utf8_lossy(&combined).into_owned(), status)
            }
            Err(_) => (String::new(), EXIT_CODE_FAILURE),
        };

        Ok(CheckResult {
            command: request.command.clone(),
            name: request.name.clone(),
            issued: request.issued,
            executed,
            duration,
            output,
            status,
        })
    }

    /// Remove the script cache's base directory (spec.md §4.7 shutdown).
    pub fn clean(&self) {
        self.cache.clean();
    }
}

fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str, name: &str) -> CheckRequest {
        CheckRequest {
            command: command.to_string(),
            name: name.to_string(),
            issued: epoch_seconds(),
        }
    }

    async fn executor() -> (Executor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let executor = Executor::new(dir.path().join("scripts"), PathBuf::from("/bin/sh")).unwrap();
        (executor, dir)
    }

    #[tokio::test]
    async fn successful_exit_yields_status_zero() {
        let (executor, _dir) = executor().await;
        let result = executor.execute(&request("exit 0", "ok")).await.unwrap();
        assert_eq!(result.status, 0);
        assert_eq!(result.output, "");
        assert_eq!(result.name, "ok");
    }

    #[tokio::test]
    async fn warning_exit_code_one_is_preserved() {
        let (executor, _dir) = executor().await;
        let result = executor
            .execute(&request("echo hi >&2; exit 1", "warn"))
            .await
            .unwrap();
        assert_eq!(result.status, 1);
        assert!(result.output.contains("hi"));
    }

    #[tokio::test]
    async fn failure_exit_code_passes_through_verbatim() {
        let (executor, _dir) = executor().await;
        let result = executor.execute(&request("exit 7", "fail")).await.unwrap();
        assert_eq!(result.status, 7);
    }

    #[tokio::test]
    async fn shell_operators_are_interpreted_not_tokenized() {
        let (executor, _dir) = executor().await;
        let result = executor
            .execute(&request("echo a && echo b", "shell-ops"))
            .await
            .unwrap();
        assert_eq!(result.status, 0);
        assert_eq!(result.output, "a\nb\n");
    }

    #[tokio::test]
    async fn result_preserves_request_identity() {
        let (executor, _dir) = executor().await;
        let req = request("exit 0", "identity-check");
        let result = executor.execute(&req).await.unwrap();
        assert_eq!(result.name, req.name);
        assert_eq!(result.command, req.command);
        assert_eq!(result.issued, req.issued);
        assert!(result.issued <= result.executed);
        assert!(result.duration >= 0.0);
    }

    #[tokio::test]
    async fn repeated_execution_of_same_command_reuses_script() {
        let (executor, _dir) = executor().await;
        let first = executor.execute(&request("echo reused", "a")).await.unwrap();
        let second = executor.execute(&request("echo reused", "b")).await.unwrap();
        assert_eq!(first.output, second.output);
    }
}
