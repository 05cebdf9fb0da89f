//! Leveled, file-backed logging for the agent and its collaborators.
//!
//! A record is only written if its level is at or above the configured
//! threshold. Built on `tracing`/`tracing-subscriber` rather than a hand
//! rolled level check.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// The four levels the agent's config and CLI flags can select, matching
/// `original_source/logging/logger.go`'s `LogLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse the `[default] log_level` config value (`DEBUG`/`INFO`/
    /// `WARNING`/`ERROR`).
    pub fn from_config_value(value: &str) -> Option<Self> {
        match value {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Resolve the level implied by the agent's three mutually exclusive CLI
    /// flags. Precedence is `silent > debug > verbose` as specified (spec.md
    /// §6); absent any flag, `fallback` (normally the configured
    /// `log_level`) is used.
    pub fn from_cli_flags(debug: bool, verbose: bool, silent: bool, fallback: LogLevel) -> Self {
        if silent {
            LogLevel::Error
        } else if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            fallback
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

/// Append-only file writer shared across the file layer's [`tracing`]
/// sink, serializing concurrent writes behind a mutex (spec.md §5). The
/// inner file handle is swappable so a later [`init_logging`] call can
/// redirect output to a new path without re-registering the subscriber.
#[derive(Clone)]
struct SharedAppendWriter {
    inner: Arc<Mutex<std::fs::File>>,
}

impl SharedAppendWriter {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(open_append(path)?)),
        })
    }

    fn redirect(&self, path: &Path) -> io::Result<()> {
        let file = open_append(path)?;
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        *guard = file;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

struct SharedAppendWriterGuard(Arc<Mutex<std::fs::File>>);

impl Write for SharedAppendWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedAppendWriter {
    type Writer = SharedAppendWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedAppendWriterGuard(Arc::clone(&self.inner))
    }
}

/// Handles into the already-installed subscriber, kept so a second
/// [`init_logging`] call can redirect the file path and adjust the level
/// without attempting to set a second global subscriber (which `tracing`
/// forbids).
struct LogHandle {
    writer: SharedAppendWriter,
    file_filter: reload::Handle<EnvFilter, tracing_subscriber::Registry>,
}

static LOG_HANDLE: OnceLock<LogHandle> = OnceLock::new();

/// Initialize leveled logging: a non-ANSI file layer at `path` filtered to
/// `level`, mirrored to stderr. Callable twice per the agent's two-stage
/// startup (spec.md §4.7): an early logger before config is known, then
/// re-opened at the configured path/level once config is loaded. The first
/// call registers the global `tracing` subscriber; later calls redirect the
/// existing file writer and filter instead of re-registering one (`tracing`
/// allows exactly one global subscriber per process).
pub fn init_logging(path: &Path, level: LogLevel) -> Result<()> {
    if let Some(handle) = LOG_HANDLE.get() {
        handle
            .writer
            .redirect(path)
            .with_context(|| format!("failed to open log file at {}", path.display()))?;
        handle
            .file_filter
            .reload(EnvFilter::new(level.as_filter_str()))
            .context("failed to update log level filter")?;
        return Ok(());
    }

    let writer = SharedAppendWriter::open(path)
        .with_context(|| format!("failed to open log file at {}", path.display()))?;
    let (file_filter, file_filter_handle) =
        reload::Layer::new(EnvFilter::new(level.as_filter_str()));
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer.clone())
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("global tracing subscriber already set: {e}"))?;

    let _ = LOG_HANDLE.set(LogHandle {
        writer,
        file_filter: file_filter_handle,
    });
    Ok(())
}

/// Default log file path (spec.md §6).
pub fn default_log_path() -> PathBuf {
    PathBuf::from("/var/log/collectd/sensubility.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_outranks_debug_and_verbose() {
        assert_eq!(
            LogLevel::from_cli_flags(true, true, true, LogLevel::Warn),
            LogLevel::Error
        );
    }

    #[test]
    fn debug_outranks_verbose() {
        assert_eq!(
            LogLevel::from_cli_flags(true, true, false, LogLevel::Warn),
            LogLevel::Debug
        );
    }

    #[test]
    fn verbose_alone_selects_info() {
        assert_eq!(
            LogLevel::from_cli_flags(false, true, false, LogLevel::Warn),
            LogLevel::Info
        );
    }

    #[test]
    fn no_flags_uses_fallback() {
        assert_eq!(
            LogLevel::from_cli_flags(false, false, false, LogLevel::Error),
            LogLevel::Error
        );
    }

    #[test]
    fn config_value_parsing_matches_validator_options() {
        assert_eq!(LogLevel::from_config_value("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_config_value("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_config_value("bogus"), None);
    }

    #[test]
    fn init_logging_creates_file_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.log");
        init_logging(&path, LogLevel::Warn).unwrap();
        assert!(path.exists());
    }

    /// The agent's two-stage startup (spec.md §4.7) calls `init_logging`
    /// once before config is loaded and once after; the second call must
    /// redirect to the configured path rather than erroring because a
    /// global subscriber is already installed.
    #[test]
    fn second_init_logging_call_redirects_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let early_path = dir.path().join("early.log");
        let configured_path = dir.path().join("configured.log");
        init_logging(&early_path, LogLevel::Warn).unwrap();
        init_logging(&configured_path, LogLevel::Debug).unwrap();
        assert!(configured_path.exists());
    }
}
