use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced from [`crate::Executor`]. Only filesystem failures while
/// preparing the cached script propagate here — command exit status and
/// abnormal termination are encoded in the returned `CheckResult` instead
/// (spec.md §4.2, §7).
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to create base directory {path}: {source}")]
    CreateBaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create temporary script for command: {source}")]
    CreateScript {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write script contents: {source}")]
    WriteScript {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set script permissions: {source}")]
    SetPermissions {
        #[source]
        source: std::io::Error,
    },
}
