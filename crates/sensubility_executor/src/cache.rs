//! The script cache: one persisted shell script file per unique command
//! string (spec.md §3, §4.2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::Builder as TempFileBuilder;
use tokio::sync::Mutex;

use crate::error::ExecutorError;

/// Maps a literal command string to the absolute path of the script that
/// runs it. Write-once per key; guarded by a mutex so concurrent workers
/// requesting the same new command serialize on file creation rather than
/// racing (spec.md §5, §9 — "creation under contention MUST be idempotent").
pub struct ScriptCache {
    base_dir: PathBuf,
    entries: Mutex<HashMap<String, PathBuf>>,
}

impl ScriptCache {
    /// Create (if missing) the base directory with owner-only permissions
    /// and an empty cache.
    pub fn new(base_dir: PathBuf) -> Result<Self, ExecutorError> {
        ensure_base_dir(&base_dir)?;
        Ok(Self {
            base_dir,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Return the script path for `command`, creating and persisting a new
    /// script file on first use. Subsequent calls with the same command
    /// string reuse the file; no freshness check, no rotation (spec.md
    /// §4.2).
    pub async fn path_for(&self, command: &str) -> Result<PathBuf, ExecutorError> {
        let mut entries = self.entries.lock().await;
        if let Some(path) = entries.get(command) {
            return Ok(path.clone());
        }
        let path = write_script(&self.base_dir, command)?;
        entries.insert(command.to_string(), path.clone());
        Ok(path)
    }

    /// Remove the base directory and every script under it (spec.md §4.2,
    /// §4.7: executed on clean shutdown, not on crash).
    pub fn clean(&self) {
        let _ = std::fs::remove_dir_all(&self.base_dir);
    }
}

fn ensure_base_dir(dir: &Path) -> Result<(), ExecutorError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|source| ExecutorError::CreateBaseDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    set_owner_only(dir).map_err(|source| ExecutorError::CreateBaseDir {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn set_owner_only(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_owner_only(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn write_script(base_dir: &Path, command: &str) -> Result<PathBuf, ExecutorError> {
    use std::io::Write;

    let mut named = TempFileBuilder::new()
        .prefix("check-")
        .tempfile_in(base_dir)
        .map_err(|source| ExecutorError::CreateScript { source })?;
    write!(named.as_file_mut(), "#!/usr/bin/env sh\n{command}\n")
        .map_err(|source| ExecutorError::WriteScript { source })?;
    named
        .as_file_mut()
        .flush()
        .map_err(|source| ExecutorError::WriteScript { source })?;

    // persist() disables delete-on-drop; the file survives as a real path on
    // disk for the rest of the process lifetime (spec.md §4.2).
    let (file, path) = named
        .keep()
        .map_err(|e| ExecutorError::CreateScript { source: e.error })?;
    drop(file);
    set_executable(&path).map_err(|source| ExecutorError::SetPermissions { source })?;
    Ok(path)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_command_reuses_the_same_script_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScriptCache::new(dir.path().join("scripts")).unwrap();
        let first = cache.path_for("echo hi").await.unwrap();
        let second = cache.path_for("echo hi").await.unwrap();
        assert_eq!(first, second);
        assert!(first.exists());
    }

    #[tokio::test]
    async fn different_commands_get_different_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScriptCache::new(dir.path().join("scripts")).unwrap();
        let a = cache.path_for("echo a").await.unwrap();
        let b = cache.path_for("echo b").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn script_contents_wrap_command_in_a_shebang() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScriptCache::new(dir.path().join("scripts")).unwrap();
        let path = cache.path_for("exit 7").await.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents, "#!/usr/bin/env sh\nexit 7\n");
    }

    #[tokio::test]
    async fn clean_removes_the_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("scripts");
        let cache = ScriptCache::new(base.clone()).unwrap();
        cache.path_for("echo hi").await.unwrap();
        cache.clean();
        assert!(!base.exists());
    }
}
