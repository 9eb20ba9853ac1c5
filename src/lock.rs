//! Per-stage single-instance guard.
//!
//! Each stage acquires `<lock dir>/<stage>.lock` non-blocking at startup; a
//! second invocation of the same stage finds the file present and exits
//! immediately instead of queueing. The guard releases on every exit path
//! through `Drop`. Different stages use different files, so `import` and
//! `verify` may run concurrently against the WAL store.
//!
//! A hard kill can leave a stale file behind; the error message names the
//! path and the holder's PID so the operator can remove it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("stage '{stage}' is already running (held by pid {pid}; lock file {path})")]
    Held {
        stage: String,
        pid: String,
        path: PathBuf,
    },

    #[error("lock file error: {0}")]
    Io(#[from] std::io::Error),
}

/// RAII guard for one stage. Dropping removes the lock file.
pub struct StageLock {
    path: PathBuf,
}

impl StageLock {
    /// Acquire the lock for `stage`, failing fast if it is already held.
    pub fn acquire(dir: &Path, stage: &str) -> Result<Self, LockError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.lock", stage));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                log::debug!("acquired {} lock at {}", stage, path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(LockError::Held {
                    stage: stage.to_string(),
                    pid,
                    path,
                })
            }
            Err(e) => Err(LockError::Io(e)),
        }
    }
}

impl Drop for StageLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}
