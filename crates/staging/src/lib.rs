#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Staging directory lifecycle for rapt
//!
//! In-flight downloads live in a staging directory nested under APT's
//! archive cache. Exactly one rapt instance may operate on it at a time,
//! enforced with a non-blocking exclusive advisory lock on the directory
//! itself. The directory holds only ephemeral data: whenever an instance
//! exits, its contents are purged, on the normal path through the guard's
//! `Drop` and on SIGINT through a signal hook.

use fs2::FileExt;
use rapt_errors::{Error, StagingError};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the staging directory under the APT archives directory
pub const STAGING_DIR_NAME: &str = "partial-rapt";

/// Exclusive handle on the staging directory
///
/// Holding a `StagingDir` means this process owns the directory. The
/// advisory lock is released and the contents purged when the handle is
/// dropped, however the run ends.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    // Keeps the advisory lock alive for the lifetime of the handle
    _lock: fs::File,
}

impl StagingDir {
    /// Create (if needed) and lock the staging directory under
    /// `archives_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::CreationFailed`] if the directory cannot be
    /// created, and the benign [`StagingError::LockHeld`] if another
    /// instance already owns it. Acquisition never blocks or waits.
    pub fn acquire(archives_dir: &Path) -> Result<Self, Error> {
        let path = archives_dir.join(STAGING_DIR_NAME);

        fs::create_dir_all(&path).map_err(|e| StagingError::CreationFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let lock = fs::File::open(&path).map_err(|e| StagingError::CreationFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if lock.try_lock_exclusive().is_err() {
            return Err(StagingError::LockHeld {
                path: path.display().to_string(),
            }
            .into());
        }

        tracing::debug!(path = %path.display(), "acquired staging directory");
        Ok(Self { path, _lock: lock })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a SIGINT hook that purges the staging contents before the
    /// process terminates. `Drop` already covers normal and error exits;
    /// this covers an interrupt arriving mid-download.
    pub fn install_signal_purge(&self) {
        let path = self.path.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            purge_entries(&path);
            std::process::exit(130);
        }) {
            tracing::warn!("could not install interrupt handler: {e}");
        }
    }

    /// Atomically move a verified file out of staging into `dest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::PromotionFailed`] if the rename fails, for
    /// example across filesystem boundaries. Promotion is rename-only by
    /// design: the file must never exist half-written in the cache.
    pub async fn promote(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, Error> {
        let from = self.path.join(name);
        let to = dest_dir.join(name);
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StagingError::PromotionFailed {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(to)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        purge_entries(&self.path);
    }
}

/// Remove every entry in the staging directory, leaving the directory
/// itself in place. Errors are logged, not propagated: purging runs on
/// exit paths where there is nothing left to abort.
fn purge_entries(path: &Path) {
    let Ok(entries) = fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        let entry_path = entry.path();
        let result = if entry_path.is_dir() {
            fs::remove_dir_all(&entry_path)
        } else {
            fs::remove_file(&entry_path)
        };
        if let Err(e) = result {
            tracing::warn!(path = %entry_path.display(), "failed to purge staging entry: {e}");
        }
    }
}
