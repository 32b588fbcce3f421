//! Generational backup and rotation of a source's outputs.
//!
//! Before a run writes anything, the previous run's objects are rotated into
//! `<source>-backup`; once the new run's records are durably stored, the
//! backup generation is deleted. Both the object-store container and the
//! local scratch directory follow the same pattern. A crash between rotate-in
//! and the new write leaves the previous generation intact in the backup
//! location.
//!
//! Rotation failures are logged and swallowed: by the time rotate-out runs the
//! harvested data is already durable, so a failed rotation only costs disk or
//! container growth, never the run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use std::sync::Arc;

use tracing::{debug, error};

use crate::clients::{CancelToken, ObjectStore};

/// Backup location name for a source. Used for both the container and the
/// scratch directory so rotation is idempotent to locate.
pub fn backup_name(source: &str) -> String {
    format!("{source}-backup")
}

pub struct BackupManager {
    store: Arc<dyn ObjectStore>,
    scratch_root: PathBuf,
}

impl BackupManager {
    pub fn new(store: Arc<dyn ObjectStore>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scratch_root: scratch_root.into(),
        }
    }

    /// Rotate the previous generation out of the way before a new run writes.
    ///
    /// Safe to call twice in a row: a repeat call observes the already-rotated
    /// state (empty current location, existing backup) and changes nothing.
    pub async fn rotate_in(&self, source: &str, cancel: &CancelToken) {
        let dest = backup_name(source);
        if let Err(err) = self.store.back_up_container(source, &dest, cancel).await {
            error!(source, %err, "container backup failed");
        }
        if let Err(err) = rotate_directory(&self.scratch_root.join(source), &self.scratch_root.join(&dest)) {
            error!(source, %err, "scratch directory backup failed");
        }
        debug!(source, "rotate-in complete");
    }

    /// Delete the backup generation once the current run's records are
    /// durably persisted. Missing backup locations are a no-op.
    pub async fn rotate_out(&self, source: &str, cancel: &CancelToken) {
        let dest = backup_name(source);
        if let Err(err) = self.store.delete_all(&dest, cancel).await {
            error!(source, %err, "container backup cleanup failed");
        }
        if let Err(err) = delete_directory(&self.scratch_root.join(&dest)) {
            error!(source, %err, "scratch backup cleanup failed");
        }
        debug!(source, "rotate-out complete");
    }
}

/// Atomically rename `current` to `backup`, then recreate `current` empty.
///
/// An existing backup is left alone; the current directory is recreated
/// either way so the new run starts clean.
fn rotate_directory(current: &Path, backup: &Path) -> io::Result<()> {
    if current.is_dir() && !backup.exists() {
        fs::rename(current, backup)?;
    }
    if !current.exists() {
        fs::create_dir_all(current)?;
    }
    Ok(())
}

fn delete_directory(backup: &Path) -> io::Result<()> {
    if backup.exists() {
        fs::remove_dir_all(backup)?;
    }
    Ok(())
}
