//! Filesystem-backed object store.
//!
//! Containers are directories under a single data root; object URLs are
//! `file://` paths. Backup and delete follow the same copy-then-batched-delete
//! shape as the remote blob client they stand in for, so rotation behaves
//! identically against either.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{CancelToken, ObjectStore, MAX_DELETE_BATCH};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    async fn list_objects(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.path());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn save(
        &self,
        container: &str,
        name: &str,
        bytes: &[u8],
        _cancel: &CancelToken,
    ) -> anyhow::Result<String> {
        let dir = self.container_path(container);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(name);
        fs::write(&path, bytes).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn back_up_container(
        &self,
        source: &str,
        dest: &str,
        _cancel: &CancelToken,
    ) -> anyhow::Result<()> {
        let source_dir = self.container_path(source);
        let dest_dir = self.container_path(dest);
        fs::create_dir_all(&dest_dir).await?;
        if !source_dir.exists() {
            // nothing from a previous run; leave the fresh container in place
            fs::create_dir_all(&source_dir).await?;
            return Ok(());
        }

        let objects = self.list_objects(&source_dir).await?;
        for object in &objects {
            if let Some(name) = object.file_name() {
                fs::copy(object, dest_dir.join(name)).await?;
            }
        }
        for batch in objects.chunks(MAX_DELETE_BATCH) {
            for object in batch {
                fs::remove_file(object).await?;
            }
        }
        Ok(())
    }

    async fn delete_all(&self, container: &str, _cancel: &CancelToken) -> anyhow::Result<()> {
        let dir = self.container_path(container);
        if !dir.exists() {
            return Ok(());
        }
        let objects = self.list_objects(&dir).await?;
        for batch in objects.chunks(MAX_DELETE_BATCH) {
            for object in batch {
                fs::remove_file(object).await?;
            }
        }
        fs::remove_dir_all(&dir).await?;
        Ok(())
    }
}
