//! File-backed message queue: one newline-delimited JSON outbox per source.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{CancelToken, MessageQueue};

#[derive(Debug, Clone)]
pub struct FileQueue {
    outbox_dir: PathBuf,
}

impl FileQueue {
    pub fn new(outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
        }
    }

    /// Path of the outbox file for one source.
    pub fn outbox_path(&self, source: &str) -> PathBuf {
        self.outbox_dir.join(format!("{source}.jsonl"))
    }
}

#[async_trait]
impl MessageQueue for FileQueue {
    async fn send(
        &self,
        envelope: &str,
        source: &str,
        _cancel: &CancelToken,
    ) -> anyhow::Result<()> {
        fs::create_dir_all(&self.outbox_dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.outbox_path(source))
            .await?;
        file.write_all(envelope.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_appends_lines_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(tmp.path());
        let token = CancelToken::never();

        queue.send(r#"{"n":1}"#, "jncc", &token).await.unwrap();
        queue.send(r#"{"n":2}"#, "jncc", &token).await.unwrap();

        let content = std::fs::read_to_string(queue.outbox_path("jncc")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"n":1}"#, r#"{"n":2}"#]);
    }
}
