//! Two-phase run orchestration: persist records, then announce them.
//!
//! The phases are independent on purpose: a save failure marks its record and
//! excludes it from announcement, but never stops the batch, and a failed
//! announcement never stops the remaining records or the closing `End`
//! envelope.

use std::sync::Arc;

use tracing::error;

use crate::clients::{CancelToken, MessageQueue, ObjectStore};
use crate::config::SourceConfig;
use crate::models::{HarvestedFile, RawRecord, RecordMessage};

const SAVE_ERROR: &str = "error occurred while saving the file to storage";
const SEND_ERROR: &str = "error occurred while sending message to harvested-queue";

pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn MessageQueue>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { store, queue }
    }

    /// Persist one record as `<identifier>.xml` in the source's container.
    ///
    /// Storage failures are captured on the returned value; this never
    /// returns an error for a single record.
    pub async fn save(
        &self,
        source_name: &str,
        record: &RawRecord,
        cancel: &CancelToken,
    ) -> HarvestedFile {
        let object_name = format!("{}.xml", record.file_identifier);
        match self
            .store
            .save(source_name, &object_name, record.content.as_bytes(), cancel)
            .await
        {
            Ok(blob_url) => HarvestedFile::saved(&record.file_identifier, blob_url),
            Err(err) => {
                error!(
                    source = source_name,
                    file_id = %record.file_identifier,
                    %err,
                    "{SAVE_ERROR}"
                );
                HarvestedFile::failed(&record.file_identifier, SAVE_ERROR)
            }
        }
    }

    /// Announce a run's batch: `Start`, one `Metadata` per persisted record,
    /// then `End`. Returns the batch with per-record announce outcomes set.
    pub async fn announce(
        &self,
        source: &SourceConfig,
        files: Vec<HarvestedFile>,
        cancel: &CancelToken,
    ) -> Vec<HarvestedFile> {
        let standard = source.data_standard();

        self.send(RecordMessage::start(&source.name, standard), &source.name, cancel)
            .await;

        let mut announced = Vec::with_capacity(files.len());
        for file in files {
            if !file.eligible_for_announcement() {
                announced.push(file);
                continue;
            }
            let message = RecordMessage::metadata(&file.file_identifier, &source.name, standard);
            let sent = self.send(message, &source.name, cancel).await;
            if sent {
                announced.push(file.with_announce_result(true, None));
            } else {
                announced.push(file.with_announce_result(false, Some(SEND_ERROR.to_string())));
            }
        }

        self.send(RecordMessage::end(&source.name, standard), &source.name, cancel)
            .await;
        announced
    }

    /// Serialize and send one envelope. Failures are logged and reported as
    /// `false`; nothing propagates.
    async fn send(&self, message: RecordMessage, source: &str, cancel: &CancelToken) -> bool {
        let envelope = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(err) => {
                error!(source, %err, "{SEND_ERROR}");
                return false;
            }
        };
        match self.queue.send(&envelope, source, cancel).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    source,
                    file_id = %message.file_identifier,
                    %err,
                    "{SEND_ERROR}"
                );
                false
            }
        }
    }
}
