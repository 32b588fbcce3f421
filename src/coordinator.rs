//! Per-source run sequencing.
//!
//! One run for one source is a strict sequence: rotate the previous
//! generation out of the way, harvest and gate every record, persist the
//! accepted ones, drop the backup generation, then announce what was
//! persisted. The pipeline is sequential per item; failure isolation happens
//! at the record level, not by parallel fan-out.
//!
//! Operational constraint: at most one concurrent run per source. Rotation
//! and container writes take no lock; overlap must be prevented by whatever
//! schedules the runs.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::backup::BackupManager;
use crate::clients::{CancelToken, HttpFetch, MessageQueue, ObjectStore};
use crate::config::{AppConfig, SourceConfig};
use crate::error::HarvestError;
use crate::harvest;
use crate::models::{HarvestedFile, RunSummary};
use crate::orchestrate::Orchestrator;
use crate::validation;

pub struct Coordinator {
    http: Arc<dyn HttpFetch>,
    orchestrator: Orchestrator,
    backup: BackupManager,
    config: AppConfig,
}

impl Coordinator {
    pub fn new(
        config: AppConfig,
        http: Arc<dyn HttpFetch>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        let orchestrator = Orchestrator::new(store.clone(), queue);
        let backup = BackupManager::new(store, config.storage.scratch_dir.clone());
        Self {
            http,
            orchestrator,
            backup,
            config,
        }
    }

    /// Run one full harvest cycle for one source.
    ///
    /// Returns an error only when the source is unreachable at a fatal point;
    /// per-record problems are absorbed into the summary counters.
    pub async fn run_source(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<RunSummary, HarvestError> {
        let mut summary = RunSummary::begin(&source.name);
        info!(source = %source.name, kind = source.kind.as_str(), "harvest run started");

        self.backup.rotate_in(&source.name, cancel).await;

        let harvester = harvest::for_kind(source.kind, self.http.clone());
        let records = harvester.harvest(source, cancel).await?;
        summary.discovered = records.len();

        let mut files = Vec::with_capacity(records.len());
        for record in &records {
            if !record.has_identifier() {
                error!(source = %source.name, "file identifier missing");
                summary.missing_identifier += 1;
                files.push(HarvestedFile::failed("", "file identifier missing"));
                continue;
            }
            if let Some(field) =
                validation::failing_field(record, &source.mandatory_fields, &self.config.namespaces)
            {
                error!(
                    source = %source.name,
                    file_id = %record.file_identifier,
                    field,
                    "mandatory field validation failed"
                );
                summary.invalid += 1;
                files.push(HarvestedFile::failed(
                    &record.file_identifier,
                    format!("mandatory field missing: {field}"),
                ));
                continue;
            }

            let file = self.orchestrator.save(&source.name, record, cancel).await;
            if file.eligible_for_announcement() {
                summary.saved += 1;
            } else {
                summary.save_failed += 1;
            }
            files.push(file);
        }

        // the new generation is durable; the previous one can go
        self.backup.rotate_out(&source.name, cancel).await;

        let files = self.orchestrator.announce(source, files, cancel).await;
        summary.queued = files
            .iter()
            .filter(|f| f.has_message_sent == Some(true))
            .count();
        summary.announce_failed = files
            .iter()
            .filter(|f| f.has_message_sent == Some(false))
            .count();
        summary.finished_at = Utc::now();

        info!(
            source = %source.name,
            discovered = summary.discovered,
            missing_identifier = summary.missing_identifier,
            invalid = summary.invalid,
            saved = summary.saved,
            save_failed = summary.save_failed,
            queued = summary.queued,
            announce_failed = summary.announce_failed,
            "harvest run finished"
        );
        Ok(summary)
    }
}
