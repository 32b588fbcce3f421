//! Domain models for harvested records and queue envelopes.

mod message;

pub use message::{DataFormat, DataStandard, MessageType, RecordMessage};

use chrono::{DateTime, Utc};

/// A raw metadata record produced by a harvester.
///
/// The identifier may be empty when the record lacks a `fileIdentifier`
/// element; such records are still yielded so the coordinator can account
/// for them as error items.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub file_identifier: String,
    pub content: String,
}

impl RawRecord {
    pub fn new(file_identifier: Option<String>, content: String) -> Self {
        Self {
            file_identifier: file_identifier.unwrap_or_default(),
            content,
        }
    }

    pub fn has_identifier(&self) -> bool {
        !self.file_identifier.trim().is_empty()
    }
}

/// Per-record outcome, built up across the save and announce phases.
///
/// Each phase returns a new value rather than mutating in place, so the
/// ordering between phases stays visible at the call sites.
#[derive(Debug, Clone, Default)]
pub struct HarvestedFile {
    pub file_identifier: String,
    /// URL of the stored object; empty means the record was never persisted
    /// and is therefore excluded from announcement.
    pub blob_url: String,
    pub error_message: Option<String>,
    /// None until the announce phase has run for this record.
    pub has_message_sent: Option<bool>,
}

impl HarvestedFile {
    /// A record that was persisted successfully.
    pub fn saved(file_identifier: impl Into<String>, blob_url: impl Into<String>) -> Self {
        Self {
            file_identifier: file_identifier.into(),
            blob_url: blob_url.into(),
            error_message: None,
            has_message_sent: None,
        }
    }

    /// A record that failed before or during the save phase.
    pub fn failed(file_identifier: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_identifier: file_identifier.into(),
            blob_url: String::new(),
            error_message: Some(error.into()),
            has_message_sent: None,
        }
    }

    /// Only persisted records are announced.
    pub fn eligible_for_announcement(&self) -> bool {
        !self.blob_url.trim().is_empty()
    }

    /// Result of the announce phase for this record.
    pub fn with_announce_result(mut self, sent: bool, error: Option<String>) -> Self {
        self.has_message_sent = Some(sent);
        if error.is_some() {
            self.error_message = error;
        }
        self
    }
}

/// Counters emitted at the end of a run for one source.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: String,
    pub discovered: usize,
    pub missing_identifier: usize,
    pub invalid: usize,
    pub saved: usize,
    pub save_failed: usize,
    pub queued: usize,
    pub announce_failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn begin(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            discovered: 0,
            missing_identifier: 0,
            invalid: 0,
            saved: 0,
            save_failed: 0,
            queued: 0,
            announce_failed: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }
}
