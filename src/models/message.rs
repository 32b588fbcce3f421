//! Queue message envelope for announced records.
//!
//! A run announces `Start`, one `Metadata` per persisted record, then `End`.
//! Downstream enrichment relies on that bracketing to scope a batch.

use serde::{Deserialize, Serialize};

/// Format of the announced payload. Only XML is harvested today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    Xml,
}

/// Metadata standard version, chosen per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStandard {
    Gemini22,
    Gemini23,
}

/// Position of a message within a run's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Start,
    Metadata,
    End,
}

/// Wire envelope announced on the harvested-records queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMessage {
    pub file_identifier: String,
    pub data_format: DataFormat,
    pub data_standard: DataStandard,
    pub data_source: String,
    pub message_type: MessageType,
}

impl RecordMessage {
    /// Batch opener; carries no identifier.
    pub fn start(source: &str, standard: DataStandard) -> Self {
        Self::envelope(String::new(), source, standard, MessageType::Start)
    }

    /// One harvested record.
    pub fn metadata(file_identifier: &str, source: &str, standard: DataStandard) -> Self {
        Self::envelope(
            file_identifier.to_string(),
            source,
            standard,
            MessageType::Metadata,
        )
    }

    /// Batch closer; carries no identifier.
    pub fn end(source: &str, standard: DataStandard) -> Self {
        Self::envelope(String::new(), source, standard, MessageType::End)
    }

    fn envelope(
        file_identifier: String,
        source: &str,
        standard: DataStandard,
        message_type: MessageType,
    ) -> Self {
        Self {
            file_identifier,
            data_format: DataFormat::Xml,
            data_standard: standard,
            data_source: source.to_string(),
            message_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_schema() {
        let msg = RecordMessage::metadata("ID-1", "medin", DataStandard::Gemini23);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["fileIdentifier"], "ID-1");
        assert_eq!(json["dataFormat"], "Xml");
        assert_eq!(json["dataStandard"], "Gemini23");
        assert_eq!(json["dataSource"], "medin");
        assert_eq!(json["messageType"], "Metadata");
    }

    #[test]
    fn test_start_and_end_have_no_identifier() {
        let start = RecordMessage::start("jncc", DataStandard::Gemini22);
        let end = RecordMessage::end("jncc", DataStandard::Gemini22);
        assert!(start.file_identifier.is_empty());
        assert!(end.file_identifier.is_empty());
        assert_eq!(start.message_type, MessageType::Start);
        assert_eq!(end.message_type, MessageType::End);
    }
}
