//! Mandatory-field validation of harvested records.

use std::collections::HashMap;

use crate::config::{FieldKind, MandatoryFieldRule};
use crate::models::RawRecord;
use crate::xml::{select_values, NamespaceTable};

/// Evaluate one rule against a record, returning the extracted value.
///
/// `list` rules join every match with `", "`; `text` rules take the first
/// match. A blank result means the rule failed.
pub fn extract_field(record_xml: &str, rule: &MandatoryFieldRule, table: &NamespaceTable) -> String {
    let values = select_values(record_xml, &rule.path, table);
    match rule.kind {
        FieldKind::List => values.join(", "),
        FieldKind::Text => values.into_iter().next().unwrap_or_default(),
    }
}

/// Name of the first mandatory field that fails, or `None` when the record
/// passes. The namespace table comes from the record's own root declarations
/// overlaid with any configured extras.
pub fn failing_field<'a>(
    record: &RawRecord,
    rules: &'a [MandatoryFieldRule],
    extra_namespaces: &HashMap<String, String>,
) -> Option<&'a str> {
    if rules.is_empty() {
        return None;
    }
    let mut table = NamespaceTable::for_document(&record.content);
    for (prefix, uri) in extra_namespaces {
        table.insert(prefix, uri);
    }
    rules
        .iter()
        .find(|rule| extract_field(&record.content, rule, &table).trim().is_empty())
        .map(|rule| rule.name.as_str())
}

/// True when every mandatory field extracts a non-blank value.
pub fn is_valid(
    record: &RawRecord,
    rules: &[MandatoryFieldRule],
    extra_namespaces: &HashMap<String, String>,
) -> bool {
    failing_field(record, rules, extra_namespaces).is_none()
}
