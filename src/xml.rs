//! Namespace-aware XML plumbing for catalogue records.
//!
//! Three concerns live here: pulling the `gmd:fileIdentifier` out of a record,
//! evaluating mandatory-field node selectors, and splitting a CSW search page
//! into standalone record documents. Everything works off streaming reads;
//! namespaces are resolved from the document itself rather than hard-coded
//! prefixes, so records are free to use whatever prefixes they declare.

use std::collections::{HashMap, HashSet};

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use thiserror::Error;

pub const GMD_NS: &str = "http://www.isotc211.org/2005/gmd";
pub const GCO_NS: &str = "http://www.isotc211.org/2005/gco";
pub const GMX_NS: &str = "http://www.isotc211.org/2005/gmx";
pub const CSW_NS: &str = "http://www.opengis.net/cat/csw/2.0.2";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed xml: {0}")]
    Malformed(#[from] quick_xml::Error),
    #[error("document is not valid utf-8")]
    Encoding,
}

/// Extract the record identifier: the first `gmd:fileIdentifier` element,
/// value taken from its first child element (typically `gco:CharacterString`).
///
/// Returns `None` for malformed documents or blank identifiers; the caller
/// accounts for such records as error items.
pub fn extract_file_identifier(xml: &str) -> Option<String> {
    let mut reader = NsReader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if resolved_is(&reader, &e, GMD_NS, b"fileIdentifier") {
                    return first_child_text(&mut reader);
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Text content of the first child element of the element just entered.
fn first_child_text(reader: &mut NsReader<&[u8]>) -> Option<String> {
    let mut depth = 0usize;
    let mut capturing = false;
    let mut value = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                if depth == 1 {
                    capturing = true;
                }
            }
            Ok(Event::Text(t)) if capturing => value.push_str(&t.unescape().ok()?),
            Ok(Event::CData(t)) if capturing => value.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::End(_)) => {
                if depth == 0 {
                    // left fileIdentifier without seeing a child element
                    return None;
                }
                depth -= 1;
                if depth == 0 && capturing {
                    let v = value.trim();
                    return if v.is_empty() { None } else { Some(v.to_string()) };
                }
            }
            Ok(Event::Empty(_)) if depth == 0 => return None,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Prefix-to-URI table for resolving node-selector segments.
///
/// Seeded with the ISO 19139 prefixes, then overlaid with whatever the
/// document root declares, then with any configured extras.
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    prefixes: HashMap<String, String>,
}

impl NamespaceTable {
    /// Build the table for one record document.
    pub fn for_document(xml: &str) -> Self {
        let mut table = NamespaceTable::default();
        table.insert("gmd", GMD_NS);
        table.insert("gco", GCO_NS);
        table.insert("gmx", GMX_NS);

        let mut reader = NsReader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    for (prefix, uri) in namespace_declarations(&e) {
                        if !prefix.is_empty() {
                            table.insert(&prefix, &uri);
                        }
                    }
                    break;
                }
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
        }
        table
    }

    pub fn insert(&mut self, prefix: &str, uri: &str) {
        self.prefixes.insert(prefix.to_string(), uri.to_string());
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }
}

/// Evaluate a node selector against a document, returning the text value of
/// every matching element in document order.
///
/// The selector is a `/`-separated chain of `prefix:local` segments matched
/// namespace-aware against the open-element stack, anchored at any depth (so
/// `gmd:abstract/gco:CharacterString` behaves like a descendant search). An
/// unresolvable prefix yields no matches.
pub fn select_values(xml: &str, path: &str, table: &NamespaceTable) -> Vec<String> {
    let mut segments: Vec<(Option<String>, String)> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match segment.split_once(':') {
            Some((prefix, local)) => match table.resolve(prefix) {
                Some(uri) => segments.push((Some(uri.to_string()), local.to_string())),
                None => return Vec::new(),
            },
            None => segments.push((None, segment.to_string())),
        }
    }
    if segments.is_empty() {
        return Vec::new();
    }

    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<(Option<String>, String)> = Vec::new();
    let mut values = Vec::new();
    // depth of the currently matched element plus its accumulated text
    let mut capture: Option<(usize, String)> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(resolved_name(&reader, &e));
                if capture.is_none() && stack_matches(&stack, &segments) {
                    capture = Some((stack.len(), String::new()));
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    if let Ok(text) = t.unescape() {
                        buf.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(_)) => {
                if capture.as_ref().is_some_and(|(depth, _)| stack.len() == *depth) {
                    if let Some((_, buf)) = capture.take() {
                        values.push(buf.trim().to_string());
                    }
                }
                stack.pop();
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    values
}

fn stack_matches(stack: &[(Option<String>, String)], segments: &[(Option<String>, String)]) -> bool {
    if stack.len() < segments.len() {
        return false;
    }
    let tail = &stack[stack.len() - segments.len()..];
    tail.iter().zip(segments).all(|(elem, seg)| {
        elem.1 == seg.1
            && seg
                .0
                .as_ref()
                .map(|ns| elem.0.as_deref() == Some(ns.as_str()))
                .unwrap_or(true)
    })
}

/// One page of a CSW `GetRecords` response.
#[derive(Debug, Default)]
pub struct SearchPage {
    /// `nextRecord` attribute of `csw:SearchResults`, when present.
    pub next_record: Option<i64>,
    /// `numberOfRecordsMatched` attribute, when present.
    pub total_matched: Option<u64>,
    /// Each `gmd:MD_Metadata` child serialized as a standalone document.
    pub records: Vec<String>,
}

/// Parse a CSW search page: cursor attributes plus the metadata records
/// directly under `csw:SearchResults`.
///
/// Sliced records re-declare any in-scope namespace prefix their root element
/// does not carry itself, so each stands alone as a well-formed document.
pub fn parse_search_page(xml: &str) -> Result<SearchPage, XmlError> {
    let mut reader = NsReader::from_str(xml);
    let mut page = SearchPage::default();
    // xmlns declarations per open element, outermost first
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut results_depth: Option<usize> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                scopes.push(namespace_declarations(&e));
                let depth = scopes.len();
                if resolved_is(&reader, &e, CSW_NS, b"SearchResults") {
                    read_results_attributes(&e, &mut page);
                    results_depth = Some(depth);
                } else if results_depth == Some(depth - 1)
                    && resolved_is(&reader, &e, GMD_NS, b"MD_Metadata")
                {
                    let span = reader.read_to_end(e.name())?;
                    let inner = &xml[span.start as usize..span.end as usize];
                    page.records.push(standalone_record(&e, inner, &scopes)?);
                    // read_to_end consumed the matching end tag
                    scopes.pop();
                }
            }
            Event::Empty(e) => {
                // a terminal page can carry an empty SearchResults element
                if resolved_is(&reader, &e, CSW_NS, b"SearchResults") {
                    read_results_attributes(&e, &mut page);
                }
            }
            Event::End(_) => {
                scopes.pop();
                if let Some(d) = results_depth {
                    if scopes.len() < d {
                        results_depth = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(page)
}

fn read_results_attributes(e: &BytesStart, page: &mut SearchPage) {
    for attr in e.attributes().with_checks(false).flatten() {
        match attr.key.as_ref() {
            b"nextRecord" => page.next_record = attr_value(&attr).trim().parse().ok(),
            b"numberOfRecordsMatched" => page.total_matched = attr_value(&attr).trim().parse().ok(),
            _ => {}
        }
    }
}

/// Rebuild a record's start tag with inherited namespace declarations added,
/// then splice the untouched inner content back in.
fn standalone_record(
    e: &BytesStart,
    inner: &str,
    scopes: &[Vec<(String, String)>],
) -> Result<String, XmlError> {
    let qname = e.name();
    let name = std::str::from_utf8(qname.as_ref()).map_err(|_| XmlError::Encoding)?;
    let mut tag = format!("<{name}");
    let mut declared: HashSet<String> = HashSet::new();
    for attr in e.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" {
            declared.insert(String::new());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.insert(prefix.to_string());
        }
        tag.push(' ');
        tag.push_str(&key);
        tag.push_str("=\"");
        tag.push_str(&String::from_utf8_lossy(&attr.value));
        tag.push('"');
    }

    // innermost declaration of each prefix wins
    let mut inherited: HashMap<String, String> = HashMap::new();
    for scope in scopes {
        for (prefix, uri) in scope {
            inherited.insert(prefix.clone(), uri.clone());
        }
    }
    let mut extras: Vec<(String, String)> = inherited
        .into_iter()
        .filter(|(prefix, _)| !declared.contains(prefix))
        .collect();
    extras.sort();
    for (prefix, uri) in extras {
        if prefix.is_empty() {
            tag.push_str(&format!(" xmlns=\"{uri}\""));
        } else {
            tag.push_str(&format!(" xmlns:{prefix}=\"{uri}\""));
        }
    }
    tag.push('>');
    Ok(format!("{tag}{inner}</{name}>"))
}

fn resolved_is(reader: &NsReader<&[u8]>, e: &BytesStart, ns: &str, local: &[u8]) -> bool {
    let (resolved, name) = reader.resolve_element(e.name());
    name.as_ref() == local
        && matches!(resolved, ResolveResult::Bound(Namespace(n)) if n == ns.as_bytes())
}

fn resolved_name(reader: &NsReader<&[u8]>, e: &BytesStart) -> (Option<String>, String) {
    let (resolved, name) = reader.resolve_element(e.name());
    let ns = match resolved {
        ResolveResult::Bound(Namespace(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    };
    (ns, String::from_utf8_lossy(name.as_ref()).into_owned())
}

fn namespace_declarations(e: &BytesStart) -> Vec<(String, String)> {
    let mut decls = Vec::new();
    for attr in e.attributes().with_checks(false).flatten() {
        let key = attr.key.as_ref();
        if key == b"xmlns" {
            decls.push((String::new(), attr_value(&attr)));
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            decls.push((String::from_utf8_lossy(prefix).into_owned(), attr_value(&attr)));
        }
    }
    decls
}

fn attr_value(attr: &Attribute) -> String {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
}
