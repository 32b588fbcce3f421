//! Harvester for WAF-style sources: a static HTML index whose anchors point
//! at individual metadata documents.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{error, info, warn};
use url::Url;

use super::Harvester;
use crate::clients::{CancelToken, HttpFetch};
use crate::config::SourceConfig;
use crate::error::{FetchError, HarvestError};
use crate::models::RawRecord;
use crate::xml::extract_file_identifier;

pub struct LinkCrawlHarvester {
    http: Arc<dyn HttpFetch>,
}

impl LinkCrawlHarvester {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Harvester for LinkCrawlHarvester {
    async fn harvest(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<RawRecord>, HarvestError> {
        let index_url = source.endpoint_url();
        let html = self.http.get(&index_url, cancel).await.map_err(|cause| {
            error!(source = %source.name, %cause, "master index fetch failed");
            HarvestError::unreachable(&source.name, cause)
        })?;

        let links = extract_document_links(&html);
        info!(source = %source.name, links = links.len(), "document links discovered");

        let base = Url::parse(&index_url).map_err(|e| {
            HarvestError::unreachable(
                &source.name,
                FetchError::Transport(format!("invalid index url {index_url}: {e}")),
            )
        })?;

        let mut records = Vec::with_capacity(links.len());
        for link in &links {
            let document_url = match base.join(link) {
                Ok(u) => u,
                Err(err) => {
                    warn!(source = %source.name, link = %link, %err, "skipping malformed link");
                    continue;
                }
            };
            match self.http.get(document_url.as_str(), cancel).await {
                Ok(xml) => {
                    let identifier = extract_file_identifier(&xml);
                    records.push(RawRecord::new(identifier, xml));
                }
                Err(err) if err.is_not_found() => {
                    warn!(source = %source.name, link = %link, "document not found, skipping");
                }
                Err(cause) => {
                    // anything except a 404 on an individual document aborts the run
                    error!(source = %source.name, link = %link, %cause, "document fetch failed");
                    return Err(HarvestError::unreachable(&source.name, cause));
                }
            }
        }
        Ok(records)
    }
}

/// Every anchor href in the index page, in document order.
fn extract_document_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector");
    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorKind;
    use crate::harvest::testing::ScriptedHttp;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "jncc".into(),
            kind: ProcessorKind::LinkCrawl,
            api_base: "https://waf.example.org".into(),
            api_url: "/waf/index.html".into(),
            mandatory_fields: Vec::new(),
            schedule: None,
            page_retry_limit: 0,
        }
    }

    fn record_xml(id: &str) -> String {
        format!(
            r#"<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
                <gmd:fileIdentifier><gco:CharacterString>{id}</gco:CharacterString></gmd:fileIdentifier>
            </gmd:MD_Metadata>"#
        )
    }

    #[test]
    fn test_extract_document_links() {
        let html = r#"<html><body>
            <a href="a.xml">a</a>
            <a href="b.xml">b</a>
            <a name="no-href">skip</a>
        </body></html>"#;
        assert_eq!(extract_document_links(html), vec!["a.xml", "b.xml"]);
    }

    #[tokio::test]
    async fn test_one_fetch_per_link() {
        let http = ScriptedHttp::new()
            .ok(
                "https://waf.example.org/waf/index.html",
                r#"<a href="a.xml">a</a><a href="b.xml">b</a>"#,
            )
            .ok("https://waf.example.org/waf/a.xml", &record_xml("A"))
            .ok("https://waf.example.org/waf/b.xml", &record_xml("B"));
        let http = Arc::new(http);
        let harvester = LinkCrawlHarvester::new(http.clone());

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_identifier, "A");
        assert_eq!(records[1].file_identifier, "B");
        // index + one fetch per link
        assert_eq!(http.request_count(), 3);
    }

    #[tokio::test]
    async fn test_master_fetch_failure_is_fatal() {
        let http = Arc::new(
            ScriptedHttp::new().fail("https://waf.example.org/waf/index.html", FetchError::TimedOut),
        );
        let harvester = LinkCrawlHarvester::new(http);

        let err = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), FetchError::TimedOut));
    }

    #[tokio::test]
    async fn test_document_404_is_skipped() {
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(
                    "https://waf.example.org/waf/index.html",
                    r#"<a href="gone.xml">x</a><a href="b.xml">b</a>"#,
                )
                .fail("https://waf.example.org/waf/gone.xml", FetchError::Status(404))
                .ok("https://waf.example.org/waf/b.xml", &record_xml("B")),
        );
        let harvester = LinkCrawlHarvester::new(http);

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_identifier, "B");
    }

    #[tokio::test]
    async fn test_document_transport_failure_aborts() {
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(
                    "https://waf.example.org/waf/index.html",
                    r#"<a href="a.xml">a</a>"#,
                )
                .fail(
                    "https://waf.example.org/waf/a.xml",
                    FetchError::Transport("reset".into()),
                ),
        );
        let harvester = LinkCrawlHarvester::new(http);

        let err = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_blank_identifier_still_yielded() {
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(
                    "https://waf.example.org/waf/index.html",
                    r#"<a href="a.xml">a</a>"#,
                )
                .ok("https://waf.example.org/waf/a.xml", "<metadata>no id</metadata>"),
        );
        let harvester = LinkCrawlHarvester::new(http);

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].has_identifier());
    }

    #[tokio::test]
    async fn test_empty_index_yields_no_records() {
        let http = Arc::new(
            ScriptedHttp::new().ok("https://waf.example.org/waf/index.html", "<html></html>"),
        );
        let harvester = LinkCrawlHarvester::new(http);

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
