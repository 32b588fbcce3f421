//! Harvester for CSW-style paginated search endpoints.
//!
//! A probe request with a page size of one learns the total record count
//! before the real page loop starts; without that count the loop could not
//! terminate on a server that keeps emitting cursors. Probe failure is the
//! only fatal outcome here: a failed page is logged, skipped, and the loop
//! moves to the next offset.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::Harvester;
use crate::clients::{CancelToken, HttpFetch};
use crate::config::SourceConfig;
use crate::error::{FetchError, HarvestError};
use crate::models::RawRecord;
use crate::xml::{extract_file_identifier, parse_search_page};

/// Records requested per page.
const PAGE_SIZE: u64 = 100;

/// Pagination state, recomputed from each response. Never persisted.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    start_position: u64,
    page_size: u64,
    /// Fixed once the probe reports it.
    total_records: u64,
}

impl PageCursor {
    fn has_more(&self) -> bool {
        self.start_position <= self.total_records
    }

    fn skip_page(&mut self) {
        self.start_position += self.page_size;
    }
}

pub struct PaginatedSearchHarvester {
    http: Arc<dyn HttpFetch>,
}

impl PaginatedSearchHarvester {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    fn page_url(source: &SourceConfig, start_position: u64, max_records: u64) -> String {
        source
            .endpoint_url()
            .replace("{{maxRecords}}", &max_records.to_string())
            .replace("{{startPosition}}", &start_position.to_string())
    }

    /// Learn the total record count with a single one-record request.
    async fn probe_total(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<u64, HarvestError> {
        let url = Self::page_url(source, 1, 1);
        let body = self.http.get(&url, cancel).await.map_err(|cause| {
            error!(source = %source.name, %cause, "pagination probe failed");
            HarvestError::unreachable(&source.name, cause)
        })?;
        let page = parse_search_page(&body).map_err(|e| {
            HarvestError::unreachable(
                &source.name,
                FetchError::Transport(format!("probe response unparseable: {e}")),
            )
        })?;
        page.total_matched.ok_or_else(|| {
            HarvestError::unreachable(
                &source.name,
                FetchError::Transport("probe response missing numberOfRecordsMatched".into()),
            )
        })
    }

    /// Fetch one page, retrying up to the source's configured limit.
    async fn fetch_page(
        &self,
        source: &SourceConfig,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.http.get(url, cancel).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if attempt >= source.page_retry_limit {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(source = %source.name, %err, attempt, "page fetch failed, retrying");
                }
            }
        }
    }
}

#[async_trait]
impl Harvester for PaginatedSearchHarvester {
    async fn harvest(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<RawRecord>, HarvestError> {
        let total = self.probe_total(source, cancel).await?;
        debug!(source = %source.name, total, "probe complete");

        let mut cursor = PageCursor {
            start_position: 1,
            page_size: PAGE_SIZE,
            total_records: total,
        };
        let mut records = Vec::new();

        while cursor.has_more() {
            let url = Self::page_url(source, cursor.start_position, cursor.page_size);
            let body = match self.fetch_page(source, &url, cancel).await {
                Ok(body) => body,
                Err(err) => {
                    // non-probe failures never abort the run
                    warn!(
                        source = %source.name,
                        start_position = cursor.start_position,
                        %err,
                        "skipping failed page"
                    );
                    cursor.skip_page();
                    continue;
                }
            };
            let page = match parse_search_page(&body) {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        source = %source.name,
                        start_position = cursor.start_position,
                        %err,
                        "skipping unparseable page"
                    );
                    cursor.skip_page();
                    continue;
                }
            };

            for content in page.records {
                let identifier = extract_file_identifier(&content);
                records.push(RawRecord::new(identifier, content));
            }

            match page.next_record {
                Some(next) if next > 0 => {
                    if (next as u64) <= cursor.start_position {
                        // cursor stalled; trust the total and stop
                        break;
                    }
                    cursor.start_position = next as u64;
                }
                // no further cursor: terminal page, records above still count
                _ => break,
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorKind;
    use crate::harvest::testing::ScriptedHttp;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "medin".into(),
            kind: ProcessorKind::PaginatedSearch,
            api_base: "https://csw.example.org".into(),
            api_url: "/csw?maxRecords={{maxRecords}}&startPosition={{startPosition}}".into(),
            mandatory_fields: Vec::new(),
            schedule: None,
            page_retry_limit: 0,
        }
    }

    fn url(start: u64, max: u64) -> String {
        format!("https://csw.example.org/csw?maxRecords={max}&startPosition={start}")
    }

    fn page(total: u64, next: i64, ids: &[&str]) -> String {
        let records: String = ids
            .iter()
            .map(|id| {
                format!(
                    "<gmd:MD_Metadata><gmd:fileIdentifier><gco:CharacterString>{id}</gco:CharacterString></gmd:fileIdentifier></gmd:MD_Metadata>"
                )
            })
            .collect();
        format!(
            r#"<csw:GetRecordsResponse xmlns:csw="http://www.opengis.net/cat/csw/2.0.2" xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
                <csw:SearchResults numberOfRecordsMatched="{total}" nextRecord="{next}">{records}</csw:SearchResults>
            </csw:GetRecordsResponse>"#
        )
    }

    #[tokio::test]
    async fn test_single_terminal_page() {
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(&url(1, 1), &page(2, 2, &["PROBE"]))
                .ok(&url(1, 100), &page(2, 0, &["R-1", "R-2"])),
        );
        let harvester = PaginatedSearchHarvester::new(http.clone());

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_identifier, "R-1");
        assert_eq!(records[1].file_identifier, "R-2");
        // probe plus one page
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn test_page_count_follows_total() {
        // total 250 -> pages at 1, 101, 201
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(&url(1, 1), &page(250, 2, &["PROBE"]))
                .ok(&url(1, 100), &page(250, 101, &["A"]))
                .ok(&url(101, 100), &page(250, 201, &["B"]))
                .ok(&url(201, 100), &page(250, 251, &["C"])),
        );
        let harvester = PaginatedSearchHarvester::new(http.clone());

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(http.request_count(), 4);
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal() {
        let http = Arc::new(ScriptedHttp::new().fail(&url(1, 1), FetchError::TimedOut));
        let harvester = PaginatedSearchHarvester::new(http);

        let err = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), FetchError::TimedOut));
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped_not_fatal() {
        // total 250; middle page fails, loop advances by page size and continues
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(&url(1, 1), &page(250, 2, &["PROBE"]))
                .ok(&url(1, 100), &page(250, 101, &["A"]))
                .fail(&url(101, 100), FetchError::Transport("reset".into()))
                .ok(&url(201, 100), &page(250, 0, &["C"])),
        );
        let harvester = PaginatedSearchHarvester::new(http.clone());

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.file_identifier.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_page_retry_limit_retries_before_skipping() {
        let mut src = source();
        src.page_retry_limit = 2;
        // every page request fails: 1 initial + 2 retries per page offset
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(&url(1, 1), &page(100, 2, &["PROBE"]))
                .fail(&url(1, 100), FetchError::TimedOut),
        );
        let harvester = PaginatedSearchHarvester::new(http.clone());

        let records = harvester.harvest(&src, &CancelToken::never()).await.unwrap();
        assert!(records.is_empty());
        // probe + 3 attempts at the single page
        assert_eq!(http.request_count(), 4);
    }

    #[tokio::test]
    async fn test_stalled_cursor_terminates() {
        let http = Arc::new(
            ScriptedHttp::new()
                .ok(&url(1, 1), &page(500, 2, &["PROBE"]))
                .ok(&url(1, 100), &page(500, 1, &["A"])),
        );
        let harvester = PaginatedSearchHarvester::new(http.clone());

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn test_zero_total_yields_nothing() {
        let http = Arc::new(ScriptedHttp::new().ok(&url(1, 1), &page(0, 0, &[])));
        let harvester = PaginatedSearchHarvester::new(http.clone());

        let records = harvester
            .harvest(&source(), &CancelToken::never())
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(http.request_count(), 1);
    }
}
