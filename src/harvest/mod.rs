//! Record harvesters, one per source protocol.

mod link_crawl;
mod paginated;

pub use link_crawl::LinkCrawlHarvester;
pub use paginated::PaginatedSearchHarvester;

use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{CancelToken, HttpFetch};
use crate::config::{ProcessorKind, SourceConfig};
use crate::error::HarvestError;
use crate::models::RawRecord;

/// Discovers and fetches raw records for one source.
///
/// Returns an error only for the two fatal situations (master index fetch,
/// pagination probe); everything else is handled inside the harvester by
/// skipping the affected item or page.
#[async_trait]
pub trait Harvester: Send + Sync {
    async fn harvest(
        &self,
        source: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<RawRecord>, HarvestError>;
}

/// Static registry: resolve a source's processor kind to its harvester.
pub fn for_kind(kind: ProcessorKind, http: Arc<dyn HttpFetch>) -> Box<dyn Harvester> {
    match kind {
        ProcessorKind::LinkCrawl => Box::new(LinkCrawlHarvester::new(http)),
        ProcessorKind::PaginatedSearch => Box::new(PaginatedSearchHarvester::new(http)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared HTTP double for harvester tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::clients::{CancelToken, HttpFetch};
    use crate::error::FetchError;

    /// Scripted HTTP client: maps URLs to canned outcomes and records every
    /// request it sees.
    #[derive(Default)]
    pub struct ScriptedHttp {
        responses: HashMap<String, Result<String, FetchError>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl ScriptedHttp {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(mut self, url: &str, body: &str) -> Self {
            self.responses.insert(url.to_string(), Ok(body.to_string()));
            self
        }

        pub fn fail(mut self, url: &str, err: FetchError) -> Self {
            self.responses.insert(url.to_string(), Err(err));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedHttp {
        async fn get(&self, url: &str, _cancel: &CancelToken) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.responses.get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(err)) => Err(err.clone()),
                None => Err(FetchError::Status(404)),
            }
        }
    }
}
