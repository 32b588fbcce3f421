//! HTTP client backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{CancelToken, HttpFetch};
use crate::error::FetchError;

const USER_AGENT: &str = concat!("geoharvest/", env!("CARGO_PKG_VERSION"));

/// Default HTTP client for catalogue endpoints.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestClient {
    async fn get(&self, url: &str, cancel: &CancelToken) -> Result<String, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.client.get(url).send() => {
                let response = result.map_err(classify)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status(status.as_u16()));
                }
                response.text().await.map_err(classify)
            }
        }
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::TimedOut
    } else {
        FetchError::Transport(err.to_string())
    }
}
