//! Collaborator contracts: HTTP fetch, object store, message queue.
//!
//! The harvest pipeline only ever talks to these traits; the concrete
//! implementations in this module are the defaults the binary wires up
//! (reqwest, a filesystem-backed store, a file outbox). Tests substitute
//! their own doubles.

mod http;
mod queue;
mod store;

pub use http::ReqwestClient;
pub use queue::FileQueue;
pub use store::FsObjectStore;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::FetchError;

/// Largest number of objects deleted per batch request. Mirrors the provider
/// limit on batched blob deletes.
pub const MAX_DELETE_BATCH: usize = 256;

/// Run-scoped cancellation signal. Cloned into every network call.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that never fires, for contexts without an installed handler.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // receiver outliving the sender reads false forever
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation fires; pends forever if it never does.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Owning side of the cancellation signal, held by `main`.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-text HTTP GET with typed failure classification.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str, cancel: &CancelToken) -> Result<String, FetchError>;
}

/// Durable object storage, organized into named containers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` as `name` inside `container`, returning the object URL.
    /// Creates the container if needed.
    async fn save(
        &self,
        container: &str,
        name: &str,
        bytes: &[u8],
        cancel: &CancelToken,
    ) -> anyhow::Result<String>;

    /// Copy every object from `source` into `dest`, then delete the originals
    /// in batches. `dest` is created if missing; an empty or absent `source`
    /// is not an error.
    async fn back_up_container(
        &self,
        source: &str,
        dest: &str,
        cancel: &CancelToken,
    ) -> anyhow::Result<()>;

    /// Delete every object in `container` in batches, then the container
    /// itself. A missing container is a no-op.
    async fn delete_all(&self, container: &str, cancel: &CancelToken) -> anyhow::Result<()>;
}

/// Message queue for announcing harvested records.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Send one JSON envelope, tagged with the originating source.
    async fn send(&self, envelope: &str, source: &str, cancel: &CancelToken)
        -> anyhow::Result<()>;
}
