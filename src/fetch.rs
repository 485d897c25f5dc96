//! Source fetching
//!
//! The only network I/O of the core: the initial document fetch and the
//! per-file full-text fetches. Timeouts are the fetcher's concern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::document::{DocumentError, DocumentResult};

/// Retrieves raw bytes for a location
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> DocumentResult<Vec<u8>>;
}

const FILE_SCHEME: &str = "file://";

fn has_scheme(location: &str, scheme: &str) -> bool {
    location.len() > scheme.len() && location.starts_with(scheme)
}

/// True for absolute HTTP(S) URLs, and for `file://` references when
/// local files are allowed
pub fn is_valid_location(location: &str, allow_files: bool) -> bool {
    has_scheme(location, "http://")
        || has_scheme(location, "https://")
        || (allow_files && has_scheme(location, FILE_SCHEME))
}

/// Fetcher for HTTP(S) URLs and, when enabled, local `file://` references
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    allow_files: bool,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> DocumentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
            allow_files: false,
        })
    }

    /// Serve `file://` locations from the local filesystem
    pub fn with_file_access(mut self, allow: bool) -> Self {
        self.allow_files = allow;
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> DocumentResult<Vec<u8>> {
        if !is_valid_location(location, self.allow_files) {
            tracing::warn!("Refusing to fetch {}", location);
            return Err(DocumentError::InvalidLocation(location.to_string()));
        }
        if let Some(path) = location.strip_prefix(FILE_SCHEME) {
            return Ok(tokio::fs::read(path).await?);
        }

        let response = self.client.get(location).send().await.map_err(|e| {
            if e.is_timeout() {
                DocumentError::Timeout(self.timeout_secs)
            } else {
                DocumentError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(DocumentError::FetchError(format!(
                "{} returned {}",
                location,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// In-memory fetcher serving preloaded sources
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    sources: RwLock<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &str, content: impl Into<Vec<u8>>) {
        self.sources.write().insert(location.to_string(), content.into());
    }

    pub fn with_source(self, location: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(location, content);
        self
    }

    /// Number of fetch calls served so far (hits and misses)
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, location: &str) -> DocumentResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.sources
            .read()
            .get(location)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(location.to_string()))
    }
}
