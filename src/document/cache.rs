//! Document cache with LRU eviction
//!
//! Explicit, injectable replacement for a process-wide document registry.
//! Documents are keyed by the SHA-256 of their location and evicted in LRU
//! order once `max_documents` is reached.
//!
//! # Thread Safety
//!
//! The cache uses `tokio::sync::RwLock`; documents are shared as
//! `Arc<dyn Document>`. Construction is serialized per key: concurrent
//! misses for one location fetch and parse the source once.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

use super::sniff::{sniff, SourceFormat};
use super::state::DocumentContext;
use super::Document;
use crate::formats::mets::MetsDocument;
use crate::metadata::ScopeId;

/// Cache configuration options
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of parsed documents to keep
    pub max_documents: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_documents: 100 }
    }
}

/// Cache key of a location
pub fn cache_key(location: &str) -> String {
    hex::encode(Sha256::digest(location.as_bytes()))
}

/// Parsed documents by location
#[derive(Clone)]
pub struct DocumentCache {
    documents: Arc<RwLock<LruCache<String, Arc<dyn Document>>>>,

    /// Per-key construction locks
    loading: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>,

    context: Arc<DocumentContext>,

    config: CacheConfig,
}

impl DocumentCache {
    pub fn new(config: CacheConfig, context: Arc<DocumentContext>) -> Self {
        let size = NonZeroUsize::new(config.max_documents).unwrap_or(NonZeroUsize::MIN);

        Self {
            documents: Arc::new(RwLock::new(LruCache::new(size))),
            loading: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            context,
            config,
        }
    }

    pub fn context(&self) -> &Arc<DocumentContext> {
        &self.context
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Document for a location, parsing it on a miss
    ///
    /// Returns `None` if the source is unreachable or its format is not
    /// recognized. With `force_reload` the source is parsed again and the
    /// fresh instance replaces the cached one.
    pub async fn get_instance(
        &self,
        location: &str,
        scope: ScopeId,
        force_reload: bool,
    ) -> Option<Arc<dyn Document>> {
        if !force_reload {
            if let Some(document) = self.get(location).await {
                return Some(document);
            }
        }

        let key = cache_key(location);
        let lock = self.key_lock(&key);
        let guard = lock.lock().await;

        // Another caller may have finished loading while we waited
        let cached = if force_reload {
            None
        } else {
            self.get(location).await
        };
        let document = match cached {
            Some(document) => Some(document),
            None => {
                let loaded = self.load(location, scope).await;
                if let Some(document) = &loaded {
                    self.put(location, document.clone()).await;
                }
                loaded
            }
        };

        drop(guard);
        self.release_key_lock(&key, &lock);
        document
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.loading
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the construction lock of a key unless a newer caller replaced it
    fn release_key_lock(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut loading = self.loading.lock();
        if loading.get(key).is_some_and(|current| Arc::ptr_eq(current, lock)) {
            loading.remove(key);
        }
    }

    async fn load(&self, location: &str, scope: ScopeId) -> Option<Arc<dyn Document>> {
        let bytes = match self.context.fetcher.fetch(location).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Could not load document {}: {}", location, e);
                return None;
            }
        };

        // Offload to blocking task since parsing is CPU-bound
        let source_location = location.to_string();
        let context = self.context.clone();
        let parsed = tokio::task::spawn_blocking(move || match sniff(&bytes) {
            SourceFormat::Mets(xml) => {
                let document = MetsDocument::from_xml(&source_location, scope, xml, context);
                tracing::debug!(
                    "Loaded METS document {} ({} pages)",
                    source_location,
                    document.num_pages()
                );
                let document: Arc<dyn Document> = Arc::new(document);
                Some(document)
            }
            SourceFormat::Iiif(_) => {
                tracing::warn!("No IIIF backend available for {}", source_location);
                None
            }
            SourceFormat::Unrecognized => {
                tracing::error!("Could not determine format of document {}", source_location);
                None
            }
        })
        .await;

        match parsed {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Parsing task for {} failed: {}", location, e);
                None
            }
        }
    }

    /// Cached document for a location
    pub async fn get(&self, location: &str) -> Option<Arc<dyn Document>> {
        let mut documents = self.documents.write().await;
        documents.get(&cache_key(location)).cloned()
    }

    /// Store (or replace) the document of a location
    pub async fn put(&self, location: &str, document: Arc<dyn Document>) {
        let mut documents = self.documents.write().await;
        documents.put(cache_key(location), document);
    }

    /// Drop all cached documents
    pub async fn clear(&self) {
        let mut documents = self.documents.write().await;
        documents.clear();
    }

    pub async fn len(&self) -> usize {
        let documents = self.documents.read().await;
        documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        let documents = self.documents.read().await;
        documents.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let documents = self.documents.read().await;
        CacheStats {
            documents: documents.len(),
            capacity: documents.cap().get(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Number of cached documents
    pub documents: usize,
    /// Cache capacity
    pub capacity: usize,
}
