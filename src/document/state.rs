//! Shared per-document state
//!
//! Every backend embeds one `DocumentState`. It carries the identity fields
//! and the lazily built facets the provided `Document` methods read and fill.
//!
//! # Thread Safety
//!
//! Facets use `parking_lot::RwLock` and are computed outside the lock, so a
//! facet builder may read other facets without deadlocking. When two callers
//! race on an unloaded facet, both compute and the first stored value wins;
//! a facet is therefore either absent or complete, never partially visible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::types::{LogicalNode, PhysicalStructure, StructLinks};
use crate::config::FileGroups;
use crate::fetch::Fetcher;
use crate::formats::FormatRegistry;
use crate::metadata::{MetadataRecord, MetadataRegistry, ScopeId, StructureRegistry};

/// Collaborators handed to every document
#[derive(Clone)]
pub struct DocumentContext {
    pub file_groups: FileGroups,
    pub formats: Arc<FormatRegistry>,
    pub metadata: Arc<dyn MetadataRegistry>,
    pub structures: Arc<dyn StructureRegistry>,
    pub fetcher: Arc<dyn Fetcher>,
}

/// Value computed on first access and kept until reset
#[derive(Debug)]
pub struct LazyFacet<T> {
    value: RwLock<Option<Arc<T>>>,
}

impl<T> Default for LazyFacet<T> {
    fn default() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }
}

impl<T> LazyFacet<T> {
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> Arc<T> {
        if let Some(value) = self.value.read().as_ref() {
            return value.clone();
        }
        let computed = Arc::new(init());
        self.value.write().get_or_insert(computed).clone()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.read().is_some()
    }

    pub fn reset(&self) {
        *self.value.write() = None;
    }
}

/// Metadata records built for one configuration scope
#[derive(Debug, Default)]
pub struct MetadataCache {
    pub scope: ScopeId,
    pub records: HashMap<String, MetadataRecord>,
}

/// Most recent page-label lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLookup {
    pub label: String,
    pub page: Option<usize>,
}

/// Identity and lazily built facets of a document
pub struct DocumentState {
    location: String,
    pid: ScopeId,
    cpid: AtomicU32,
    record_id: Option<String>,
    parent_id: AtomicU64,
    ready: bool,
    context: Arc<DocumentContext>,

    pub(crate) physical: LazyFacet<PhysicalStructure>,
    pub(crate) links: LazyFacet<StructLinks>,
    pub(crate) toplevel: LazyFacet<String>,
    pub(crate) has_fulltext: LazyFacet<bool>,
    pub(crate) toc: LazyFacet<Vec<LogicalNode>>,
    pub(crate) logical_units: RwLock<HashMap<String, LogicalNode>>,
    pub(crate) metadata: RwLock<MetadataCache>,
    pub(crate) thumbnail: RwLock<Option<String>>,
    pub(crate) full_text: RwLock<HashMap<String, String>>,
    pub(crate) last_page_lookup: RwLock<Option<PageLookup>>,
    page_scans: AtomicUsize,
}

impl DocumentState {
    pub fn new(
        location: &str,
        pid: ScopeId,
        record_id: Option<String>,
        ready: bool,
        context: Arc<DocumentContext>,
    ) -> Self {
        Self {
            location: location.to_string(),
            pid,
            cpid: AtomicU32::new(0),
            record_id,
            parent_id: AtomicU64::new(0),
            ready,
            context,
            physical: LazyFacet::default(),
            links: LazyFacet::default(),
            toplevel: LazyFacet::default(),
            has_fulltext: LazyFacet::default(),
            toc: LazyFacet::default(),
            logical_units: RwLock::new(HashMap::new()),
            metadata: RwLock::new(MetadataCache::default()),
            thumbnail: RwLock::new(None),
            full_text: RwLock::new(HashMap::new()),
            last_page_lookup: RwLock::new(None),
            page_scans: AtomicUsize::new(0),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn pid(&self) -> ScopeId {
        self.pid
    }

    pub fn cpid(&self) -> ScopeId {
        self.cpid.load(Ordering::SeqCst)
    }

    pub fn set_cpid(&self, scope: ScopeId) {
        self.cpid.store(scope, Ordering::SeqCst);
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn parent_id(&self) -> u64 {
        self.parent_id.load(Ordering::SeqCst)
    }

    pub fn set_parent_id(&self, parent_id: u64) {
        self.parent_id.store(parent_id, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn context(&self) -> &DocumentContext {
        &self.context
    }

    /// Explicit scope, else the document's configured scope, else its pid
    pub fn effective_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        [scope, self.cpid(), self.pid]
            .into_iter()
            .find(|candidate| *candidate > 0)
    }

    pub(crate) fn cached_metadata(&self, id: &str, scope: ScopeId) -> Option<MetadataRecord> {
        let cache = self.metadata.read();
        if cache.scope != scope {
            return None;
        }
        cache.records.get(id).cloned()
    }

    /// Store a record; a scope change drops every record of the old scope
    pub(crate) fn store_metadata(&self, id: &str, scope: ScopeId, record: MetadataRecord) {
        let mut cache = self.metadata.write();
        if cache.scope != scope {
            cache.records.clear();
            cache.scope = scope;
        }
        cache.records.insert(id.to_string(), record);
    }

    /// Remember every node of a (sub)tree by ID, without children
    pub(crate) fn remember_logical(&self, node: &LogicalNode) {
        let mut units = self.logical_units.write();
        node.walk(
            &mut |visited, _| {
                units.insert(visited.id.clone(), visited.without_children());
            },
            0,
        );
    }

    pub(crate) fn count_page_scan(&self) {
        self.page_scans.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of label scans over the physical structure (instrumentation)
    pub fn page_scans(&self) -> usize {
        self.page_scans.load(Ordering::SeqCst)
    }

    /// Drop every lazily built facet; identity fields are kept
    pub fn reset(&self) {
        self.physical.reset();
        self.links.reset();
        self.toplevel.reset();
        self.has_fulltext.reset();
        self.toc.reset();
        self.logical_units.write().clear();
        *self.metadata.write() = MetadataCache::default();
        *self.thumbnail.write() = None;
        self.full_text.write().clear();
        *self.last_page_lookup.write() = None;
    }
}
