//! Unified document abstraction
//!
//! Format-agnostic contract for digital objects (METS today, IIIF as a
//! sibling backend) and the shared machinery around it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  DocumentCache                          │
//! │  (LRU by location, per-key single-flight construction)  │
//! └─────────────────────────────────────────────────────────┘
//!                            │ sniff()
//!           ┌────────────────┴────────────────┐
//!           ▼                                 ▼
//!   ┌──────────────┐                  ┌──────────────┐
//!   │ MetsDocument │                  │    IIIF      │
//!   │              │                  │  (detected)  │
//!   └──────────────┘                  └──────────────┘
//!           │
//!           ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │                  DocumentState                       │
//!   │  (identity + lazily built facets, scoped metadata)  │
//!   └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use folio_server::document::{CacheConfig, DocumentCache};
//!
//! let cache = DocumentCache::new(CacheConfig::default(), context);
//!
//! let doc = cache.get_instance("https://example.org/mets.xml", 1, false).await?;
//! let toc = doc.table_of_contents();
//! let title = doc.get_titledata(0);
//! let page = doc.get_physical_page("XII");
//! ```

mod cache;
mod error;
mod sniff;
mod source;
mod state;
mod traits;
mod types;

pub use cache::{cache_key, CacheConfig, CacheStats, DocumentCache};
pub use error::{DocumentError, DocumentResult, Result};
pub use sniff::{sniff, SourceFormat};
pub use source::XmlSource;
pub use state::{DocumentContext, DocumentState, LazyFacet, MetadataCache, PageLookup};
pub use traits::Document;
pub use types::{
    DocumentFormat, FileInfo, LogicalNode, PhysicalNode, PhysicalStructure, Pointer, StructLinks,
};
