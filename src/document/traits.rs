//! Document trait
//!
//! Format-agnostic contract shared by all backends. Backends implement the
//! per-format hooks; navigation, caching and metadata scoping are provided
//! on top of them through the embedded `DocumentState`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::{DocumentError, Result};
use super::state::{DocumentContext, DocumentState, PageLookup};
use super::types::{DocumentFormat, FileInfo, LogicalNode, PhysicalStructure, StructLinks};
use crate::metadata::{resolve_root_id, MetadataRecord, RecordStore, ScopeId};

/// A parsed digital object
#[async_trait]
pub trait Document: Send + Sync {
    /// Shared identity and facet state
    fn state(&self) -> &DocumentState;

    fn format(&self) -> DocumentFormat;

    // ---- per-format hooks ----

    /// URL of a file, `""` if unknown
    fn file_location(&self, file_id: &str) -> String;

    /// MIME type of a file, `""` if unknown
    fn file_mime_type(&self, file_id: &str) -> String;

    /// Location suitable for downloading a file as an image
    fn download_location(&self, file_id: &str) -> String;

    fn file_info(&self, file_id: &str) -> Option<FileInfo>;

    fn build_physical_structure(&self) -> PhysicalStructure;

    fn build_struct_links(&self) -> StructLinks;

    /// ID of the logical node representing the whole document, `""` if none
    fn find_toplevel_id(&self) -> String;

    /// Document-level thumbnail for an already validated scope
    fn build_thumbnail(&self, scope: ScopeId) -> String;

    fn detect_full_text(&self) -> bool;

    /// Metadata of a logical node for an already validated scope
    fn build_metadata(&self, id: &str, scope: ScopeId) -> MetadataRecord;

    /// One logical node, with its subtree when `recursive`
    fn build_logical_node(&self, id: &str, recursive: bool) -> Option<LogicalNode>;

    /// Complete logical tree from the top-level nodes
    fn build_table_of_contents(&self) -> Vec<LogicalNode>;

    /// IDs of all logical nodes carrying descriptive metadata
    fn logical_ids_with_metadata(&self) -> Vec<String>;

    /// Format-specific additions to the title data
    fn enrich_titledata(&self, _record: &mut MetadataRecord) {}

    // ---- identity ----

    fn location(&self) -> &str {
        self.state().location()
    }

    fn pid(&self) -> ScopeId {
        self.state().pid()
    }

    fn config_scope(&self) -> ScopeId {
        self.state().cpid()
    }

    fn set_config_scope(&self, scope: ScopeId) {
        self.state().set_cpid(scope);
    }

    fn record_id(&self) -> Option<&str> {
        self.state().record_id()
    }

    fn parent_id(&self) -> u64 {
        self.state().parent_id()
    }

    fn set_parent_id(&self, parent_id: u64) {
        self.state().set_parent_id(parent_id);
    }

    /// UID of the topmost document of a multi-volume work, 0 if none
    fn root_id(&self, records: &dyn RecordStore) -> u64 {
        resolve_root_id(records, self.parent_id())
    }

    /// False when the source lacked its format's root element
    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn context(&self) -> &DocumentContext {
        self.state().context()
    }

    // ---- structure ----

    fn physical_structure(&self) -> Arc<PhysicalStructure> {
        self.state()
            .physical
            .get_or_init(|| self.build_physical_structure())
    }

    fn num_pages(&self) -> usize {
        self.physical_structure().num_pages()
    }

    fn struct_links(&self) -> Arc<StructLinks> {
        self.state().links.get_or_init(|| self.build_struct_links())
    }

    fn toplevel_id(&self) -> String {
        self.state()
            .toplevel
            .get_or_init(|| self.find_toplevel_id())
            .as_ref()
            .clone()
    }

    fn table_of_contents(&self) -> Arc<Vec<LogicalNode>> {
        if let Some(toc) = self.state().toc.get() {
            return toc;
        }
        let toc = self
            .state()
            .toc
            .get_or_init(|| self.build_table_of_contents());
        for node in toc.iter() {
            self.state().remember_logical(node);
        }
        toc
    }

    /// Logical structure lookup
    ///
    /// With an empty `id` this is the table of contents (top-level nodes
    /// only unless `recursive`). Otherwise the result holds the requested
    /// node, or nothing if the document has no such node.
    fn get_logical_structure(&self, id: &str, recursive: bool) -> Vec<LogicalNode> {
        if id.is_empty() {
            let toc = self.table_of_contents();
            return if recursive {
                toc.as_ref().clone()
            } else {
                toc.iter().map(LogicalNode::without_children).collect()
            };
        }
        self.logical_node(id, recursive).into_iter().collect()
    }

    /// Single logical node, memoized by ID unless `recursive`
    fn logical_node(&self, id: &str, recursive: bool) -> Option<LogicalNode> {
        if !recursive {
            if let Some(node) = self.state().logical_units.read().get(id) {
                return Some(node.clone());
            }
        }
        let node = self.build_logical_node(id, recursive)?;
        self.state().remember_logical(&node);
        Some(node)
    }

    /// Nesting level of a logical node in the table of contents (top = 1)
    fn get_structure_depth(&self, id: &str) -> Option<usize> {
        let toc = self.table_of_contents();
        let mut found = None;
        for node in toc.iter() {
            node.walk(
                &mut |visited, depth| {
                    if found.is_none() && visited.id == id {
                        found = Some(depth);
                    }
                },
                1,
            );
            if found.is_some() {
                break;
            }
        }
        found
    }

    /// 1-based page whose order label contains `label`, falling back to 1
    fn get_physical_page(&self, label: &str) -> usize {
        self.find_physical_page(label).unwrap_or(1)
    }

    /// 1-based page whose order label contains `label`
    ///
    /// The most recent lookup is cached. Empty labels never match.
    fn find_physical_page(&self, label: &str) -> Option<usize> {
        if label.is_empty() {
            return None;
        }
        if let Some(last) = self.state().last_page_lookup.read().as_ref() {
            if last.label == label {
                return last.page;
            }
        }

        self.state().count_page_scan();
        let page = self
            .physical_structure()
            .pages()
            .find(|(_, node)| node.orderlabel.contains(label))
            .map(|(page, _)| page);

        *self.state().last_page_lookup.write() = Some(PageLookup {
            label: label.to_string(),
            page,
        });
        page
    }

    // ---- metadata ----

    /// Canonical metadata of a logical node
    ///
    /// `scope` 0 falls back to the configured scope, then to the pid. Records
    /// are cached per scope; asking for another scope rebuilds from scratch.
    fn get_metadata(&self, id: &str, scope: ScopeId) -> MetadataRecord {
        let Some(scope) = self.state().effective_scope(scope) else {
            tracing::error!("Invalid PID 0 for metadata definitions of {}", self.location());
            return MetadataRecord::default();
        };

        if let Some(record) = self.state().cached_metadata(id, scope) {
            return record;
        }

        let record = self.build_metadata(id, scope);
        self.state().store_metadata(id, scope, record.clone());
        record
    }

    /// Metadata of every logical node carrying a descriptive section
    fn metadata_array(&self, scope: ScopeId) -> BTreeMap<String, MetadataRecord> {
        let Some(scope) = self.state().effective_scope(scope) else {
            tracing::error!("Invalid PID 0 for metadata definitions of {}", self.location());
            return BTreeMap::new();
        };

        self.logical_ids_with_metadata()
            .into_iter()
            .map(|id| {
                let record = self.get_metadata(&id, scope);
                (id, record)
            })
            .collect()
    }

    /// Metadata of the toplevel node plus structural details and record id
    fn get_titledata(&self, scope: ScopeId) -> MetadataRecord {
        let toplevel = self.toplevel_id();
        let mut record = self.get_metadata(&toplevel, scope);
        self.enrich_titledata(&mut record);

        if record.has_field("record_id") {
            if let Some(record_id) = self.record_id() {
                if !record.contains_value("record_id", record_id) {
                    record.prepend("record_id", record_id);
                }
            }
        }
        record
    }

    /// Thumbnail URL of the document, `""` if none
    fn thumbnail(&self, force_reload: bool) -> String {
        if !force_reload {
            if let Some(thumbnail) = self.state().thumbnail.read().as_ref() {
                return thumbnail.clone();
            }
        }

        let thumbnail = match self.state().effective_scope(0) {
            None => {
                tracing::error!("Invalid PID 0 for structure definitions of {}", self.location());
                String::new()
            }
            Some(_) if self.context().file_groups.thumbs.is_empty() => {
                tracing::warn!("No file group for thumbnails specified");
                String::new()
            }
            Some(scope) => self.build_thumbnail(scope),
        };

        *self.state().thumbnail.write() = Some(thumbnail.clone());
        thumbnail
    }

    // ---- full text ----

    fn has_fulltext(&self) -> bool {
        *self.state().has_fulltext.get_or_init(|| self.detect_full_text())
    }

    /// MiniOCR full text of a physical node, `""` on any failure
    async fn get_full_text(&self, id: &str) -> String {
        let cached = self.state().full_text.read().get(id).cloned();
        if let Some(text) = cached {
            return text;
        }

        if !self.has_fulltext() {
            tracing::debug!("No full text available in {}", self.location());
            return String::new();
        }

        let file_id = {
            let physical = self.physical_structure();
            let Some(node) = physical.node(id) else {
                tracing::warn!("Invalid structure node @ID \"{}\"", id);
                return String::new();
            };
            self.context()
                .file_groups
                .fulltext
                .iter()
                .find_map(|group| node.files.get(group).cloned())
        };
        let Some(file_id) = file_id else {
            tracing::warn!("No full text file for structure node @ID \"{}\"", id);
            return String::new();
        };

        let location = self.file_location(&file_id);
        match load_full_text(self.context(), &location).await {
            Ok(text) => {
                self.state()
                    .full_text
                    .write()
                    .insert(id.to_string(), text.clone());
                text
            }
            Err(e) => {
                tracing::warn!(
                    "Couldn't load full text for structure node @ID \"{}\": {}",
                    id,
                    e
                );
                String::new()
            }
        }
    }

    /// Discard every lazily built facet so the next access re-derives it
    fn reset(&self) {
        self.state().reset();
    }
}

/// Fetch a full-text file and convert it with the extractor registered for
/// its root element
async fn load_full_text(context: &DocumentContext, location: &str) -> Result<String> {
    if location.is_empty() {
        return Err(DocumentError::NotFound("full text file location".to_string()));
    }

    let bytes = context.fetcher.fetch(location).await?;
    let content = String::from_utf8(bytes)?;
    let xml = roxmltree::Document::parse(&content)?;
    let root = xml.root_element();
    let text_format = root.tag_name().name().to_uppercase();

    let extractor = context
        .formats
        .full_text_extractor(&text_format)
        .ok_or_else(|| DocumentError::UnsupportedFormat(text_format.clone()))?;
    extractor.text_as_mini_ocr(root)
}
