//! METS document backend

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use roxmltree::{Node, NodeId};
use serde::{Deserialize, Serialize};

use super::sections::{
    attribute, find_logical_div, find_mets, logical_divs, mets_children, node_files,
    read_dmd_sections, read_file_section, read_physical_structure, read_struct_links,
    select_toplevel, top_logical_divs, xlink_attribute, DmdSection, FileSection,
};
use crate::document::{
    Document, DocumentContext, DocumentFormat, DocumentState, FileInfo, LazyFacet, LogicalNode,
    PhysicalStructure, Pointer, StructLinks, XmlSource,
};
use crate::metadata::{xpath, MetadataRecord, ScopeId};

const IIIF_MIME_TYPE: &str = "application/vnd.kitodo.iiif";
const NETFPX_MIME_TYPE: &str = "application/vnd.netfpx";

/// Serializable form of a `MetsDocument`
///
/// Holds the raw source instead of the parsed tree; restoring re-parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub location: String,
    pub pid: ScopeId,
    pub record_id: Option<String>,
    pub parent_id: u64,
    pub source: String,
}

/// Document backed by a METS file
///
/// The source is parsed once on construction; every facet reads the same
/// tree and keeps only owned results.
pub struct MetsDocument {
    state: DocumentState,
    source: Arc<str>,
    xml: Option<XmlSource>,
    mets: Option<NodeId>,
    files: LazyFacet<FileSection>,
    dmd_sections: LazyFacet<HashMap<String, DmdSection>>,
}

/// Facets shared while building one logical (sub)tree
struct LogicalBuild {
    physical: Arc<PhysicalStructure>,
    links: Arc<StructLinks>,
    files: Arc<FileSection>,
    toplevel: String,
}

impl MetsDocument {
    /// Parse and wrap a METS source
    ///
    /// A source without a `mets:mets` element yields a document that is not
    /// ready and whose facets are all empty.
    pub fn new(location: &str, pid: ScopeId, source: &str, context: Arc<DocumentContext>) -> Self {
        let source: Arc<str> = Arc::from(source);
        let xml = match XmlSource::parse(source.clone()) {
            Ok(xml) => Some(xml),
            Err(e) => {
                tracing::error!("Could not parse XML of document with location \"{}\": {}", location, e);
                None
            }
        };
        Self::assemble(location, pid, source, xml, context)
    }

    /// Wrap an already parsed source
    pub fn from_xml(
        location: &str,
        pid: ScopeId,
        xml: XmlSource,
        context: Arc<DocumentContext>,
    ) -> Self {
        let source = xml.shared_text();
        Self::assemble(location, pid, source, Some(xml), context)
    }

    fn assemble(
        location: &str,
        pid: ScopeId,
        source: Arc<str>,
        xml: Option<XmlSource>,
        context: Arc<DocumentContext>,
    ) -> Self {
        let mets_node = xml.as_ref().and_then(|xml| find_mets(xml.tree()));
        if xml.is_some() && mets_node.is_none() {
            tracing::error!("No METS part found in document with location \"{}\"", location);
        }
        let mets = mets_node.map(|node| node.id());
        let record_id = mets_node
            .and_then(|node| node.attribute("OBJID"))
            .map(str::trim)
            .filter(|objid| !objid.is_empty())
            .map(str::to_string);

        Self {
            state: DocumentState::new(location, pid, record_id, mets.is_some(), context),
            source,
            xml,
            mets,
            files: LazyFacet::default(),
            dmd_sections: LazyFacet::default(),
        }
    }

    /// Serializable snapshot (identity plus raw source)
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            location: self.state.location().to_string(),
            pid: self.state.pid(),
            record_id: self.state.record_id().map(str::to_string),
            parent_id: self.state.parent_id(),
            source: self.source.to_string(),
        }
    }

    /// Rebuild a document from a snapshot
    pub fn from_snapshot(snapshot: DocumentSnapshot, context: Arc<DocumentContext>) -> Self {
        let document = Self::new(&snapshot.location, snapshot.pid, &snapshot.source, context);
        document.state.set_parent_id(snapshot.parent_id);
        document
    }

    /// Raw METS source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed source, `None` if it was not well-formed XML
    pub fn xml(&self) -> Option<&XmlSource> {
        self.xml.as_ref()
    }

    fn mets_node(&self) -> Option<Node<'_, '_>> {
        self.xml.as_ref()?.node(self.mets?)
    }

    /// Hand the `mets:mets` element to `read`, or return `fallback`
    fn with_mets<T>(&self, fallback: T, read: impl FnOnce(Node<'_, '_>) -> T) -> T {
        match self.mets_node() {
            Some(mets) => read(mets),
            None => fallback,
        }
    }

    fn file_section(&self) -> Arc<FileSection> {
        self.files.get_or_init(|| {
            self.with_mets(FileSection::default(), |mets| {
                read_file_section(mets, &self.state.context().file_groups)
            })
        })
    }

    fn dmd_sections(&self) -> Arc<HashMap<String, DmdSection>> {
        self.dmd_sections.get_or_init(|| {
            self.with_mets(HashMap::new(), |mets| {
                read_dmd_sections(mets, &self.state.context().formats)
            })
        })
    }

    fn logical_build(&self) -> LogicalBuild {
        LogicalBuild {
            physical: self.physical_structure(),
            links: self.struct_links(),
            files: self.file_section(),
            toplevel: self.toplevel_id(),
        }
    }

    /// First file of a physical node in the thumbnail categories
    fn thumbnail_file(&self, physical: &PhysicalStructure, node_id: &str) -> Option<String> {
        let node = physical.node(node_id)?;
        self.state
            .context()
            .file_groups
            .thumbs
            .iter()
            .find_map(|group| node.files.get(group).cloned())
    }

    fn logical_info(&self, div: Node, recursive: bool, build: &LogicalBuild) -> LogicalNode {
        let mut node = LogicalNode {
            id: attribute(div, "ID"),
            dmd_id: attribute(div, "DMDID"),
            order: attribute(div, "ORDER"),
            label: attribute(div, "LABEL"),
            orderlabel: attribute(div, "ORDERLABEL"),
            content_ids: attribute(div, "CONTENTIDS"),
            node_type: attribute(div, "TYPE"),
            files: node_files(div, &build.files.uses),
            ..Default::default()
        };
        let is_toplevel = !node.id.is_empty() && node.id == build.toplevel;

        // Unlabelled volumes are shown by their volume number
        if node.label.is_empty() && is_toplevel && self.state.effective_scope(0).is_some() {
            let metadata = self.get_metadata(&node.id, 0);
            if let Some(volume) = metadata.first("volume") {
                node.volume = volume.to_string();
            }
        }

        if let Some(mptr) = mets_children(div, "mptr").next() {
            node.points = Some(Pointer::External(
                xlink_attribute(mptr, "href").unwrap_or_default(),
            ));
        } else if let Some(first) = build
            .links
            .first_physical(&node.id)
            .filter(|_| !build.physical.is_empty())
        {
            let page = build.physical.position(first).unwrap_or(0).max(1);
            node.points = Some(Pointer::Page(page));
            node.thumbnail_id = self.thumbnail_file(&build.physical, first).unwrap_or_default();
            node.pagination = build
                .physical
                .node(first)
                .map(|page| page.orderlabel.clone())
                .unwrap_or_default();
        } else if is_toplevel {
            node.points = Some(Pointer::Page(1));
            if let Some(first_page) = build.physical.page_id(1) {
                node.thumbnail_id = self
                    .thumbnail_file(&build.physical, first_page)
                    .unwrap_or_default();
            }
        }

        if recursive {
            let children: Vec<LogicalNode> = mets_children(div, "div")
                .map(|child| self.logical_info(child, true, build))
                .collect();
            if !children.is_empty() {
                node.children = Some(children);
            }
        }
        node
    }

    /// Apply the scope's field definitions to a payload
    fn apply_field_definitions(
        &self,
        payload: Node,
        encoding: &str,
        scope: ScopeId,
        record: &mut MetadataRecord,
    ) {
        let context = self.state.context();
        let namespaces = context.formats.namespaces();
        let select = |expression: &str, field: &str| -> Vec<String> {
            match xpath::select_strings(expression, payload, &namespaces) {
                Ok(values) => values.iter().map(|value| value.trim().to_string()).collect(),
                Err(e) => {
                    tracing::warn!("Invalid query for metadata field \"{}\": {}", field, e);
                    Vec::new()
                }
            }
        };

        let mut definitions = context.metadata.field_definitions(scope, encoding);
        definitions.extend(context.metadata.default_only_definitions(scope));

        for definition in &definitions {
            let name = definition.index_name.as_str();
            if !definition.xpath.is_empty() {
                let values = select(&definition.xpath, name);
                if !values.is_empty() {
                    record.set(name, values);
                }
            }

            if record.is_blank(name) && !definition.default_value.is_empty() {
                record.set(name, vec![definition.default_value.clone()]);
            }

            if definition.sortable && !record.get(name).is_empty() {
                let sorting = MetadataRecord::sorting_field(name);
                if !definition.xpath_sorting.is_empty() {
                    if let Some(value) = select(&definition.xpath_sorting, name).into_iter().next() {
                        record.set_first(&sorting, value);
                    }
                }
                if record.is_blank(&sorting) {
                    if let Some(value) = record.first(name).map(str::to_string) {
                        record.set_first(&sorting, value);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Document for MetsDocument {
    fn state(&self) -> &DocumentState {
        &self.state
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Mets
    }

    fn file_location(&self, file_id: &str) -> String {
        match self.file_section().files.get(file_id) {
            Some(file) if !file.location.is_empty() => file.location.clone(),
            _ => {
                tracing::warn!("There is no file node with @ID \"{}\"", file_id);
                String::new()
            }
        }
    }

    fn file_mime_type(&self, file_id: &str) -> String {
        match self.file_section().files.get(file_id) {
            Some(file) if !file.mime_type.is_empty() => file.mime_type.clone(),
            _ => {
                tracing::warn!("There is no file node with @ID \"{}\" or no MIME type", file_id);
                String::new()
            }
        }
    }

    fn download_location(&self, file_id: &str) -> String {
        let Some(file) = self.file_info(file_id).filter(|file| !file.location.is_empty()) else {
            tracing::warn!("There is no downloadable file with @ID \"{}\"", file_id);
            return String::new();
        };

        match file.mime_type.as_str() {
            IIIF_MIME_TYPE => {
                let base = file.location.trim_end_matches("info.json").trim_end_matches('/');
                format!("{}/full/full/0/default.jpg", base)
            }
            NETFPX_MIME_TYPE => {
                let separator = if file.location.contains('?') { "" } else { "?" };
                format!("{}{}&CVT=jpeg", file.location, separator)
            }
            _ => file.location,
        }
    }

    fn file_info(&self, file_id: &str) -> Option<FileInfo> {
        self.file_section().files.get(file_id).cloned()
    }

    fn build_physical_structure(&self) -> PhysicalStructure {
        let files = self.file_section();
        self.with_mets(PhysicalStructure::default(), |mets| {
            read_physical_structure(mets, &files.uses)
        })
    }

    fn build_struct_links(&self) -> StructLinks {
        self.with_mets(StructLinks::default(), read_struct_links)
    }

    fn find_toplevel_id(&self) -> String {
        let links = self.struct_links();
        self.with_mets(String::new(), |mets| select_toplevel(mets, &links))
    }

    fn build_thumbnail(&self, scope: ScopeId) -> String {
        let context = self.state.context();
        let mut target = self.toplevel_id();

        let titledata = self.get_titledata(scope);
        let mapped = titledata
            .first("type")
            .and_then(|structure_type| context.structures.thumbnail_structure_type(scope, structure_type));
        if let Some(mapped) = mapped {
            let first_of_type = self.with_mets(None, |mets| {
                logical_divs(mets)
                    .find(|div| div.attribute("TYPE") == Some(mapped.as_str()))
                    .map(|div| attribute(div, "ID"))
            });
            if let Some(id) = first_of_type.filter(|id| !id.is_empty()) {
                target = id;
            }
        }

        let physical = self.physical_structure();
        let links = self.struct_links();
        let target_node = links
            .first_physical(&target)
            .and_then(|id| physical.node(id));
        for group in &context.file_groups.thumbs {
            let file = target_node
                .and_then(|node| node.files.get(group))
                .or_else(|| physical.page(1).and_then(|page| page.files.get(group)));
            if let Some(file) = file {
                return self.file_location(file);
            }
        }
        String::new()
    }

    fn detect_full_text(&self) -> bool {
        self.file_section().has_fulltext
    }

    fn build_metadata(&self, id: &str, scope: ScopeId) -> MetadataRecord {
        let sections = self.dmd_sections();
        let context = self.state.context();

        self.with_mets(MetadataRecord::default(), |mets| {
            let Some(div) = find_logical_div(mets, id) else {
                tracing::warn!("There is no logical structure node with @ID \"{}\"", id);
                return MetadataRecord::default();
            };
            let dmd_ids = div.attribute("DMDID").unwrap_or_default();
            if dmd_ids.trim().is_empty() {
                return MetadataRecord::default();
            }

            for dmd_id in dmd_ids.split_whitespace() {
                let Some(section) = sections.get(dmd_id) else {
                    tracing::info!("Unsupported metadata format or dmdSec with @ID \"{}\"", dmd_id);
                    continue;
                };
                let Some(extractor) = context.formats.metadata_extractor(&section.encoding) else {
                    tracing::info!(
                        "No metadata extractor for format \"{}\" in dmdSec with @ID \"{}\"",
                        section.encoding,
                        dmd_id
                    );
                    continue;
                };
                let Some(payload) = mets.document().get_node(section.payload) else {
                    continue;
                };

                let mut record = MetadataRecord::new(DocumentFormat::Mets.as_str());
                extractor.extract_metadata(payload, &mut record);
                record.set("type", vec![attribute(div, "TYPE")]);
                self.apply_field_definitions(payload, &section.encoding, scope, &mut record);

                if record.is_blank("title") {
                    record.set("title", vec![String::new()]);
                    record.set("title_sorting", vec![String::new()]);
                }
                return record;
            }

            tracing::warn!("No supported metadata found for logical structure with @ID \"{}\"", id);
            MetadataRecord::default()
        })
    }

    fn build_logical_node(&self, id: &str, recursive: bool) -> Option<LogicalNode> {
        let build = self.logical_build();
        self.with_mets(None, |mets| {
            find_logical_div(mets, id).map(|div| self.logical_info(div, recursive, &build))
        })
    }

    fn build_table_of_contents(&self) -> Vec<LogicalNode> {
        let build = self.logical_build();
        self.with_mets(Vec::new(), |mets| {
            top_logical_divs(mets)
                .map(|div| self.logical_info(div, true, &build))
                .collect()
        })
    }

    fn logical_ids_with_metadata(&self) -> Vec<String> {
        self.with_mets(Vec::new(), |mets| {
            logical_divs(mets)
                .filter(|div| div.attribute("DMDID").is_some_and(|dmd| !dmd.trim().is_empty()))
                .map(|div| attribute(div, "ID"))
                .filter(|id| !id.is_empty())
                .collect()
        })
    }

    fn enrich_titledata(&self, record: &mut MetadataRecord) {
        let toplevel = self.toplevel_id();
        if let Some(node) = self.logical_node(&toplevel, false) {
            record.set_first("mets_order", node.order);
            record.set_first("mets_label", node.label);
            record.set_first("mets_orderlabel", node.orderlabel);
        }
    }

    fn reset(&self) {
        self.state.reset();
        self.files.reset();
        self.dmd_sections.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileGroups;
    use crate::fetch::MemoryFetcher;
    use crate::formats::mets::fixtures::{
        context_with, context_with_groups, ALTO_PAGE, MINIMAL_METS, RICH_METS, VOLUME_METS,
    };

    const LOCATION: &str = "https://digital.example/mets/chronik.xml";

    fn document(source: &str, pid: ScopeId) -> MetsDocument {
        MetsDocument::new(LOCATION, pid, source, context_with(Arc::new(MemoryFetcher::new())))
    }

    fn find<'a>(nodes: &'a [LogicalNode], id: &str) -> Option<&'a LogicalNode> {
        let mut found = None;
        for node in nodes {
            node.walk(
                &mut |visited, _| {
                    if found.is_none() && visited.id == id {
                        found = Some(visited);
                    }
                },
                1,
            );
        }
        found
    }

    #[tokio::test]
    async fn test_minimal_document() {
        let doc = document(MINIMAL_METS, 1);

        assert!(doc.is_ready());
        assert_eq!(doc.format(), DocumentFormat::Mets);
        assert_eq!(doc.num_pages(), 1);

        let toc = doc.table_of_contents();
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].id, "LOG_1");
        assert_eq!(toc[0].points, Some(Pointer::Page(1)));

        assert_eq!(doc.get_metadata("LOG_1", 0).title(), ["Test".to_string()]);
        assert!(!doc.has_fulltext());
        assert_eq!(doc.get_full_text("PHYS_1").await, "");
        assert!(doc.record_id().is_none());
    }

    #[test]
    fn test_physical_pages_follow_order_attribute() {
        let doc = document(RICH_METS, 1);
        let physical = doc.physical_structure();

        assert_eq!(doc.num_pages(), 3);
        assert_eq!(physical.page_id(1), Some("PHYS_1"));
        assert_eq!(physical.page_id(3), Some("PHYS_3"));
        assert_eq!(physical.node("PHYS_0").unwrap().node_type, "physSequence");
        // PDF_1 lives in an unconfigured group
        assert!(physical.node("PHYS_0").unwrap().files.is_empty());
    }

    #[test]
    fn test_page_lookup_is_cached() {
        let doc = document(RICH_METS, 1);

        assert_eq!(doc.get_physical_page("II"), 2);
        assert_eq!(doc.get_physical_page("II"), 2);
        assert_eq!(doc.state().page_scans(), 1);

        assert_eq!(doc.get_physical_page("I"), 1);
        assert_eq!(doc.get_physical_page("[3]"), 3);
        assert_eq!(doc.state().page_scans(), 3);

        assert_eq!(doc.find_physical_page("XIV"), None);
        assert_eq!(doc.get_physical_page("XIV"), 1);
        assert_eq!(doc.state().page_scans(), 4);

        assert_eq!(doc.find_physical_page(""), None);
        assert_eq!(doc.state().page_scans(), 4);
    }

    #[test]
    fn test_table_of_contents() {
        let doc = document(RICH_METS, 1);
        let toc = doc.table_of_contents();

        assert_eq!(toc.len(), 1);
        let root = &toc[0];
        assert_eq!(root.id, "LOG_0");
        assert_eq!(root.node_type, "monograph");
        assert_eq!(root.content_ids, "urn:nbn:de:test-1");
        assert_eq!(root.points, Some(Pointer::Page(1)));
        assert_eq!(root.pagination, "I");
        assert_eq!(root.thumbnail_id, "THUMB_1");

        let children = root.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, "LOG_1");
        assert_eq!(children[0].points, Some(Pointer::Page(2)));
        assert_eq!(children[0].pagination, "II");
        assert_eq!(children[0].thumbnail_id, "THUMB_2");
        assert_eq!(children[0].children.as_ref().unwrap()[0].id, "LOG_2");

        // no links and not the toplevel node
        assert_eq!(children[1].id, "LOG_3");
        assert_eq!(children[1].points, None);
        assert!(children[1].children.is_none());
    }

    #[test]
    fn test_unlabelled_toplevel_shows_volume() {
        let doc = document(RICH_METS, 1);
        let toc = doc.table_of_contents();
        assert_eq!(toc[0].label, "");
        assert_eq!(toc[0].volume, "12");

        // labelled nodes never carry a volume
        assert_eq!(find(&toc, "LOG_1").unwrap().volume, "");
    }

    #[test]
    fn test_logical_structure_lookup() {
        let doc = document(RICH_METS, 1);

        let top = doc.get_logical_structure("", false);
        assert_eq!(top.len(), 1);
        assert!(top[0].children.is_none());

        let full = doc.get_logical_structure("", true);
        assert!(full[0].children.is_some());

        let chapter = doc.get_logical_structure("LOG_1", true);
        assert_eq!(chapter.len(), 1);
        assert_eq!(chapter[0].label, "Erstes Kapitel");
        assert_eq!(chapter[0].children.as_ref().unwrap().len(), 1);

        let flat = doc.get_logical_structure("LOG_1", false);
        assert!(flat[0].children.is_none());

        assert!(doc.get_logical_structure("LOG_404", false).is_empty());
    }

    #[test]
    fn test_structure_depth_matches_tree() {
        let doc = document(RICH_METS, 1);
        let toc = doc.table_of_contents();

        let mut expected = Vec::new();
        for node in toc.iter() {
            node.walk(&mut |visited, depth| expected.push((visited.id.clone(), depth)), 1);
        }
        assert_eq!(expected.len(), 4);
        for (id, depth) in expected {
            assert_eq!(doc.get_structure_depth(&id), Some(depth));
        }
        assert_eq!(doc.get_structure_depth("LOG_2"), Some(3));
        assert_eq!(doc.get_structure_depth("PHYS_1"), None);
    }

    #[test]
    fn test_metadata_from_first_supported_section() {
        let doc = document(RICH_METS, 1);
        let record = doc.get_metadata("LOG_0", 0);

        assert_eq!(record.get("document_format"), ["METS".to_string()]);
        assert_eq!(record.get("type"), ["monograph".to_string()]);
        assert_eq!(record.get("title"), ["Die Chronik der Stadt".to_string()]);
        assert_eq!(record.get("title_sorting"), ["Chronik der Stadt".to_string()]);
        assert_eq!(record.get("author"), ["Müller, Anna".to_string()]);
        assert_eq!(record.get("place"), ["Leipzig".to_string()]);
        assert_eq!(record.get("urn"), ["urn:nbn:de:test-1".to_string()]);
        // configured fields
        assert_eq!(record.get("classification"), ["Geschichte".to_string()]);
        assert_eq!(record.get("collection"), ["Digitalisate".to_string()]);
        assert_eq!(record.get("owner"), ["Stadtarchiv".to_string()]);
        assert_eq!(record.get("year"), ["1850".to_string()]);
        assert_eq!(record.get("year_sorting"), ["1850".to_string()]);
    }

    #[test]
    fn test_metadata_scope_switch_rebuilds() {
        let doc = document(RICH_METS, 1);

        let first = doc.get_metadata("LOG_0", 1);
        assert!(first.has_field("classification"));
        doc.get_metadata("LOG_1", 1);
        assert_eq!(doc.state().metadata.read().records.len(), 2);

        let second = doc.get_metadata("LOG_0", 2);
        assert!(!second.has_field("classification"));
        assert_eq!(second.get("shelf"), ["urn:nbn:de:test-1".to_string()]);
        assert_eq!(second.get("shelf_sorting"), ["REC-1".to_string()]);

        let cache = doc.state().metadata.read();
        assert_eq!(cache.scope, 2);
        assert_eq!(cache.records.len(), 1);
    }

    #[test]
    fn test_field_queries_with_functions() {
        use crate::formats::FormatRegistry;
        use crate::metadata::{FieldSpec, InMemoryRegistry};

        let registry = Arc::new(
            InMemoryRegistry::new()
                .with_field(
                    1,
                    FieldSpec::new("full_title").with_query(
                        "MODS",
                        "concat(./mods:titleInfo/mods:nonSort, ' ', ./mods:titleInfo/mods:title)",
                    ),
                )
                .with_field(
                    1,
                    FieldSpec::new("creator").sortable().with_sort_query(
                        "MODS",
                        "./mods:name/mods:displayForm",
                        "concat(substring-before(./mods:name/mods:displayForm, ','), '_', ./mods:originInfo/mods:dateIssued)",
                    ),
                )
                .with_field(
                    1,
                    FieldSpec::new("subject")
                        .with_query("MODS", "normalize-space(./mods:subject)")
                        .with_default("none"),
                ),
        );
        let context = Arc::new(DocumentContext {
            file_groups: FileGroups::default(),
            formats: Arc::new(FormatRegistry::with_defaults()),
            metadata: registry.clone(),
            structures: registry,
            fetcher: Arc::new(MemoryFetcher::new()),
        });
        let doc = MetsDocument::new(LOCATION, 1, RICH_METS, context);
        let record = doc.get_metadata("LOG_0", 0);

        assert_eq!(record.get("full_title"), ["Die Chronik der Stadt".to_string()]);
        assert_eq!(record.get("creator"), ["Müller, Anna".to_string()]);
        assert_eq!(record.get("creator_sorting"), ["Müller_1850".to_string()]);
        // an empty scalar result leaves the default in place
        assert_eq!(record.get("subject"), ["none".to_string()]);
    }

    #[test]
    fn test_metadata_without_sections() {
        let doc = document(RICH_METS, 1);
        assert!(doc.get_metadata("LOG_3", 0).is_empty());
        assert!(doc.get_metadata("LOG_404", 0).is_empty());

        let unscoped = document(RICH_METS, 0);
        assert!(unscoped.get_metadata("LOG_0", 0).is_empty());
        unscoped.set_config_scope(1);
        assert!(!unscoped.get_metadata("LOG_0", 0).is_empty());
    }

    #[test]
    fn test_metadata_array_covers_sections() {
        let doc = document(RICH_METS, 1);
        let all = doc.metadata_array(0);

        assert_eq!(all.keys().collect::<Vec<_>>(), ["LOG_0", "LOG_1"]);
        assert_eq!(all["LOG_1"].get("title"), ["Erstes Kapitel".to_string()]);
        assert_eq!(all["LOG_1"].get("type"), ["chapter".to_string()]);
    }

    #[test]
    fn test_facets_read_one_parsed_tree() {
        let xml = XmlSource::parse(RICH_METS).unwrap();
        let parsed = xml.tree() as *const _ as *const u8;
        let doc = MetsDocument::from_xml(
            LOCATION,
            1,
            xml,
            context_with(Arc::new(MemoryFetcher::new())),
        );

        assert_eq!(doc.metadata_array(0).len(), 2);
        assert_eq!(doc.table_of_contents().len(), 1);
        assert_eq!(doc.num_pages(), 3);
        assert!(!doc.thumbnail(false).is_empty());
        assert_eq!(doc.get_titledata(0).first("record_id"), Some("PPN1234"));

        let xml = doc.xml().unwrap();
        assert_eq!(xml.tree() as *const _ as *const u8, parsed);
        assert_eq!(doc.source(), RICH_METS);
    }

    #[test]
    fn test_titledata() {
        let doc = document(RICH_METS, 1);
        let titledata = doc.get_titledata(0);

        assert_eq!(doc.record_id(), Some("PPN1234"));
        assert_eq!(
            titledata.get("record_id"),
            ["PPN1234".to_string(), "REC-1".to_string()]
        );
        assert_eq!(titledata.get("mets_order"), ["1".to_string()]);
        assert_eq!(titledata.get("mets_label"), ["".to_string()]);
        assert_eq!(titledata.get("title"), ["Die Chronik der Stadt".to_string()]);
    }

    #[test]
    fn test_thumbnail_uses_mapped_structure() {
        let doc = document(RICH_METS, 1);
        assert_eq!(doc.thumbnail(false), "https://thumb.example/2.jpg");
        assert!(doc.state().thumbnail.read().is_some());
        assert_eq!(doc.thumbnail(true), "https://thumb.example/2.jpg");
    }

    #[test]
    fn test_thumbnail_falls_back_to_toplevel() {
        let doc = document(RICH_METS, 2);
        assert_eq!(doc.thumbnail(false), "https://thumb.example/1.jpg");

        let unscoped = document(RICH_METS, 0);
        assert_eq!(unscoped.thumbnail(false), "");
    }

    #[test]
    fn test_file_helpers() {
        let doc = document(RICH_METS, 1);

        assert_eq!(doc.file_location("IMG_2"), "https://img.example/2.jpg");
        assert_eq!(doc.file_location("NOURL_1"), "");
        assert_eq!(doc.file_location("MISSING"), "");
        assert_eq!(doc.file_mime_type("PDF_1"), "application/pdf");
        assert_eq!(doc.file_mime_type("MISSING"), "");

        let info = doc.file_info("PDF_1").unwrap();
        assert_eq!(info.use_group, "PRESENTATION");
        assert_eq!(info.admid, "AMD_1");
        assert!(doc.file_info("MISSING").is_none());
    }

    #[test]
    fn test_download_locations() {
        let doc = document(RICH_METS, 1);

        assert_eq!(
            doc.download_location("IIIF_1"),
            "https://iiif.example/iiif/2/p1/full/full/0/default.jpg"
        );
        assert_eq!(
            doc.download_location("IIP_1"),
            "https://iip.example/fcgi?FIF=1.tif&CVT=jpeg"
        );
        assert_eq!(doc.download_location("IIP_2"), "https://iip.example/2.tif?&CVT=jpeg");
        assert_eq!(doc.download_location("PDF_1"), "https://files.example/book.pdf");
        assert_eq!(doc.download_location("MISSING"), "");
    }

    #[tokio::test]
    async fn test_full_text_is_fetched_once() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_source("https://ocr.example/1.xml", ALTO_PAGE)
                .with_source("https://ocr.example/2.xml", "<html><body/></html>"),
        );
        let doc = MetsDocument::new(LOCATION, 1, RICH_METS, context_with(fetcher.clone()));
        assert!(doc.has_fulltext());

        let text = doc.get_full_text("PHYS_1").await;
        assert!(text.starts_with("<ocr><b><l>"));
        assert!(text.contains(r#"<w x="10 20 80 15">Chronik</w> <w x="95 20 30 15">der</w>"#));
        assert!(text.contains(r#"<l><w x="10 40 50 15">Stadt</w></l>"#));

        assert_eq!(doc.get_full_text("PHYS_1").await, text);
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_full_text_failures_yield_empty_text() {
        let fetcher = Arc::new(
            MemoryFetcher::new().with_source("https://ocr.example/2.xml", "<html><body/></html>"),
        );
        let doc = MetsDocument::new(LOCATION, 1, RICH_METS, context_with(fetcher));

        // unsupported format
        assert_eq!(doc.get_full_text("PHYS_2").await, "");
        // no full-text file
        assert_eq!(doc.get_full_text("PHYS_3").await, "");
        // unreachable file
        assert_eq!(doc.get_full_text("PHYS_1").await, "");
        // unknown node
        assert_eq!(doc.get_full_text("PHYS_404").await, "");
    }

    #[tokio::test]
    async fn test_full_text_needs_configured_group() {
        let fetcher = Arc::new(MemoryFetcher::new().with_source("https://ocr.example/1.xml", ALTO_PAGE));
        let groups = FileGroups {
            fulltext: Vec::new(),
            ..FileGroups::default()
        };
        let doc = MetsDocument::new(LOCATION, 1, RICH_METS, context_with_groups(fetcher.clone(), groups));

        assert!(!doc.has_fulltext());
        assert_eq!(doc.get_full_text("PHYS_1").await, "");
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[test]
    fn test_volume_with_anchor_pointer() {
        let doc = document(VOLUME_METS, 1);

        assert_eq!(doc.toplevel_id(), "LOG_VOL");
        assert_eq!(doc.num_pages(), 0);

        let toc = doc.table_of_contents();
        assert_eq!(
            toc[0].points,
            Some(Pointer::External("https://digital.example/mets/anchor.xml".to_string()))
        );
        let volume = find(&toc, "LOG_VOL").unwrap();
        assert_eq!(volume.points, Some(Pointer::Page(1)));
        assert_eq!(volume.orderlabel, "Bd. 1");

        assert_eq!(doc.get_titledata(0).get("mets_orderlabel"), ["Bd. 1".to_string()]);
        // the anchor's section is not in this file
        assert!(doc.get_metadata("LOG_ANCHOR", 0).is_empty());
    }

    #[test]
    fn test_source_without_mets_root() {
        let doc = document("<root><child/></root>", 1);

        assert!(!doc.is_ready());
        assert_eq!(doc.num_pages(), 0);
        assert!(doc.table_of_contents().is_empty());
        assert!(doc.get_metadata("LOG_0", 0).is_empty());
        assert_eq!(doc.toplevel_id(), "");
        assert!(!doc.has_fulltext());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let doc = document(RICH_METS, 1);
        doc.set_parent_id(7);

        let json = serde_json::to_string(&doc.snapshot()).unwrap();
        let snapshot: DocumentSnapshot = serde_json::from_str(&json).unwrap();
        let restored = MetsDocument::from_snapshot(snapshot, context_with(Arc::new(MemoryFetcher::new())));

        assert_eq!(restored.location(), LOCATION);
        assert_eq!(restored.pid(), 1);
        assert_eq!(restored.parent_id(), 7);
        assert_eq!(restored.record_id(), Some("PPN1234"));
        assert_eq!(*restored.table_of_contents(), *doc.table_of_contents());
    }

    #[test]
    fn test_reset_drops_facets() {
        let doc = document(RICH_METS, 1);
        doc.table_of_contents();
        doc.get_metadata("LOG_0", 0);
        assert!(doc.state().physical.is_loaded());

        doc.reset();
        assert!(!doc.state().physical.is_loaded());
        assert!(!doc.state().toc.is_loaded());
        assert!(doc.state().metadata.read().records.is_empty());

        assert_eq!(doc.num_pages(), 3);
    }
}
