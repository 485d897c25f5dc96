//! Descriptive metadata
//!
//! Canonical metadata records, the registries that configure field
//! extraction per scope, the built-in path-query evaluator and the
//! encoding-specific extractors (MODS, Dublin Core).
//!
//! # Extraction pipeline
//!
//! ```text
//!   dmdSec payload ──► MetadataExtractor ──► MetadataRecord
//!                                              │
//!   MetadataRegistry ──► FieldDefinition ──► xpath::PathQuery
//!                          (per scope)         │
//!                                              ▼
//!                                   fields, defaults, *_sorting
//! ```

mod dc;
mod mods;
pub mod record;
pub mod registry;
pub mod title;
pub mod xpath;

pub use dc::DublinCoreExtractor;
pub use mods::ModsExtractor;
pub use record::{MetadataRecord, CANONICAL_FIELDS};
pub use registry::{
    DocumentRecord, FieldDefinition, FieldQuery, FieldSpec, InMemoryRegistry, MetadataRegistry,
    RecordStore, ScopeDefinitions, ScopeId, StructureRegistry,
};
pub use title::{resolve_root_id, resolve_title};
pub use xpath::{PathQuery, QueryError};

use roxmltree::Node;

/// Converts one metadata payload into canonical fields
///
/// Implementations merge into the caller-supplied record; values the
/// extractor does not know about are left untouched.
pub trait MetadataExtractor: Send + Sync {
    /// Populate `record` from the payload root element `node`
    fn extract_metadata(&self, node: Node<'_, '_>, record: &mut MetadataRecord);
}

/// Trimmed text content of an element (concatenated descendant text)
pub(crate) fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|descendant| descendant.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Element children with the given local name
pub(crate) fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

/// First element child with the given local name
pub(crate) fn child_named<'a, 'input>(node: Node<'a, 'input>, name: &'a str) -> Option<Node<'a, 'input>> {
    children_named(node, name).next()
}
