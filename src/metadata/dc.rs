//! Dublin Core metadata extractor

use roxmltree::Node;

use super::{text_content, MetadataExtractor, MetadataRecord};

/// DC element → canonical field
const MAPPING: &[(&str, &str)] = &[
    ("title", "title"),
    ("creator", "author"),
    ("date", "year"),
    ("identifier", "record_id"),
    ("rights", "rights_info"),
    ("type", "type"),
];

/// Extracts canonical fields from an `oai_dc:dc` (or bare `dc`) container
#[derive(Debug, Clone, Copy, Default)]
pub struct DublinCoreExtractor;

impl MetadataExtractor for DublinCoreExtractor {
    fn extract_metadata(&self, node: Node<'_, '_>, record: &mut MetadataRecord) {
        for element in node.descendants().filter(|n| n.is_element()) {
            let name = element.tag_name().name();
            let Some((_, field)) = MAPPING.iter().find(|(dc, _)| *dc == name) else {
                continue;
            };
            let value = text_content(element);
            if !value.is_empty() && !record.contains_value(field, &value) {
                record.push(field, value);
            }
        }
    }
}
