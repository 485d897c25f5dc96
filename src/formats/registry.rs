//! Format registry
//!
//! Maps encoding names (METS, MODS, ALTO, ...) to their root element,
//! namespace and optional extractor. Passed explicitly to every document
//! through the `DocumentContext`; there is no global registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::fulltext::{AltoExtractor, FullTextExtractor};
use crate::metadata::{DublinCoreExtractor, MetadataExtractor, ModsExtractor};

pub const METS_NS: &str = "http://www.loc.gov/METS/";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const OAI_NS: &str = "http://www.openarchives.org/OAI/2.0/";
pub const MODS_NS: &str = "http://www.loc.gov/mods/v3";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const ALTO_NS: &str = "http://www.loc.gov/standards/alto/ns-v2#";

/// Extractor bound to an encoding
#[derive(Clone)]
pub enum FormatExtractor {
    Metadata(Arc<dyn MetadataExtractor>),
    FullText(Arc<dyn FullTextExtractor>),
}

impl fmt::Debug for FormatExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata(_) => f.write_str("Metadata(..)"),
            Self::FullText(_) => f.write_str("FullText(..)"),
        }
    }
}

/// Parsing capability of one encoding
#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    pub name: String,
    pub root_element: String,
    pub namespace: String,
    pub extractor: Option<FormatExtractor>,
}

/// Registry of known encodings
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: HashMap<String, FormatDescriptor>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// Registry with the container vocabularies only (no extractors)
    pub fn new() -> Self {
        let mut registry = Self {
            formats: HashMap::new(),
        };
        registry.register_format("OAI", "OAI-PMH", OAI_NS, None);
        registry.register_format("METS", "mets", METS_NS, None);
        registry.register_format("XLINK", "xlink", XLINK_NS, None);
        registry
    }

    /// Registry with the bundled MODS, DC and ALTO extractors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_format(
            "MODS",
            "mods",
            MODS_NS,
            Some(FormatExtractor::Metadata(Arc::new(ModsExtractor))),
        );
        registry.register_format(
            "DC",
            "dc",
            DC_NS,
            Some(FormatExtractor::Metadata(Arc::new(DublinCoreExtractor))),
        );
        registry.register_format(
            "ALTO",
            "alto",
            ALTO_NS,
            Some(FormatExtractor::FullText(Arc::new(AltoExtractor))),
        );
        registry
    }

    /// Register (or replace) an encoding
    pub fn register_format(
        &mut self,
        name: &str,
        root_element: &str,
        namespace: &str,
        extractor: Option<FormatExtractor>,
    ) {
        self.formats.insert(
            name.to_string(),
            FormatDescriptor {
                name: name.to_string(),
                root_element: root_element.to_string(),
                namespace: namespace.to_string(),
                extractor,
            },
        );
    }

    pub fn resolve_format(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats.get(name)
    }

    pub fn metadata_extractor(&self, name: &str) -> Option<Arc<dyn MetadataExtractor>> {
        match self.resolve_format(name)?.extractor.as_ref()? {
            FormatExtractor::Metadata(extractor) => Some(extractor.clone()),
            FormatExtractor::FullText(_) => None,
        }
    }

    pub fn full_text_extractor(&self, name: &str) -> Option<Arc<dyn FullTextExtractor>> {
        match self.resolve_format(name)?.extractor.as_ref()? {
            FormatExtractor::FullText(extractor) => Some(extractor.clone()),
            FormatExtractor::Metadata(_) => None,
        }
    }

    /// Query prefixes: lower-cased encoding name → namespace URI
    pub fn namespaces(&self) -> HashMap<String, String> {
        self.formats
            .values()
            .map(|format| (format.name.to_lowercase(), format.namespace.clone()))
            .collect()
    }
}
