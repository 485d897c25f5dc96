//! Source format detection
//!
//! Explicit ordered strategy: XML with a METS root first, then JSON-LD with
//! an IIIF context. Parse failures are inspected, not propagated.

use super::source::XmlSource;
use crate::formats::METS_NS;

/// Detected source format
#[derive(Debug)]
pub enum SourceFormat {
    /// METS document, already parsed
    Mets(XmlSource),
    /// IIIF manifest or collection
    Iiif(serde_json::Value),
    Unrecognized,
}

/// Classify raw source bytes
pub fn sniff(bytes: &[u8]) -> SourceFormat {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return SourceFormat::Unrecognized;
    };
    let text = text.trim_start_matches('\u{feff}');

    if let Ok(xml) = XmlSource::parse(text) {
        let has_mets = xml
            .tree()
            .descendants()
            .any(|node| node.has_tag_name((METS_NS, "mets")));
        return if has_mets {
            SourceFormat::Mets(xml)
        } else {
            SourceFormat::Unrecognized
        };
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) if is_iiif(&json) => SourceFormat::Iiif(json),
        _ => SourceFormat::Unrecognized,
    }
}

fn is_iiif(json: &serde_json::Value) -> bool {
    let mentions_iiif = |value: &serde_json::Value| {
        value.as_str().is_some_and(|context| context.contains("iiif.io"))
    };
    match json.get("@context") {
        Some(serde_json::Value::Array(contexts)) => contexts.iter().any(mentions_iiif),
        Some(context) => mentions_iiif(context),
        None => false,
    }
}
