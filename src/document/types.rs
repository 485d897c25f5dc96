//! Core document types
//!
//! Format-agnostic types for the structural model of a digital object.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Document format backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Mets,
    Iiif,
}

impl DocumentFormat {
    /// Encoding name as stored in `document_format` metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mets => "METS",
            Self::Iiif => "IIIF",
        }
    }
}

/// Attributes of one physical node (sequence, page or track)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalNode {
    pub id: String,
    pub dmd_id: String,
    pub order: String,
    pub label: String,
    pub orderlabel: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub content_ids: String,
    /// File-use category → file ID
    pub files: BTreeMap<String, String>,
}

/// Ordered physical structure plus per-node attributes
///
/// `order[0]` is the sequence-level pseudo-node; `order[1..]` are the pages
/// in document order, so page numbers are 1-based.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalStructure {
    pub order: Vec<String>,
    pub info: HashMap<String, PhysicalNode>,
}

impl PhysicalStructure {
    /// Number of pages (the sequence node is not a page)
    pub fn num_pages(&self) -> usize {
        self.order.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Physical node ID of a 1-based page
    pub fn page_id(&self, page: usize) -> Option<&str> {
        if page == 0 {
            return None;
        }
        self.order.get(page).map(String::as_str)
    }

    /// Attributes of a 1-based page
    pub fn page(&self, page: usize) -> Option<&PhysicalNode> {
        self.page_id(page).and_then(|id| self.info.get(id))
    }

    /// Attributes of any physical node by ID
    pub fn node(&self, id: &str) -> Option<&PhysicalNode> {
        self.info.get(id)
    }

    /// Position of a physical node in `order` (0 for the sequence)
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == id)
    }

    /// Pages in document order with their 1-based numbers
    pub fn pages(&self) -> impl Iterator<Item = (usize, &PhysicalNode)> {
        self.order
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(page, id)| self.info.get(id).map(|node| (page, node)))
    }
}

/// Declared links between logical and physical nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructLinks {
    /// Logical node ID → linked physical node IDs (declaration order)
    pub l2p: HashMap<String, Vec<String>>,
    /// Physical node ID → linked logical node IDs (declaration order)
    pub p2l: HashMap<String, Vec<String>>,
}

impl StructLinks {
    pub fn add(&mut self, from: &str, to: &str) {
        self.l2p
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.p2l
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
    }

    /// First physical node linked to a logical node
    pub fn first_physical(&self, logical_id: &str) -> Option<&str> {
        self.l2p
            .get(logical_id)
            .and_then(|targets| targets.first())
            .map(String::as_str)
    }

    pub fn has_physical(&self, logical_id: &str) -> bool {
        self.l2p.contains_key(logical_id)
    }
}

/// Target a logical node points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pointer {
    /// 1-based physical page
    Page(usize),
    /// External document (e.g. another volume's METS file)
    External(String),
}

/// Logical structure node (table of contents entry)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalNode {
    pub id: String,
    pub dmd_id: String,
    pub order: String,
    pub label: String,
    pub orderlabel: String,
    pub content_ids: String,
    /// Volume label, only for an unlabelled toplevel node
    pub volume: String,
    /// Order label of the first linked page
    pub pagination: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub thumbnail_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Pointer>,
    /// File-use category → file ID
    pub files: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<LogicalNode>>,
}

impl LogicalNode {
    /// Copy of the node without its children
    pub fn without_children(&self) -> Self {
        Self {
            children: None,
            ..self.clone()
        }
    }

    /// Depth-first iteration over this node and all descendants
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a LogicalNode, usize), depth: usize) {
        visit(self, depth);
        if let Some(children) = &self.children {
            for child in children {
                child.walk(visit, depth + 1);
            }
        }
    }
}

/// File information from the file section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub id: String,
    /// File-use category of the enclosing file group
    #[serde(rename = "use")]
    pub use_group: String,
    pub mime_type: String,
    pub location: String,
    pub admid: String,
}
