//! Parsed XML source
//!
//! Keeps the raw text and its `roxmltree` tree in one allocation, so a
//! document is parsed once and every facet reads the same tree.

use std::fmt;
use std::sync::Arc;

use roxmltree::{Node, NodeId};
use self_cell::self_cell;

type XmlTree<'a> = roxmltree::Document<'a>;

self_cell!(
    struct SourceCell {
        owner: Arc<str>,

        #[covariant]
        dependent: XmlTree,
    }
);

/// Raw XML text together with its parsed tree
pub struct XmlSource {
    cell: SourceCell,
}

impl XmlSource {
    pub fn parse(text: impl Into<Arc<str>>) -> Result<Self, roxmltree::Error> {
        let cell = SourceCell::try_new(text.into(), |text| roxmltree::Document::parse(text))?;
        Ok(Self { cell })
    }

    pub fn text(&self) -> &str {
        self.cell.borrow_owner()
    }

    /// Shared handle to the raw text
    pub fn shared_text(&self) -> Arc<str> {
        self.cell.borrow_owner().clone()
    }

    pub fn tree(&self) -> &roxmltree::Document<'_> {
        self.cell.borrow_dependent()
    }

    /// Node of the tree by ID
    pub fn node(&self, id: NodeId) -> Option<Node<'_, '_>> {
        self.tree().get_node(id)
    }
}

impl fmt::Debug for XmlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlSource")
            .field("len", &self.text().len())
            .field("nodes", &self.tree().descendants().count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_outlives_moves() {
        let source = XmlSource::parse("<a><b>text</b></a>").unwrap();
        let b = source.tree().root_element().first_element_child().unwrap().id();

        let moved = Box::new(source);
        assert_eq!(moved.node(b).unwrap().text(), Some("text"));
        assert_eq!(moved.text(), "<a><b>text</b></a>");
    }

    #[test]
    fn test_malformed_text_is_rejected() {
        assert!(XmlSource::parse("<a>").is_err());
    }
}
