//! Full-text extraction
//!
//! Extractors turn a text-bearing XML document (OCR output) into the
//! lightweight MiniOCR markup served to viewers:
//!
//! ```text
//! <ocr><b><l><w x="x y w h">word</w> <w x="...">word</w></l></b></ocr>
//! ```

mod alto;

pub use alto::AltoExtractor;

use roxmltree::Node;

use crate::document::DocumentResult;

/// Converts one full-text encoding into MiniOCR
pub trait FullTextExtractor: Send + Sync {
    /// MiniOCR markup for the document rooted at `root`
    fn text_as_mini_ocr(&self, root: Node<'_, '_>) -> DocumentResult<String>;

    /// Plain words joined by single spaces
    fn raw_text(&self, root: Node<'_, '_>) -> String;
}
