//! Document error types
//!
//! Unified error handling for document loading, parsing and extraction.
//! Public `Document` operations absorb these into neutral values; the
//! error type is what internal helpers propagate with `?`.

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Document or node not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Location is neither an HTTP(S) URL nor a file reference
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Source fetch failed
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MiniOCR serialization error
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    /// Invalid content (encoding, structure)
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// UTF-8 error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unsupported metadata, full-text or document format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Configuration scope is zero or otherwise unusable
    #[error("Invalid configuration scope: {0}")]
    InvalidScope(u32),

    /// Fetch timed out
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Alias for Result (used by format backends)
pub type DocumentResult<T> = Result<T>;
