//! Folio Server Library
//!
//! Document access layer for METS/MODS digital objects: lazy structure
//! navigation, scoped metadata extraction and full-text conversion, plus the
//! HTTP surface the binary serves.
//!
//! # Modules
//!
//! - `document`: Format-agnostic `Document` contract, lazy state and cache
//! - `formats`: Format registry and the METS backend
//! - `metadata`: Canonical records, field registries, MODS/DC extraction
//! - `fulltext`: ALTO to MiniOCR conversion
//! - `fetch`: Source retrieval over HTTP(S), and `file://` when enabled

pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod fulltext;
pub mod metadata;
pub mod routes;
pub mod state;
