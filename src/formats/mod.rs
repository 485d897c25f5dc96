//! Document formats
//!
//! The encoding registry and the format backends built on it.

pub mod mets;
pub mod registry;

pub use registry::{
    FormatDescriptor, FormatExtractor, FormatRegistry, ALTO_NS, DC_NS, METS_NS, MODS_NS, OAI_NS,
    XLINK_NS,
};
