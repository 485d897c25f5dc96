//! METS backend
//!
//! `MetsDocument` reads the fileSec, the physical and logical structMaps,
//! the structLink section and the dmdSecs of a METS file, re-parsing the
//! stored source whenever a facet is first requested.

mod document;
mod sections;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::{DocumentSnapshot, MetsDocument};
