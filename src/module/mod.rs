// src/module/mod.rs

//! Module records
//!
//! - [`ModuleDescriptor`]: parsed `modulemd` metadata for one
//!   name/stream/version/release
//! - [`Nvr`] / [`ModuleKey`]: user-facing and exact identifiers
//! - [`ModuleEntry`]: a descriptor bound to its source and cache bookkeeping

mod descriptor;
mod entry;
mod nvr;

pub use descriptor::{
    is_unset_stream, ModuleDescriptor, Profile, DOCUMENT_TYPE, SUPPORTED_DOCUMENT_VERSIONS,
};
pub(crate) use descriptor::ModuleDocument;
pub use entry::ModuleEntry;
pub use nvr::{ModuleKey, Nvr};
