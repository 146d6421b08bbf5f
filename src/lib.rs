// src/lib.rs

//! Modman module manager
//!
//! Discovers modules offered by module sources, resolves the dependencies
//! between them and drives their lifecycle: enable, disable, upgrade and
//! rebase.
//!
//! # Architecture
//!
//! - Sources: module listings and full metadata fetched from configured URLs
//! - Cache: `available` and `enabled` tiers of module documents on disk
//! - Catalog: the in-memory working set of one command
//! - Resolver: projects the catalog into a solver universe and classifies
//!   the transaction it returns
//! - Lifecycle: negotiates with the solver, then applies the plan through
//!   source descriptors and the package manager

pub mod cache;
pub mod catalog;
pub mod config;
mod error;
pub mod lifecycle;
pub mod module;
pub mod resolver;
pub mod source;
pub mod version;

pub use catalog::{search, CompareOp, ModuleCatalog, SearchFilter, SearchQuery};
pub use config::ModmanConfig;
pub use error::{Error, Result};
pub use lifecycle::{Action, Orchestrator, PackageManager, PackageSession, Phase};
pub use module::{ModuleDescriptor, ModuleEntry, ModuleKey, Nvr};
pub use resolver::{BasicSolver, ModuleSolver, ResolutionPlan, ResolverAdapter};
pub use source::{ModuleSource, RepoFileStore, SourceDescriptorStore, SourceRegistry};
