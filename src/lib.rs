//! Block Hub - catalog, dynamic loading and page building for UI blocks
//!
//! This crate discovers block packages in a content store, evaluates their
//! bundled source against a fixed dependency allow-list, picks the exported
//! component and schedules the page builds that serve each block, including
//! request coalescing and stale-while-revalidate caching.

pub mod config;
pub mod core;
pub mod runtime;
pub mod script;
pub mod store;
mod tests;

// Re-export commonly used types
pub use crate::core::{BlockError, BlockMetadata, DependencyRegistry};
pub use config::HubConfig;
pub use runtime::{PageBuildScheduler, PageBundle, PageError, PageSource};
pub use store::{CatalogReader, ContentStore, FsContentStore, MemoryContentStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
