//! Content store access
//!
//! The content store holds one directory per block package, laid out as
//! `{org}/{slug}/` and containing the metadata descriptor, the schema file and
//! the bundled source. Everything here only reads from the store.

pub mod catalog;
pub mod fs;
pub mod loader;
pub mod memory;

pub use catalog::{Catalog, CatalogReader};
pub use fs::FsContentStore;
pub use loader::BlockDataLoader;
pub use memory::MemoryContentStore;

use std::path::{Component, Path};

use crate::core::BlockError;

/// Read-only view of a content store
///
/// Implementations must be safe to read from several builds at once.
pub trait ContentStore: Send + Sync {
    /// Every block directory as a `{org}/{slug}` package path, in any order.
    fn list_packages(&self) -> Result<Vec<String>, BlockError>;

    /// Read a file inside one block directory.
    ///
    /// # Returns
    /// * `Ok(Some(text))` if the file exists
    /// * `Ok(None)` if it does not
    /// * `Err(BlockError)` if it exists but cannot be read
    fn read_file(&self, package_path: &str, file: &str) -> Result<Option<String>, BlockError>;
}

/// Descriptors name their schema and source files; those names must stay
/// inside the block directory.
pub(crate) fn validate_file_name(file: &str) -> Result<(), BlockError> {
    let path = Path::new(file);
    let contained = !file.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if contained {
        Ok(())
    } else {
        Err(BlockError::Io(format!(
            "file name '{}' escapes the block directory",
            file
        )))
    }
}
