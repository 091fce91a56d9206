//! In-memory content store
//!
//! Useful for embedding and for tests: every read and listing is counted, so
//! callers can assert how often the store was touched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{validate_file_name, ContentStore};
use crate::core::BlockError;

/// Content store holding files in memory
#[derive(Default)]
pub struct MemoryContentStore {
    packages: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
    reads: AtomicUsize,
    listings: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file, creating the package directory if needed.
    pub fn insert_file(&self, package_path: &str, file: &str, contents: impl Into<String>) {
        self.packages
            .write()
            .entry(package_path.to_string())
            .or_default()
            .insert(file.to_string(), contents.into());
    }

    /// Remove a file, leaving the package directory in place.
    pub fn remove_file(&self, package_path: &str, file: &str) {
        if let Some(files) = self.packages.write().get_mut(package_path) {
            files.remove(file);
        }
    }

    /// Number of `read_file` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `list_packages` calls so far.
    pub fn list_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Total store accesses of any kind.
    pub fn access_count(&self) -> usize {
        self.read_count() + self.list_count()
    }
}

impl ContentStore for MemoryContentStore {
    fn list_packages(&self) -> Result<Vec<String>, BlockError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.packages.read().keys().cloned().collect())
    }

    fn read_file(&self, package_path: &str, file: &str) -> Result<Option<String>, BlockError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        validate_file_name(file)?;
        Ok(self
            .packages
            .read()
            .get(package_path)
            .and_then(|files| files.get(file))
            .cloned())
    }
}
