//! Catalog Reader - enumerates every block in the content store
//!
//! Each scan reads one metadata descriptor per block directory and returns a
//! fresh snapshot ordered by package path. The order drives both ahead-of-time
//! page enumeration and the "other blocks" listing, so it must not depend on
//! the order the store happens to list directories in.
//!
//! A missing or malformed descriptor only removes that one entry from the
//! snapshot; it is logged and the scan continues.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use super::ContentStore;
use crate::core::{BlockError, BlockMetadata};

pub const DEFAULT_METADATA_FILE: &str = "block-metadata.json";
pub const DEFAULT_SCHEMA_FILE: &str = "block-schema.json";
pub const DEFAULT_SOURCE_FILE: &str = "main.js";

/// Deterministically ordered block metadata with unique package paths
pub type Catalog = Vec<BlockMetadata>;

/// On-disk shape of `block-metadata.json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockDescriptor {
    name: Option<String>,
    display_name: Option<String>,
    version: String,
    #[serde(default)]
    description: Option<String>,
    icon: Option<String>,
    repository: Option<RepositoryField>,
    last_updated: Option<String>,
    schema: Option<String>,
    source: Option<String>,
}

/// `repository` may be a bare URL or an npm-style `{ type, url }` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepositoryField {
    Url(String),
    Object { url: String },
}

impl RepositoryField {
    fn into_url(self) -> String {
        match self {
            RepositoryField::Url(url) | RepositoryField::Object { url } => url,
        }
    }
}

/// Reads the block catalog from a content store
pub struct CatalogReader<S> {
    store: Arc<S>,
    metadata_file: String,
}

impl<S: ContentStore> CatalogReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_metadata_file(store, DEFAULT_METADATA_FILE)
    }

    pub fn with_metadata_file(store: Arc<S>, metadata_file: impl Into<String>) -> Self {
        Self {
            store,
            metadata_file: metadata_file.into(),
        }
    }

    /// Scan the store and return every readable block, ordered by package path
    ///
    /// # Returns
    /// * `Ok(Catalog)` - possibly empty, never containing a package path twice
    /// * `Err(BlockError)` only if the store cannot be listed at all
    pub fn discover_all(&self) -> Result<Catalog, BlockError> {
        let mut entries: BTreeMap<String, BlockMetadata> = BTreeMap::new();

        for package_path in self.store.list_packages()? {
            match self.read_entry(&package_path) {
                Ok(metadata) => {
                    if entries.contains_key(&metadata.package_path) {
                        tracing::warn!(
                            package = %metadata.package_path,
                            "duplicate package path in content store, keeping the first entry"
                        );
                        continue;
                    }
                    entries.insert(metadata.package_path.clone(), metadata);
                }
                Err(error) => {
                    tracing::warn!(package = %package_path, %error, "skipping block");
                }
            }
        }

        tracing::debug!(blocks = entries.len(), "catalog scan complete");
        Ok(entries.into_values().collect())
    }

    /// Look up one entry in a fresh scan.
    pub fn find(&self, package_path: &str) -> Result<Option<BlockMetadata>, BlockError> {
        Ok(self
            .discover_all()?
            .into_iter()
            .find(|metadata| metadata.package_path == package_path))
    }

    fn read_entry(&self, package_path: &str) -> Result<BlockMetadata, BlockError> {
        let text = self
            .store
            .read_file(package_path, &self.metadata_file)?
            .ok_or_else(|| {
                BlockError::NotFound(format!("{}/{}", package_path, self.metadata_file))
            })?;

        let descriptor: BlockDescriptor =
            serde_json::from_str(&text).map_err(|e| BlockError::ParseError {
                file: format!("{}/{}", package_path, self.metadata_file),
                message: e.to_string(),
            })?;

        expand_descriptor(package_path, descriptor)
    }
}

fn expand_descriptor(
    package_path: &str,
    descriptor: BlockDescriptor,
) -> Result<BlockMetadata, BlockError> {
    let (org, slug) = package_path
        .split_once('/')
        .filter(|(org, slug)| !org.is_empty() && !slug.is_empty() && !slug.contains('/'))
        .ok_or_else(|| BlockError::NotFound(format!("invalid package path '{}'", package_path)))?;

    let version = descriptor.version.trim().to_string();
    if version.is_empty() {
        return Err(BlockError::ParseError {
            file: package_path.to_string(),
            message: "Block version cannot be empty".into(),
        });
    }

    let display_name = descriptor
        .display_name
        .or_else(|| descriptor.name.clone())
        .unwrap_or_else(|| slug.to_string());

    Ok(BlockMetadata {
        package_path: format!("{}/{}", org, slug),
        name: descriptor.name,
        display_name,
        version,
        description: descriptor.description.unwrap_or_default(),
        icon: descriptor
            .icon
            .map(|icon| expand_icon_url(package_path, &icon)),
        repository: descriptor.repository.map(RepositoryField::into_url),
        last_updated: descriptor.last_updated,
        schema: descriptor
            .schema
            .unwrap_or_else(|| DEFAULT_SCHEMA_FILE.to_string()),
        source: descriptor
            .source
            .unwrap_or_else(|| DEFAULT_SOURCE_FILE.to_string()),
    })
}

/// Relative icons are served from the block's public directory.
fn expand_icon_url(package_path: &str, icon: &str) -> String {
    if icon.starts_with('/') || icon.starts_with("data:") || icon.contains("://") {
        icon.to_string()
    } else {
        format!(
            "/blocks/{}/{}",
            package_path,
            icon.trim_start_matches("./")
        )
    }
}
