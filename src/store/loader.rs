//! Block Data Loader - reads one block's schema and source
//!
//! Pure reads with no caching; the page build scheduler owns caching.

use std::sync::Arc;

use super::ContentStore;
use crate::core::{BlockData, BlockError, BlockMetadata, BlockSchema, BlockSource};

pub struct BlockDataLoader<S> {
    store: Arc<S>,
}

impl<S: ContentStore> BlockDataLoader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Read the schema and source bundle named by `metadata`
    ///
    /// # Returns
    /// * `Err(BlockError::NotFound)` if either file is absent
    /// * `Err(BlockError::ParseError)` if the schema is not valid JSON
    pub fn load_one(&self, metadata: &BlockMetadata) -> Result<BlockData, BlockError> {
        let package = &metadata.package_path;

        let schema_text = self.read_required(package, &metadata.schema)?;
        let schema = serde_json::from_str(&schema_text).map_err(|e| BlockError::ParseError {
            file: format!("{}/{}", package, metadata.schema),
            message: e.to_string(),
        })?;

        let source = self.read_required(package, &metadata.source)?;

        tracing::debug!(
            package = %package,
            source_bytes = source.len(),
            "loaded block data"
        );

        Ok(BlockData {
            schema: BlockSchema(schema),
            source: BlockSource::new(source),
        })
    }

    fn read_required(&self, package: &str, file: &str) -> Result<String, BlockError> {
        self.store
            .read_file(package, file)?
            .ok_or_else(|| BlockError::NotFound(format!("{}/{}", package, file)))
    }
}
