//! Assembled block pages

use std::time::SystemTime;

use serde::Serialize;
use uuid::Uuid;

use super::exports::ComponentRef;
use crate::core::{BlockData, BlockMetadata, BlockSchema, BlockSource};

/// Everything a renderer needs for one block's demo page
///
/// Bundles are immutable once built. A rebuild produces a new bundle with a
/// new `build_id` rather than changing an existing one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBundle {
    pub build_id: Uuid,
    pub built_at: SystemTime,
    pub metadata: BlockMetadata,
    pub schema: BlockSchema,
    pub source: BlockSource,
    pub component: ComponentRef,
    /// Every other catalog entry, in catalog order
    pub siblings: Vec<BlockMetadata>,
    pub repository_display_url: Option<String>,
}

impl PageBundle {
    pub fn assemble(
        metadata: BlockMetadata,
        data: BlockData,
        component: ComponentRef,
        catalog: &[BlockMetadata],
    ) -> Self {
        let siblings = catalog
            .iter()
            .filter(|entry| entry.package_path != metadata.package_path)
            .cloned()
            .collect();
        let repository_display_url = metadata
            .repository
            .as_deref()
            .and_then(repository_display_url);

        Self {
            build_id: Uuid::new_v4(),
            built_at: SystemTime::now(),
            metadata,
            schema: data.schema,
            source: data.source,
            component,
            siblings,
            repository_display_url,
        }
    }
}

/// Shorten a repository URL for display
///
/// GitHub URLs become `github.com/{org}/{repo}` no matter how deep they
/// point; anything else only loses its scheme.
pub fn repository_display_url(repository: &str) -> Option<String> {
    let parsed = match url::Url::parse(repository) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!(repository, %error, "unparseable repository URL");
            return None;
        }
    };
    let host = parsed.host_str()?;
    let display = format!("{}{}", host, parsed.path());

    if host == "github.com" {
        Some(display.split('/').take(3).collect::<Vec<_>>().join("/"))
    } else {
        Some(display)
    }
}
