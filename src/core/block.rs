//! Block data types and the block error taxonomy
//!
//! A block is a package in the content store made of a metadata descriptor,
//! a JSON schema and a bundled source file. This module defines the parsed
//! forms of those three files and the errors raised while loading or
//! evaluating them.

use serde::{Deserialize, Serialize};

use crate::script::ScriptError;

/// Text a block source must contain before it is executed.
///
/// This only filters out obviously wrong content. It does not guarantee the
/// source builds a well-formed component, and it is not a security boundary.
pub const COMPONENT_MARKER: &str = "createElement";

/// Metadata for one catalogued block
///
/// Recreated on every catalog scan and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    /// Unique key, `{orgShortname}/{slug}`
    pub package_path: String,
    /// Package name declared by the descriptor, if any
    pub name: Option<String>,
    pub display_name: String,
    pub version: String,
    pub description: String,
    /// Public icon URL
    pub icon: Option<String>,
    pub repository: Option<String>,
    pub last_updated: Option<String>,
    /// Schema file name inside the block directory
    pub schema: String,
    /// Source bundle file name inside the block directory
    pub source: String,
}

impl BlockMetadata {
    /// Org shortname half of the package path, sigil included.
    pub fn org_shortname(&self) -> &str {
        self.package_path
            .split_once('/')
            .map(|(org, _)| org)
            .unwrap_or(&self.package_path)
    }

    /// Slug half of the package path.
    pub fn slug(&self) -> &str {
        self.package_path
            .split_once('/')
            .map(|(_, slug)| slug)
            .unwrap_or_default()
    }

    /// Route of this block's demo page.
    pub fn route(&self) -> String {
        format!("/{}/blocks/{}", self.org_shortname(), self.slug())
    }
}

/// JSON-Schema-shaped description of the data a block expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockSchema(pub serde_json::Value);

/// Raw text of a block's executable bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlockSource(String);

impl BlockSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    /// Heuristic check for [`COMPONENT_MARKER`].
    pub fn looks_like_component(&self) -> bool {
        self.0.contains(COMPONENT_MARKER)
    }
}

/// Schema and source read for a single block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockData {
    pub schema: BlockSchema,
    pub source: BlockSource,
}

/// Block errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    /// Missing route, catalog entry, schema or source file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Schema file is not well-formed JSON
    #[error("Parse error in {file}: {message}")]
    ParseError { file: String, message: String },

    /// Source asked for a dependency outside the allow-list
    #[error("missing dependency {0}")]
    UnresolvedDependency(String),

    /// Source rejected by the component heuristic before execution
    #[error(
        "Block is not a React component - source does not contain '{}'",
        COMPONENT_MARKER
    )]
    NotAComponent,

    /// Export precedence chain found no component
    #[error(
        "Block component must be exported as default, App, or the only named export in the source file (found: [{}])",
        .0.join(", ")
    )]
    AmbiguousExport(Vec<String>),

    /// Source failed to parse or threw while running
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    /// Store read failed for a reason other than absence
    #[error("IO error: {0}")]
    Io(String),
}

impl From<ScriptError> for BlockError {
    fn from(error: ScriptError) -> Self {
        match error {
            ScriptError::UnresolvedDependency(name) => BlockError::UnresolvedDependency(name),
            other => BlockError::EvaluationFailed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for BlockError {
    fn from(error: std::io::Error) -> Self {
        BlockError::Io(error.to_string())
    }
}
