//! Core block abstractions and types
//!
//! This module defines the block data model, the error taxonomy shared by the
//! loading pipeline and the dependency allow-list executed block code runs
//! against.

pub mod block;
pub mod dependencies;
pub mod registry;

pub use block::{BlockData, BlockError, BlockMetadata, BlockSchema, BlockSource, COMPONENT_MARKER};
pub use registry::{DependencyRegistry, RegistryError};
