//! Filesystem-backed content store

use std::fs;
use std::io;
use std::path::PathBuf;

use super::{validate_file_name, ContentStore};
use crate::core::BlockError;

/// Content store rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open a store rooted at `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BlockError> {
        let root = root.into();
        let attr = fs::metadata(&root).map_err(|error| {
            BlockError::Io(format!(
                "content root {} is not accessible: {}",
                root.display(),
                error
            ))
        })?;
        if !attr.is_dir() {
            return Err(BlockError::Io(format!(
                "content root {} must be a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn subdirectories(&self, dir: &std::path::Path) -> Result<Vec<String>, BlockError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => names.push(name),
                Ok(_) => {}
                Err(name) => {
                    tracing::warn!(dir = %dir.display(), ?name, "skipping non UTF-8 directory name");
                }
            }
        }
        Ok(names)
    }
}

impl ContentStore for FsContentStore {
    fn list_packages(&self) -> Result<Vec<String>, BlockError> {
        let mut packages = Vec::new();
        for org in self.subdirectories(&self.root)? {
            let org_dir = self.root.join(&org);
            match self.subdirectories(&org_dir) {
                Ok(slugs) => {
                    packages.extend(slugs.into_iter().map(|slug| format!("{}/{}", org, slug)))
                }
                Err(error) => {
                    tracing::warn!(org = %org, %error, "skipping unreadable org directory");
                }
            }
        }
        Ok(packages)
    }

    fn read_file(&self, package_path: &str, file: &str) -> Result<Option<String>, BlockError> {
        validate_file_name(package_path)?;
        validate_file_name(file)?;

        let path = self.root.join(package_path).join(file);
        tracing::debug!(path = %path.display(), "reading block file");
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(BlockError::Io(format!("{}: {}", path.display(), error))),
        }
    }
}
