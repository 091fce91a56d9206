//! Dependency Registry - the closed allow-list block code can `require`
//!
//! Block source is untrusted third-party content, so the set of symbols it can
//! reach is an explicit list rather than whatever the host has available.
//! Unknown names fail closed with [`RegistryError::UnresolvedDependency`].
//!
//! The registry is assembled once with [`DependencyRegistryBuilder`] and is
//! read-only afterwards. Cloning is cheap and shares the same entries, so
//! `resolve` hands out the same value for a name for the whole process.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::script::Value;

/// Immutable mapping from dependency name to its implementation
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    dependencies: Arc<BTreeMap<String, Value>>,
}

impl DependencyRegistry {
    /// Start building a registry
    ///
    /// # Example
    /// ```
    /// use block_hub::core::registry::DependencyRegistry;
    /// use block_hub::script::Value;
    ///
    /// let registry = DependencyRegistry::builder()
    ///     .register("answer", Value::Number(42.0))
    ///     .unwrap()
    ///     .build();
    /// assert!(registry.contains("answer"));
    /// ```
    pub fn builder() -> DependencyRegistryBuilder {
        DependencyRegistryBuilder::default()
    }

    /// Registry with the dependencies the hub provides to every block.
    pub fn standard() -> Self {
        let mut builder = Self::builder();
        for (name, implementation) in super::dependencies::standard_dependencies() {
            builder.dependencies.insert(name.to_string(), implementation);
        }
        builder.build()
    }

    /// Resolve a dependency by name
    ///
    /// # Returns
    /// * `Ok(Value)` - the shared implementation registered under `name`
    /// * `Err(RegistryError::UnresolvedDependency)` if `name` is not allowed
    pub fn resolve(&self, name: &str) -> Result<Value, RegistryError> {
        self.dependencies
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnresolvedDependency(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Registered names in lexical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Collects dependencies before the registry is frozen
#[derive(Default)]
pub struct DependencyRegistryBuilder {
    dependencies: BTreeMap<String, Value>,
}

impl DependencyRegistryBuilder {
    /// Add a dependency
    ///
    /// # Returns
    /// * `Err(RegistryError::DuplicateDependency)` if the name is taken
    /// * `Err(RegistryError::ValidationError)` if the name is empty
    pub fn register(
        mut self,
        name: impl Into<String>,
        implementation: Value,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::ValidationError(
                "Dependency name cannot be empty".into(),
            ));
        }
        if self.dependencies.contains_key(&name) {
            return Err(RegistryError::DuplicateDependency(name));
        }
        self.dependencies.insert(name, implementation);
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> DependencyRegistry {
        DependencyRegistry {
            dependencies: Arc::new(self.dependencies),
        }
    }
}

/// Registry error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Name is not in the allow-list
    #[error("missing dependency {0}")]
    UnresolvedDependency(String),

    /// Attempted to register a name twice
    #[error("Duplicate dependency: {0}")]
    DuplicateDependency(String),

    /// Registration input rejected
    #[error("Validation error: {0}")]
    ValidationError(String),
}
