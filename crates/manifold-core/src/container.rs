//! Container image metadata for project resources.

use std::collections::HashMap;
use std::fmt;

use crate::resource::ProjectResource;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resolved image reference for a buildable project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: String,
}

impl ContainerDetails {
    /// `registry/repository:tag`, or `repository:tag` without a registry.
    pub fn full_image(&self) -> String {
        match self.registry.as_deref().map(|r| r.trim_end_matches('/')) {
            Some(registry) if !registry.is_empty() => {
                format!("{registry}/{}:{}", self.repository, self.tag)
            }
            _ => format!("{}:{}", self.repository, self.tag),
        }
    }
}

impl fmt::Display for ContainerDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_image())
    }
}

/// Per-run store of container details, keyed by resource name.
///
/// Entries are written once while details are populated and only read
/// afterwards. A second insert for the same name is rejected.
#[derive(Debug, Default)]
pub struct ContainerDetailsCache {
    entries: HashMap<String, ContainerDetails>,
}

impl ContainerDetailsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store details for `name`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Collision`] if `name` is already cached; the existing
    /// entry is left untouched.
    pub fn insert(&mut self, name: &str, details: ContainerDetails) -> Result<(), CacheError> {
        if self.entries.contains_key(name) {
            return Err(CacheError::Collision {
                name: name.to_owned(),
            });
        }
        tracing::debug!(resource = %name, image = %details, "container details cached");
        self.entries.insert(name.to_owned(), details);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ContainerDetails> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("container details for '{name}' are already cached; resource processed twice")]
    Collision { name: String },
}

/// Discovers image metadata for projects and builds/publishes their images.
#[allow(async_fn_in_trait)]
pub trait ContainerBuilder: Send + Sync {
    /// Confirm the builder's toolchain can run. Checked once per run,
    /// before any project is populated.
    async fn check_available(&self) -> Result<(), ContainerError> {
        Ok(())
    }

    /// Resolve the image reference a project will be published under.
    async fn container_details(
        &self,
        name: &str,
        project: &ProjectResource,
    ) -> Result<ContainerDetails, ContainerError>;

    /// Build the project's image and push it as `details`.
    async fn build_and_push(
        &self,
        name: &str,
        project: &ProjectResource,
        details: &ContainerDetails,
    ) -> Result<(), ContainerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container tooling is not available")]
    Unavailable { source: BoxError },

    #[error("failed to resolve container details for '{name}'")]
    Details { name: String, source: BoxError },

    #[error("container build/push failed for '{name}'")]
    Build { name: String, source: BoxError },
}
