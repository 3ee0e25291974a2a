//! Manifest loading and acquisition.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::resource::ResourceDescriptor;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resource topology described by the application host.
///
/// Resources keep the order in which they appear in the manifest file; that
/// order is what the operator is offered during selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    resources: Vec<(String, ResourceDescriptor)>,
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// Relative project paths are resolved against the manifest's directory.
    ///
    /// # Errors
    ///
    /// - [`Error::ManifestRead`](crate::Error::ManifestRead) if the file cannot be read
    /// - [`Error::ManifestParse`](crate::Error::ManifestParse) if it is not JSON
    /// - [`Error::ManifestMissingResources`](crate::Error::ManifestMissingResources)
    ///   if there is no top-level `resources` object
    pub fn load(path: &Path) -> crate::Result<Self> {
        tracing::debug!(path = %path.display(), "loading manifest");
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ManifestRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut manifest = Self::parse(&content, path)?;
        if let Some(base) = path.parent() {
            manifest.resolve_project_paths(base);
        }

        tracing::debug!(resources = manifest.len(), "manifest loaded");
        Ok(manifest)
    }

    /// Parse manifest JSON. `origin` is only used for error reporting.
    pub fn parse(content: &str, origin: &Path) -> crate::Result<Self> {
        let root: Value =
            serde_json::from_str(content).map_err(|e| crate::Error::ManifestParse {
                path: origin.to_path_buf(),
                source: e,
            })?;

        let entries = root
            .get("resources")
            .and_then(Value::as_object)
            .ok_or_else(|| crate::Error::ManifestMissingResources {
                path: origin.to_path_buf(),
            })?;

        let resources = entries
            .iter()
            .map(|(name, entry)| (name.clone(), ResourceDescriptor::from_entry(entry)))
            .collect();

        Ok(Self { resources })
    }

    pub fn from_resources(
        resources: impl IntoIterator<Item = (String, ResourceDescriptor)>,
    ) -> Self {
        Self {
            resources: resources.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    /// Resource names in manifest order.
    pub fn names(&self) -> Vec<String> {
        self.resources.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDescriptor)> {
        self.resources.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn resolve_project_paths(&mut self, base: &Path) {
        for (_, descriptor) in &mut self.resources {
            if let ResourceDescriptor::Project(project) = descriptor
                && project.path.is_relative()
            {
                project.path = base.join(&project.path);
            }
        }
    }
}

/// Produces a manifest by running the application host.
#[allow(async_fn_in_trait)]
pub trait ManifestBuilder: Send + Sync {
    /// Run the application host in `app_host` and write its manifest to
    /// `output`. Returns the path of the written manifest.
    async fn build_manifest(&self, app_host: &Path, output: &Path)
    -> Result<PathBuf, AcquireError>;
}

#[derive(Debug, thiserror::Error)]
#[error("application host at {app_host} did not produce a manifest")]
pub struct AcquireError {
    pub app_host: PathBuf,
    pub source: BoxError,
}
