use std::path::{Path, PathBuf};

use manifold_core::ResourceDescriptor;

use crate::output::{self, Artifact, OutputError};
use crate::templates::{KUSTOMIZATION_FILE, Kustomization};

/// Resources that made it into the top-level kustomization, in the order
/// they were added.
#[derive(Debug, Clone, Default)]
pub struct FinalManifestCollection {
    entries: Vec<(String, ResourceDescriptor)>,
}

impl FinalManifestCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name`. A name already present keeps its first position.
    pub fn push(&mut self, name: &str, resource: ResourceDescriptor) {
        if self.contains(name) {
            tracing::warn!(resource = %name, "resource already aggregated; ignoring duplicate");
            return;
        }
        self.entries.push((name.to_owned(), resource));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDescriptor)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes the output root's `kustomization.yml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalProcessor;

impl FinalProcessor {
    /// Every member directory is listed under `resources:` in collection
    /// order. Per-resource directories are left untouched.
    pub fn create_final_manifest(
        &self,
        collection: &FinalManifestCollection,
        output_path: &Path,
    ) -> Result<PathBuf, OutputError> {
        let kustomization =
            Artifact::yaml(KUSTOMIZATION_FILE, &Kustomization::new(collection.names()))?;
        let path = output::write_file(
            output_path,
            &kustomization.file_name,
            &kustomization.content,
        )?;
        tracing::info!(
            resources = collection.len(),
            path = %path.display(),
            "aggregate manifest written"
        );
        Ok(path)
    }
}
