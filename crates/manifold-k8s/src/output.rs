use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::templates::{KUSTOMIZATION_FILE, Kustomization};

/// A rendered file belonging to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content: String,
}

impl Artifact {
    pub fn new(file_name: &str, content: String) -> Self {
        Self {
            file_name: file_name.to_owned(),
            content,
        }
    }

    /// Serialize `document` as the YAML content of `file_name`.
    pub fn yaml<T: Serialize>(file_name: &str, document: &T) -> Result<Self, OutputError> {
        let content = serde_yaml::to_string(document).map_err(|e| OutputError::Render {
            file: file_name.to_owned(),
            source: e,
        })?;
        Ok(Self::new(file_name, content))
    }
}

/// Everything written into one resource directory.
///
/// The directory's `kustomization.yml` lists `artifacts` in order and,
/// when `env` is non-empty, generates a `<name>-env` ConfigMap from it.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    pub env: Vec<(String, String)>,
    pub artifacts: Vec<Artifact>,
}

/// Name of the ConfigMap generated for a resource's environment.
pub fn env_config_map_name(resource: &str) -> String {
    format!("{resource}-env")
}

/// Render and write a resource directory under `output_root`.
///
/// The directory `output_root/<name>` is removed and recreated first, so
/// files left by a previous run never survive. Returns the written paths,
/// kustomization last.
pub fn write_resource(
    output_root: &Path,
    name: &str,
    set: &ArtifactSet,
) -> Result<Vec<PathBuf>, OutputError> {
    let dir = prepare_resource_dir(output_root, name)?;

    let mut written = Vec::with_capacity(set.artifacts.len() + 1);
    for artifact in &set.artifacts {
        written.push(write_file(&dir, &artifact.file_name, &artifact.content)?);
    }

    let resources: Vec<String> = set.artifacts.iter().map(|a| a.file_name.clone()).collect();
    let kustomization = Artifact::yaml(
        KUSTOMIZATION_FILE,
        &Kustomization::new(resources).with_config_map(&env_config_map_name(name), &set.env),
    )?;
    written.push(write_file(&dir, &kustomization.file_name, &kustomization.content)?);

    tracing::debug!(
        resource = %name,
        files = written.len(),
        dir = %dir.display(),
        "artifacts written"
    );
    Ok(written)
}

/// Remove any previous `output_root/<name>` and create it empty.
pub fn prepare_resource_dir(output_root: &Path, name: &str) -> Result<PathBuf, OutputError> {
    validate_resource_name(name)?;
    let dir = output_root.join(name);

    if dir.exists() {
        std::fs::remove_dir_all(&dir).map_err(|e| OutputError::Cleanup {
            path: dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&dir).map_err(|e| OutputError::Create {
        path: dir.clone(),
        source: e,
    })?;

    Ok(dir)
}

/// Write a file at `dir/file_name`, creating `dir` if needed.
pub fn write_file(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf, OutputError> {
    std::fs::create_dir_all(dir).map_err(|e| OutputError::Create {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let path = dir.join(file_name);
    std::fs::write(&path, content).map_err(|e| OutputError::Write {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Resource names become directory names under the output root.
fn validate_resource_name(name: &str) -> Result<(), OutputError> {
    let reason = if name.is_empty() {
        Some("empty name")
    } else if name == "." || name == ".." {
        Some("relative path component")
    } else if name.contains(['/', '\\']) {
        Some("contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(OutputError::InvalidName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("resource name {name:?} cannot be used as a directory: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("failed to render {file}")]
    Render {
        file: String,
        source: serde_yaml::Error,
    },
    #[error("failed to clean up output directory {path}")]
    Cleanup {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
