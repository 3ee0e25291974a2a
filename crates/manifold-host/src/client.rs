use std::path::{Path, PathBuf};

use manifold_core::{
    AcquireError, ContainerBuilder, ContainerConfig, ContainerDetails, ContainerError,
    ManifestBuilder, ProjectResource,
};
use serde::Deserialize;

use crate::dotnet::DotnetError;
use crate::executor::{DotnetExecutor, RealExecutor};

/// Tag used when neither config nor the project sets one.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// dotnet CLI operations client, parameterized over the executor for testability.
pub struct DotnetClient<E: DotnetExecutor = RealExecutor> {
    executor: E,
    overrides: ContainerConfig,
}

impl DotnetClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
            overrides: ContainerConfig::default(),
        }
    }
}

impl Default for DotnetClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DotnetExecutor> DotnetClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self {
            executor,
            overrides: ContainerConfig::default(),
        }
    }

    /// Apply `[container]` settings from manifold.toml. Registry and tag set
    /// there take precedence over the project's own MSBuild properties.
    pub fn with_container_config(mut self, config: &ContainerConfig) -> Self {
        self.overrides = config.clone();
        self
    }

    // ── Preflight ──

    /// Verify the dotnet CLI is installed, returning its version.
    pub async fn check_prerequisites(&self) -> Result<String, PreflightError> {
        match self.executor.exec(&args(["--version"])).await {
            Ok(version) => Ok(version.trim().to_owned()),
            Err(e) => Err(PreflightError::DotnetNotInstalled { source: e }),
        }
    }

    // ── Manifest ──

    /// Run the application host in publisher mode so it writes its manifest.
    ///
    /// A file already at `output` is removed first, so a run that writes
    /// nothing is reported as [`ManifestError::NotWritten`] instead of
    /// handing back the previous manifest.
    pub async fn publish_manifest(
        &self,
        app_host: &Path,
        output: &Path,
    ) -> Result<PathBuf, ManifestError> {
        let app_host_str = app_host
            .to_str()
            .ok_or_else(|| ManifestError::InvalidPath(app_host.to_path_buf()))?;
        let output_str = output
            .to_str()
            .ok_or_else(|| ManifestError::InvalidPath(output.to_path_buf()))?;

        match std::fs::remove_file(output) {
            Ok(()) => tracing::debug!(path = %output.display(), "removed previous manifest"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %output.display(), "no previous manifest");
            }
            Err(e) => {
                return Err(ManifestError::Stale {
                    path: output.to_path_buf(),
                    source: e,
                });
            }
        }

        let stdout = self
            .executor
            .exec(&args([
                "run",
                "--project",
                app_host_str,
                "--",
                "--publisher",
                "manifest",
                "--output-path",
                output_str,
            ]))
            .await
            .map_err(|e| ManifestError::Run { source: e })?;
        tracing::debug!(output = %stdout.trim(), "app host finished");

        if !output.exists() {
            return Err(ManifestError::NotWritten(output.to_path_buf()));
        }

        Ok(output.to_path_buf())
    }

    // ── Containers ──

    /// Resolve the image reference for a project from its MSBuild container
    /// properties, with `[container]` overrides applied.
    pub async fn resolve_container_details(
        &self,
        name: &str,
        project: &ProjectResource,
    ) -> Result<ContainerDetails, DetailsError> {
        let project_str = project
            .path
            .to_str()
            .ok_or_else(|| DetailsError::InvalidPath(project.path.clone()))?;

        let output = self
            .executor
            .exec(&args([
                "msbuild",
                project_str,
                "-getProperty:ContainerRegistry",
                "-getProperty:ContainerRepository",
                "-getProperty:ContainerImageTag",
            ]))
            .await
            .map_err(|e| DetailsError::Msbuild { source: e })?;

        let parsed: MsbuildOutput =
            serde_json::from_str(output.trim()).map_err(|e| DetailsError::Parse { source: e })?;
        let props = parsed.properties;

        let registry = self
            .overrides
            .registry
            .clone()
            .or_else(|| non_empty(props.registry));
        let repository = non_empty(props.repository).unwrap_or_else(|| name.to_lowercase());
        let tag = self
            .overrides
            .tag
            .clone()
            .or_else(|| non_empty(props.tag))
            .unwrap_or_else(|| DEFAULT_IMAGE_TAG.to_owned());

        Ok(ContainerDetails {
            registry,
            repository,
            tag,
        })
    }

    /// Build the project's container image with the .NET SDK container
    /// support and publish it under `details`.
    pub async fn publish_container(
        &self,
        project: &ProjectResource,
        details: &ContainerDetails,
    ) -> Result<(), PublishError> {
        let project_str = project
            .path
            .to_str()
            .ok_or_else(|| PublishError::InvalidPath(project.path.clone()))?;

        let mut cmd = args([
            "publish",
            project_str,
            "-c",
            "Release",
            "--os",
            "linux",
            "--arch",
            "x64",
            "/t:PublishContainer",
        ]);
        cmd.push(format!("-p:ContainerRepository={}", details.repository));
        cmd.push(format!("-p:ContainerImageTag={}", details.tag));
        if let Some(registry) = details.registry.as_deref() {
            cmd.push(format!("-p:ContainerRegistry={registry}"));
        }

        self.executor
            .exec_streaming(&cmd)
            .await
            .map_err(|e| PublishError::Publish { source: e })
    }
}

impl<E: DotnetExecutor> ManifestBuilder for DotnetClient<E> {
    async fn build_manifest(
        &self,
        app_host: &Path,
        output: &Path,
    ) -> Result<PathBuf, AcquireError> {
        self.publish_manifest(app_host, output)
            .await
            .map_err(|e| AcquireError {
                app_host: app_host.to_path_buf(),
                source: Box::new(e),
            })
    }
}

impl<E: DotnetExecutor> ContainerBuilder for DotnetClient<E> {
    async fn check_available(&self) -> Result<(), ContainerError> {
        let version = self
            .check_prerequisites()
            .await
            .map_err(|e| ContainerError::Unavailable {
                source: Box::new(e),
            })?;
        tracing::debug!(%version, "dotnet SDK available for container builds");
        Ok(())
    }

    async fn container_details(
        &self,
        name: &str,
        project: &ProjectResource,
    ) -> Result<ContainerDetails, ContainerError> {
        self.resolve_container_details(name, project)
            .await
            .map_err(|e| ContainerError::Details {
                name: name.to_owned(),
                source: Box::new(e),
            })
    }

    async fn build_and_push(
        &self,
        name: &str,
        project: &ProjectResource,
        details: &ContainerDetails,
    ) -> Result<(), ContainerError> {
        self.publish_container(project, details)
            .await
            .map_err(|e| ContainerError::Build {
                name: name.to_owned(),
                source: Box::new(e),
            })
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
struct MsbuildOutput {
    #[serde(rename = "Properties")]
    properties: ContainerProperties,
}

#[derive(Deserialize)]
struct ContainerProperties {
    #[serde(rename = "ContainerRegistry", default)]
    registry: Option<String>,
    #[serde(rename = "ContainerRepository", default)]
    repository: Option<String>,
    #[serde(rename = "ContainerImageTag", default)]
    tag: Option<String>,
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("dotnet CLI not available; install from https://dotnet.microsoft.com/download")]
    DotnetNotInstalled { source: DotnetError },
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("app host run failed")]
    Run { source: DotnetError },

    #[error("failed to remove previous manifest at {path}")]
    Stale {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("app host exited successfully but wrote no manifest at {0}")]
    NotWritten(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum DetailsError {
    #[error("project path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("msbuild property query failed")]
    Msbuild { source: DotnetError },

    #[error("unexpected msbuild property output")]
    Parse { source: serde_json::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("project path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("dotnet publish failed")]
    Publish { source: DotnetError },
}
