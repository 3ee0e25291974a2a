//! End-to-end generation run.
//!
//! ```text
//! acquire manifest → select → populate details (projects)
//!                  → build/push (projects) → generate (all selected)
//!                  → aggregate
//! ```
//!
//! Each phase completes for every resource before the next one starts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use manifold_core::{
    AcquireError, CacheError, ContainerBuilder, ContainerDetailsCache, ContainerError,
    DeployConfig, Manifest, ManifestBuilder, ProjectResource, ResourceDescriptor, ResourceKind,
};

use crate::output::OutputError;
use crate::processor::{
    BuildError, FinalManifestCollection, FinalProcessor, PopulateError, ProcessContext,
    ProcessError,
};
use crate::registry::ProcessorRegistry;

/// File name used for a manifest produced by the application host.
pub const MANIFEST_FILE: &str = "manifest.json";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Selection ──

/// Chooses which manifest resources a run processes.
///
/// The returned order is the processing order and therefore the order of
/// the aggregate manifest.
pub trait ResourceSelector {
    fn select(&self, manifest: &Manifest) -> Result<Vec<String>, SelectError>;
}

/// Selects every resource in manifest order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

impl ResourceSelector for SelectAll {
    fn select(&self, manifest: &Manifest) -> Result<Vec<String>, SelectError> {
        Ok(manifest.names())
    }
}

/// Selects an explicit list of names, in the given order.
#[derive(Debug, Clone, Default)]
pub struct SelectNamed {
    names: Vec<String>,
}

impl SelectNamed {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResourceSelector for SelectNamed {
    fn select(&self, _manifest: &Manifest) -> Result<Vec<String>, SelectError> {
        Ok(self.names.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("resource selection was cancelled")]
    Cancelled,

    #[error("resource selection failed")]
    Failed { source: BoxError },
}

// ── Options ──

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Application host project directory (or project file).
    pub app_host: PathBuf,
    /// Use this manifest instead of running the application host.
    pub manifest_path: Option<PathBuf>,
    pub output_path: PathBuf,
    /// Resolve image references but do not build or push images.
    pub skip_build: bool,
    pub build_timeout: Option<Duration>,
    pub deploy: DeployConfig,
}

// ── Outcome ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Artifacts were written; `files` counts them.
    Generated { files: usize },
    /// Not processed and not an error (untyped, unsupported, no processor).
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Pushed { image: String },
    /// Build was skipped for this run.
    NotBuilt { image: String },
    Failed { image: String, reason: String },
    /// Image reference could not be determined.
    Unresolved { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub name: String,
    pub kind: Option<ResourceKind>,
    pub status: ResourceStatus,
    pub image: Option<ImageStatus>,
    pub aggregated: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub manifest_path: PathBuf,
    /// One report per selected resource, in processing order.
    pub resources: Vec<ResourceReport>,
    /// Names listed in the aggregate manifest, in order.
    pub aggregate: Vec<String>,
    pub aggregate_path: PathBuf,
}

impl PipelineOutcome {
    pub fn failures(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources.iter().filter(|r| {
            matches!(r.status, ResourceStatus::Failed { .. })
                || matches!(
                    r.image,
                    Some(ImageStatus::Failed { .. } | ImageStatus::Unresolved { .. })
                )
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

// ── Pipeline ──

#[derive(Debug)]
pub struct Pipeline {
    registry: ProcessorRegistry,
    final_processor: FinalProcessor,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(registry: ProcessorRegistry, options: PipelineOptions) -> Self {
        Self {
            registry,
            final_processor: FinalProcessor,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every phase once.
    ///
    /// Per-resource problems are recorded in the returned outcome. Only
    /// acquisition, manifest loading, selection, cache corruption and
    /// ordering violations end the run with an error.
    pub async fn run<M, B, S>(
        &self,
        host: &M,
        builder: &B,
        selector: &S,
    ) -> Result<PipelineOutcome, PipelineError>
    where
        M: ManifestBuilder,
        B: ContainerBuilder,
        S: ResourceSelector + ?Sized,
    {
        // ── Acquire ──
        let manifest_path = match &self.options.manifest_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "using existing manifest");
                path.clone()
            }
            None => {
                let target = default_manifest_path(&self.options.app_host);
                tracing::info!(app_host = %self.options.app_host.display(), "acquiring manifest");
                host.build_manifest(&self.options.app_host, &target).await?
            }
        };
        let manifest =
            Manifest::load(&manifest_path).map_err(|source| PipelineError::Manifest { source })?;
        tracing::info!(resources = manifest.len(), "manifest loaded");

        // ── Select ──
        let selected = normalize_selection(&manifest, selector.select(&manifest)?);
        tracing::info!(selected = selected.len(), "resources selected");

        let projects: Vec<(&str, &ProjectResource)> = selected
            .iter()
            .filter_map(|name| {
                let project = manifest.get(name)?.as_project()?;
                Some((name.as_str(), project))
            })
            .collect();

        let mut cache = ContainerDetailsCache::new();
        let mut images: HashMap<String, ImageStatus> = HashMap::new();

        if let Some(processor) = self.registry.project() {
            if !projects.is_empty() {
                builder
                    .check_available()
                    .await
                    .map_err(|source| PipelineError::Builder { source })?;
            }

            // ── Populate container details ──
            for (name, project) in &projects {
                match processor
                    .populate_container_details(name, project, builder, &mut cache)
                    .await
                {
                    Ok(()) => {}
                    Err(PopulateError::Collision(source)) => {
                        return Err(PipelineError::Cache { source });
                    }
                    Err(PopulateError::Details(e)) => {
                        let reason = error_chain(&e);
                        tracing::error!(
                            resource = %name,
                            error = %reason,
                            "could not resolve container details"
                        );
                        images.insert((*name).to_owned(), ImageStatus::Unresolved { reason });
                    }
                }
            }

            // ── Build and push ──
            let buildable: Vec<(&str, &ProjectResource)> = projects
                .iter()
                .filter(|(name, _)| !images.contains_key(*name))
                .copied()
                .collect();
            if self.options.skip_build {
                tracing::info!("container build skipped");
                for (name, _) in buildable {
                    if let Some(details) = cache.get(name) {
                        images.insert(
                            name.to_owned(),
                            ImageStatus::NotBuilt {
                                image: details.full_image(),
                            },
                        );
                    }
                }
            } else {
                for (name, project) in buildable {
                    let Some(details) = cache.get(name) else {
                        return Err(PipelineError::ContractViolation {
                            name: name.to_owned(),
                        });
                    };
                    let image = details.full_image();
                    let status = match processor
                        .build_and_push(name, project, builder, &cache, self.options.build_timeout)
                        .await
                    {
                        Ok(image) => ImageStatus::Pushed { image },
                        Err(BuildError::MissingContainerDetails { name }) => {
                            return Err(PipelineError::ContractViolation { name });
                        }
                        Err(e) => {
                            let reason = error_chain(&e);
                            tracing::error!(
                                resource = %name,
                                error = %reason,
                                "container build failed"
                            );
                            ImageStatus::Failed { image, reason }
                        }
                    };
                    images.insert(name.to_owned(), status);
                }
            }
        } else if !projects.is_empty() {
            tracing::warn!("no project processor registered; container images are not resolved");
        }

        // ── Generate ──
        let ctx = ProcessContext {
            output_path: &self.options.output_path,
            manifest: &manifest,
            containers: &cache,
            deploy: &self.options.deploy,
        };
        let mut collection = FinalManifestCollection::new();
        let mut reports = Vec::with_capacity(selected.len());

        for name in &selected {
            let Some(resource) = manifest.get(name) else {
                continue;
            };
            let image = images.remove(name.as_str());
            let status = if let Some(ImageStatus::Unresolved { reason }) = &image {
                ResourceStatus::Failed {
                    reason: format!("container details unavailable: {reason}"),
                }
            } else {
                self.generate(name, resource, &ctx, &mut collection)?
            };

            reports.push(ResourceReport {
                name: name.clone(),
                kind: resource.kind(),
                status,
                image,
                aggregated: collection.contains(name),
            });
        }

        // ── Aggregate ──
        let aggregate_path = self
            .final_processor
            .create_final_manifest(&collection, &self.options.output_path)
            .map_err(|source| PipelineError::Aggregate { source })?;

        Ok(PipelineOutcome {
            manifest_path,
            resources: reports,
            aggregate: collection.names(),
            aggregate_path,
        })
    }

    /// Dispatch one resource and record it in `collection` on success.
    fn generate(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
        collection: &mut FinalManifestCollection,
    ) -> Result<ResourceStatus, PipelineError> {
        let kind = match resource {
            ResourceDescriptor::Untyped => {
                return Ok(skipped(name, "resource has no type".to_owned()));
            }
            ResourceDescriptor::Unsupported { kind } => {
                return Ok(skipped(name, format!("unsupported resource type '{kind}'")));
            }
            ResourceDescriptor::Final => {
                return Ok(skipped(name, "aggregate entries are generated by manifold".to_owned()));
            }
            ResourceDescriptor::Malformed { kind, reason } => {
                tracing::error!(resource = %name, %kind, %reason, "malformed resource");
                return Ok(ResourceStatus::Failed {
                    reason: format!("malformed {kind} resource: {reason}"),
                });
            }
            other => match other.kind() {
                Some(kind) => kind,
                None => return Ok(skipped(name, "resource has no type".to_owned())),
            },
        };

        let Some(processor) = self.registry.resolve(kind) else {
            return Ok(skipped(name, format!("no processor registered for {kind}")));
        };

        match processor.create_manifests(name, resource, ctx) {
            Ok(files) => {
                tracing::info!(resource = %name, %kind, files = files.len(), "manifests generated");
                if kind.is_database() {
                    tracing::debug!(resource = %name, "database resources are not aggregated");
                } else {
                    collection.push(name, resource.clone());
                }
                Ok(ResourceStatus::Generated { files: files.len() })
            }
            Err(ProcessError::MissingContainerDetails { name }) => {
                Err(PipelineError::ContractViolation { name })
            }
            Err(e) => {
                let reason = error_chain(&e);
                tracing::error!(resource = %name, error = %reason, "manifest generation failed");
                Ok(ResourceStatus::Failed { reason })
            }
        }
    }
}

/// Where the application host is asked to write its manifest.
pub fn default_manifest_path(app_host: &Path) -> PathBuf {
    let dir = if app_host.is_file() {
        app_host.parent().unwrap_or(Path::new("."))
    } else {
        app_host
    };
    dir.join(MANIFEST_FILE)
}

/// Drop names missing from the manifest and repeated names, keeping the
/// first occurrence.
fn normalize_selection(manifest: &Manifest, requested: Vec<String>) -> Vec<String> {
    let mut selected: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        if manifest.get(&name).is_none() {
            tracing::warn!(resource = %name, "selected resource is not in the manifest; ignoring");
        } else if !selected.contains(&name) {
            selected.push(name);
        }
    }
    selected
}

fn skipped(name: &str, reason: String) -> ResourceStatus {
    tracing::warn!(resource = %name, %reason, "resource skipped");
    ResourceStatus::Skipped { reason }
}

/// `err` followed by each of its sources, separated by `: `.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error("failed to load manifest")]
    Manifest { source: manifold_core::Error },

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error("container details cache is inconsistent")]
    Cache { source: CacheError },

    #[error("cannot resolve or build project images")]
    Builder { source: ContainerError },

    #[error("resource '{name}' reached build or manifest generation without container details")]
    ContractViolation { name: String },

    #[error("failed to write aggregate manifest")]
    Aggregate { source: OutputError },
}
