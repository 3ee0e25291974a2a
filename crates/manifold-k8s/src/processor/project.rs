use std::path::PathBuf;
use std::time::Duration;

use manifold_core::{
    Binding, CacheError, ContainerBuilder, ContainerDetailsCache, ContainerError, ProjectResource,
    ResourceDescriptor, ResourceKind,
};

use super::{ProcessContext, ProcessError, Processor, output_error, unexpected, workload_artifacts};
use crate::connection::resolve_env;
use crate::output::{self, ArtifactSet, env_config_map_name};
use crate::templates::{ContainerPort, Workload};

/// Port a .NET container listens on for plain HTTP by default.
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

/// Processes `project.v0` resources.
///
/// Work for a project happens in three steps, each run for every selected
/// project before the next begins:
///
/// 1. [`populate_container_details`](Self::populate_container_details)
/// 2. [`build_and_push`](Self::build_and_push)
/// 3. [`Processor::create_manifests`]
///
/// Steps 2 and 3 read the cache entry written in step 1.
#[derive(Debug, Clone)]
pub struct ProjectProcessor {
    replicas: u32,
}

impl ProjectProcessor {
    pub fn new(replicas: u32) -> Self {
        Self { replicas }
    }

    /// Resolve the project's image reference and cache it under `name`.
    ///
    /// # Errors
    ///
    /// - [`PopulateError::Collision`] if `name` was already populated this run
    /// - [`PopulateError::Details`] if the builder cannot resolve details
    pub async fn populate_container_details<B: ContainerBuilder>(
        &self,
        name: &str,
        project: &ProjectResource,
        builder: &B,
        cache: &mut ContainerDetailsCache,
    ) -> Result<(), PopulateError> {
        if cache.contains(name) {
            return Err(PopulateError::Collision(CacheError::Collision {
                name: name.to_owned(),
            }));
        }

        let details = builder.container_details(name, project).await?;
        tracing::info!(resource = %name, image = %details, "container details resolved");
        cache.insert(name, details)?;
        Ok(())
    }

    /// Build and publish the project's image as recorded in `cache`.
    ///
    /// No retry is attempted. When `timeout` is set and elapses, the build
    /// is abandoned and reported as [`BuildError::TimedOut`].
    pub async fn build_and_push<B: ContainerBuilder>(
        &self,
        name: &str,
        project: &ProjectResource,
        builder: &B,
        cache: &ContainerDetailsCache,
        timeout: Option<Duration>,
    ) -> Result<String, BuildError> {
        let details = cache
            .get(name)
            .ok_or_else(|| BuildError::MissingContainerDetails {
                name: name.to_owned(),
            })?;

        tracing::info!(resource = %name, image = %details, "building and pushing container");
        let build = builder.build_and_push(name, project, details);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, build)
                .await
                .map_err(|elapsed| BuildError::TimedOut {
                    name: name.to_owned(),
                    after: limit,
                    source: elapsed,
                })??,
            None => build.await?,
        }

        Ok(details.full_image())
    }
}

impl Processor for ProjectProcessor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Project
    }

    fn create_manifests(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        let ResourceDescriptor::Project(project) = resource else {
            return Err(unexpected(name, ResourceKind::Project));
        };

        let details =
            ctx.containers
                .get(name)
                .ok_or_else(|| ProcessError::MissingContainerDetails {
                    name: name.to_owned(),
                })?;

        let image = details.full_image();
        let ports = project_ports(project);
        let env = resolve_env(&project.env, ctx.manifest, ctx.deploy);
        let config_map = env_config_map_name(name);

        let workload = Workload {
            name,
            image: &image,
            replicas: self.replicas,
            ports: &ports,
            env_config_map: (!env.is_empty()).then_some(config_map.as_str()),
        };

        let set = ArtifactSet {
            artifacts: workload_artifacts(&workload).map_err(output_error(name))?,
            env,
        };

        output::write_resource(ctx.output_path, name, &set).map_err(output_error(name))
    }
}

/// Container port for a binding, defaulting by scheme.
pub fn binding_port(binding: &Binding) -> u16 {
    binding.container_port.unwrap_or(if binding.scheme == "https" {
        DEFAULT_HTTPS_PORT
    } else {
        DEFAULT_HTTP_PORT
    })
}

/// Distinct container ports exposed by a project; plain HTTP when it
/// declares no bindings.
pub fn project_ports(project: &ProjectResource) -> Vec<ContainerPort> {
    let mut ports: Vec<ContainerPort> = Vec::new();
    for (name, binding) in &project.bindings {
        let port = binding_port(binding);
        if ports.iter().all(|p| p.port != port) {
            ports.push(ContainerPort::new(&name.to_lowercase(), port));
        }
    }

    if ports.is_empty() {
        ports.push(ContainerPort::new("http", DEFAULT_HTTP_PORT));
    }
    ports
}

#[derive(Debug, thiserror::Error)]
pub enum PopulateError {
    #[error(transparent)]
    Collision(#[from] CacheError),

    #[error(transparent)]
    Details(#[from] ContainerError),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no container details cached for project '{name}'; build attempted before populate")]
    MissingContainerDetails { name: String },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("container build for '{name}' did not finish within {after:?}")]
    TimedOut {
        name: String,
        after: Duration,
        source: tokio::time::error::Elapsed,
    },
}
