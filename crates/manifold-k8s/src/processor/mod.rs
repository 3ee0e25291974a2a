//! Per-kind resource processors.
//!
//! A [`Processor`] turns one `(name, descriptor)` pair into a resource
//! directory under the output root. The project processor additionally
//! drives image discovery and publishing ([`ProjectProcessor`]), and the
//! [`FinalProcessor`] writes the top-level aggregate once every resource
//! has been attempted.

pub mod aggregate;
pub mod postgres;
pub mod project;
pub mod rabbitmq;
pub mod redis;

use std::path::{Path, PathBuf};

use manifold_core::{
    ContainerDetailsCache, DeployConfig, Manifest, ResourceDescriptor, ResourceKind,
};

use crate::output::{Artifact, OutputError};
use crate::templates::Workload;

pub use aggregate::{FinalManifestCollection, FinalProcessor};
pub use postgres::{PostgresDatabaseProcessor, PostgresServerProcessor};
pub use project::{BuildError, PopulateError, ProjectProcessor};
pub use rabbitmq::RabbitMqProcessor;
pub use redis::RedisProcessor;

/// Read-only state shared by every processor during manifest generation.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    pub output_path: &'a Path,
    pub manifest: &'a Manifest,
    pub containers: &'a ContainerDetailsCache,
    pub deploy: &'a DeployConfig,
}

/// Generates deployment artifacts for one resource kind.
pub trait Processor: Send + Sync {
    /// Kind this processor is registered under.
    fn kind(&self) -> ResourceKind;

    /// Write the resource directory for `name`, returning the files written.
    fn create_manifests(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(
        "no container details cached for project '{name}'; \
         details must be populated before manifests are generated"
    )]
    MissingContainerDetails { name: String },

    #[error("resource '{name}' is not a {expected} resource")]
    UnexpectedDescriptor { name: String, expected: ResourceKind },

    #[error("failed to write artifacts for '{name}'")]
    Output { name: String, source: OutputError },
}

pub(crate) fn unexpected(name: &str, expected: ResourceKind) -> ProcessError {
    ProcessError::UnexpectedDescriptor {
        name: name.to_owned(),
        expected,
    }
}

pub(crate) fn output_error(name: &str) -> impl FnOnce(OutputError) -> ProcessError + '_ {
    move |source| ProcessError::Output {
        name: name.to_owned(),
        source,
    }
}

/// `deployment.yml` and `service.yml` for a workload.
pub(crate) fn workload_artifacts(workload: &Workload<'_>) -> Result<Vec<Artifact>, OutputError> {
    Ok(vec![
        Artifact::yaml("deployment.yml", &workload.deployment())?,
        Artifact::yaml("service.yml", &workload.service())?,
    ])
}
