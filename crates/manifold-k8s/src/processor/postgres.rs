use std::collections::BTreeMap;
use std::path::PathBuf;

use manifold_core::{ResourceDescriptor, ResourceKind};

use super::{ProcessContext, ProcessError, Processor, output_error, unexpected, workload_artifacts};
use crate::connection::{POSTGRES_PORT, resolve_env};
use crate::output::{self, Artifact, ArtifactSet, env_config_map_name};
use crate::templates::{ContainerPort, DatabaseJob, Workload};

/// Processes `postgres.server.v0` resources into a Deployment and Service.
///
/// The server's credentials always come from `[deploy]` so that the
/// connection strings handed to projects match; any `POSTGRES_USER` or
/// `POSTGRES_PASSWORD` in the manifest entry is overridden.
#[derive(Debug, Clone)]
pub struct PostgresServerProcessor {
    image: String,
    replicas: u32,
}

impl PostgresServerProcessor {
    pub fn new(image: impl Into<String>, replicas: u32) -> Self {
        Self {
            image: image.into(),
            replicas,
        }
    }
}

impl Processor for PostgresServerProcessor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PostgresServer
    }

    fn create_manifests(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        let ResourceDescriptor::PostgresServer(server) = resource else {
            return Err(unexpected(name, ResourceKind::PostgresServer));
        };

        let mut env: BTreeMap<String, String> = resolve_env(&server.env, ctx.manifest, ctx.deploy)
            .into_iter()
            .collect();
        env.insert("POSTGRES_USER".to_owned(), ctx.deploy.postgres_user.clone());
        env.insert(
            "POSTGRES_PASSWORD".to_owned(),
            ctx.deploy.postgres_password.clone(),
        );

        let ports = [ContainerPort::new("postgres", POSTGRES_PORT)];
        let config_map = env_config_map_name(name);
        let workload = Workload {
            name,
            image: &self.image,
            replicas: self.replicas,
            ports: &ports,
            env_config_map: Some(&config_map),
        };

        let set = ArtifactSet {
            env: env.into_iter().collect(),
            artifacts: workload_artifacts(&workload).map_err(output_error(name))?,
        };
        output::write_resource(ctx.output_path, name, &set).map_err(output_error(name))
    }
}

/// Processes `postgres.database.v0` resources.
///
/// A database has no workload of its own; it becomes a Job that creates
/// it on the parent server.
#[derive(Debug, Clone)]
pub struct PostgresDatabaseProcessor {
    image: String,
}

impl PostgresDatabaseProcessor {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl Processor for PostgresDatabaseProcessor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PostgresDatabase
    }

    fn create_manifests(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        let ResourceDescriptor::PostgresDatabase(database) = resource else {
            return Err(unexpected(name, ResourceKind::PostgresDatabase));
        };

        let job = DatabaseJob {
            database: name,
            server: &database.parent,
            image: &self.image,
            user: &ctx.deploy.postgres_user,
            password: &ctx.deploy.postgres_password,
        };

        let job = Artifact::yaml("job.yml", &job.job()).map_err(output_error(name))?;
        let set = ArtifactSet {
            env: Vec::new(),
            artifacts: vec![job],
        };
        output::write_resource(ctx.output_path, name, &set).map_err(output_error(name))
    }
}
