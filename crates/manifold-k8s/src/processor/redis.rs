use std::path::PathBuf;

use manifold_core::{ResourceDescriptor, ResourceKind};

use super::{ProcessContext, ProcessError, Processor, output_error, unexpected, workload_artifacts};
use crate::connection::REDIS_PORT;
use crate::output::{self, ArtifactSet};
use crate::templates::{ContainerPort, Workload};

/// Processes `redis.v0` resources.
#[derive(Debug, Clone)]
pub struct RedisProcessor {
    image: String,
    replicas: u32,
}

impl RedisProcessor {
    pub fn new(image: impl Into<String>, replicas: u32) -> Self {
        Self {
            image: image.into(),
            replicas,
        }
    }
}

impl Processor for RedisProcessor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Redis
    }

    fn create_manifests(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        if !matches!(resource, ResourceDescriptor::Redis(_)) {
            return Err(unexpected(name, ResourceKind::Redis));
        }

        let ports = [ContainerPort::new("redis", REDIS_PORT)];
        let workload = Workload {
            name,
            image: &self.image,
            replicas: self.replicas,
            ports: &ports,
            env_config_map: None,
        };

        let set = ArtifactSet {
            env: Vec::new(),
            artifacts: workload_artifacts(&workload).map_err(output_error(name))?,
        };
        output::write_resource(ctx.output_path, name, &set).map_err(output_error(name))
    }
}
