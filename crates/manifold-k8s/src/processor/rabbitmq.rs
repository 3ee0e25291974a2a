use std::path::PathBuf;

use manifold_core::{ResourceDescriptor, ResourceKind};

use super::{ProcessContext, ProcessError, Processor, output_error, unexpected, workload_artifacts};
use crate::connection::{RABBITMQ_MANAGEMENT_PORT, RABBITMQ_PORT};
use crate::output::{self, ArtifactSet, env_config_map_name};
use crate::templates::{ContainerPort, Workload};

/// Processes `rabbitmq.server.v0` resources. The broker's default user
/// is taken from `[deploy]`.
#[derive(Debug, Clone)]
pub struct RabbitMqProcessor {
    image: String,
    replicas: u32,
}

impl RabbitMqProcessor {
    pub fn new(image: impl Into<String>, replicas: u32) -> Self {
        Self {
            image: image.into(),
            replicas,
        }
    }
}

impl Processor for RabbitMqProcessor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RabbitMq
    }

    fn create_manifests(
        &self,
        name: &str,
        resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        if !matches!(resource, ResourceDescriptor::RabbitMq(_)) {
            return Err(unexpected(name, ResourceKind::RabbitMq));
        }

        let ports = [
            ContainerPort::new("amqp", RABBITMQ_PORT),
            ContainerPort::new("management", RABBITMQ_MANAGEMENT_PORT),
        ];
        let config_map = env_config_map_name(name);
        let workload = Workload {
            name,
            image: &self.image,
            replicas: self.replicas,
            ports: &ports,
            env_config_map: Some(&config_map),
        };

        let set = ArtifactSet {
            env: vec![
                (
                    "RABBITMQ_DEFAULT_USER".to_owned(),
                    ctx.deploy.rabbitmq_user.clone(),
                ),
                (
                    "RABBITMQ_DEFAULT_PASS".to_owned(),
                    ctx.deploy.rabbitmq_password.clone(),
                ),
            ],
            artifacts: workload_artifacts(&workload).map_err(output_error(name))?,
        };
        output::write_resource(ctx.output_path, name, &set).map_err(output_error(name))
    }
}
