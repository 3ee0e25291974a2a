use std::collections::HashMap;
use std::sync::Arc;

use manifold_core::{ManifoldConfig, ResourceKind};

use crate::processor::{
    PostgresDatabaseProcessor, PostgresServerProcessor, Processor, ProjectProcessor,
    RabbitMqProcessor, RedisProcessor,
};

/// Processors keyed by the resource kind they handle.
///
/// The project processor lives in its own typed slot because the pipeline
/// also drives it for image population and build/push; [`resolve`] serves
/// `ResourceKind::Project` from that slot. `ResourceKind::Final` is never
/// registered; the aggregate is owned by the pipeline.
///
/// [`resolve`]: Self::resolve
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<ResourceKind, Arc<dyn Processor>>,
    project: Option<Arc<ProjectProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One processor per supported kind, configured from `[images]` and
    /// `[deploy]`.
    pub fn with_defaults(config: &ManifoldConfig) -> Self {
        let replicas = config.deploy.replicas;
        let images = &config.images;

        let mut registry = Self::new();
        registry.register_project(ProjectProcessor::new(replicas));
        registry.insert(Arc::new(PostgresServerProcessor::new(
            images.postgres.as_str(),
            replicas,
        )));
        registry.insert(Arc::new(PostgresDatabaseProcessor::new(
            images.postgres.as_str(),
        )));
        registry.insert(Arc::new(RedisProcessor::new(images.redis.as_str(), replicas)));
        registry.insert(Arc::new(RabbitMqProcessor::new(
            images.rabbitmq.as_str(),
            replicas,
        )));
        registry
    }

    /// Register `processor` under its own kind, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Project processors go through [`register_project`](Self::register_project),
    /// and the aggregate kind cannot be registered at all.
    pub fn register(&mut self, processor: Arc<dyn Processor>) -> Result<(), RegistryError> {
        match processor.kind() {
            ResourceKind::Project => Err(RegistryError::ProjectKind),
            ResourceKind::Final => Err(RegistryError::FinalKind),
            _ => {
                self.insert(processor);
                Ok(())
            }
        }
    }

    /// Register the project processor, replacing any previous one.
    pub fn register_project(&mut self, processor: ProjectProcessor) {
        tracing::debug!(kind = %ResourceKind::Project, "registering processor");
        if self.project.replace(Arc::new(processor)).is_some() {
            tracing::debug!(kind = %ResourceKind::Project, "replaced existing processor");
        }
    }

    fn insert(&mut self, processor: Arc<dyn Processor>) {
        let kind = processor.kind();
        tracing::debug!(%kind, "registering processor");
        if self.processors.insert(kind, processor).is_some() {
            tracing::debug!(%kind, "replaced existing processor");
        }
    }

    pub fn resolve(&self, kind: ResourceKind) -> Option<&dyn Processor> {
        match kind {
            ResourceKind::Project => self.project.as_deref().map(|p| p as &dyn Processor),
            _ => self.processors.get(&kind).map(|p| p.as_ref()),
        }
    }

    pub fn project(&self) -> Option<&ProjectProcessor> {
        self.project.as_deref()
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.resolve(kind).is_some()
    }

    pub fn len(&self) -> usize {
        self.processors.len() + usize::from(self.project.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("project processors must be registered with register_project")]
    ProjectKind,

    #[error("the aggregate is generated by the pipeline and takes no processor")]
    FinalKind,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.processors.keys().collect();
        if self.project.is_some() {
            kinds.push(&ResourceKind::Project);
        }
        kinds.sort();
        f.debug_struct("ProcessorRegistry")
            .field("processors", &kinds)
            .finish()
    }
}
