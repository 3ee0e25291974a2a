//! Kubernetes artifact generation for application manifests.
//!
//! # Pipeline
//!
//! ```text
//! manifold generate
//!   1. Acquire   ── dotnet run --project <apphost> -- --publisher manifest
//!   2. Select    ── all, --resource names, or interactive multi-select
//!   3. Populate  ── ContainerBuilder::container_details for every project
//!   4. Build     ── ContainerBuilder::build_and_push for every project
//!   5. Generate  ── Processor::create_manifests per selected resource
//!   6. Aggregate ── FinalProcessor writes <output>/kustomization.yml
//! ```
//!
//! # Output layout
//!
//! ```text
//! <output>/
//!   kustomization.yml        lists every generated non-database resource
//!   <resource>/
//!     deployment.yml         (job.yml for databases)
//!     service.yml
//!     kustomization.yml      lists the files above, plus a <resource>-env ConfigMap
//! ```
//!
//! Each `<resource>/` directory is removed and recreated on every run.

pub mod connection;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod templates;

pub use output::OutputError;
pub use pipeline::{
    ImageStatus, Pipeline, PipelineError, PipelineOptions, PipelineOutcome, ResourceReport,
    ResourceSelector, ResourceStatus, SelectAll, SelectError, SelectNamed,
};
pub use processor::{
    FinalManifestCollection, FinalProcessor, ProcessContext, ProcessError, Processor,
    ProjectProcessor,
};
pub use registry::{ProcessorRegistry, RegistryError};
