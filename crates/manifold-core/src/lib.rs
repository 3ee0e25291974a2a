//! Core types and configuration for manifold.
//!
//! This crate defines the `manifold.toml` schema ([`ManifoldConfig`]),
//! the application manifest model ([`Manifest`], [`ResourceDescriptor`]),
//! container image metadata ([`ContainerDetails`], [`ContainerDetailsCache`]),
//! the collaborator traits implemented by host tooling, and shared error types.

pub mod config;
pub mod container;
pub mod error;
pub mod manifest;
pub mod resource;

pub use config::{
    CONFIG_FILE, ContainerConfig, DeployConfig, ImageConfig, ManifoldConfig, ProjectConfig,
};
pub use container::{
    CacheError, ContainerBuilder, ContainerDetails, ContainerDetailsCache, ContainerError,
};
pub use error::{Error, Result};
pub use manifest::{AcquireError, Manifest, ManifestBuilder};
pub use resource::{
    Binding, PostgresDatabaseResource, PostgresServerResource, ProjectResource, RabbitMqResource,
    RedisResource, ResourceDescriptor, ResourceKind,
};
