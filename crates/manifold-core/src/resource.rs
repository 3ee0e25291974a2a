//! Typed representation of manifest entries.
//!
//! Each entry carries a `type` tag such as `project.v0`. Known tags map to a
//! [`ResourceKind`] and deserialize into a kind-specific payload; anything
//! else is kept as an explicit non-dispatchable variant so the pipeline can
//! report it per resource instead of failing the whole run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

/// Closed set of resource kinds manifold knows how to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Buildable project, deployed from a container image (`project.v0`)
    Project,
    /// Datastore server (`postgres.server.v0`)
    PostgresServer,
    /// Datastore database owned by a server (`postgres.database.v0`)
    PostgresDatabase,
    /// Cache (`redis.v0`)
    Redis,
    /// Queue (`rabbitmq.server.v0`)
    RabbitMq,
    /// Top-level aggregate (`final`)
    Final,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Project,
        ResourceKind::PostgresServer,
        ResourceKind::PostgresDatabase,
        ResourceKind::Redis,
        ResourceKind::RabbitMq,
        ResourceKind::Final,
    ];

    /// Manifest `type` tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            ResourceKind::Project => "project.v0",
            ResourceKind::PostgresServer => "postgres.server.v0",
            ResourceKind::PostgresDatabase => "postgres.database.v0",
            ResourceKind::Redis => "redis.v0",
            ResourceKind::RabbitMq => "rabbitmq.server.v0",
            ResourceKind::Final => "final",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Databases are owned by their server and never appear in the aggregate.
    pub fn is_database(self) -> bool {
        matches!(self, ResourceKind::PostgresDatabase)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A network endpoint exposed by a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Binding {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default, rename = "containerPort")]
    pub container_port: Option<u16>,
}

/// A deployable project (`project.v0`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectResource {
    /// Project file path. Relative paths are resolved against the manifest
    /// directory by [`Manifest::load`](crate::Manifest::load).
    pub path: PathBuf,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostgresServerResource {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostgresDatabaseResource {
    /// Name of the owning `postgres.server.v0` resource
    pub parent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RedisResource {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RabbitMqResource {}

/// One manifest entry, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    Project(ProjectResource),
    PostgresServer(PostgresServerResource),
    PostgresDatabase(PostgresDatabaseResource),
    Redis(RedisResource),
    RabbitMq(RabbitMqResource),
    Final,
    /// The `type` tag is not one manifold understands.
    Unsupported { kind: String },
    /// The entry has no `type` tag at all.
    Untyped,
    /// The tag is known but the entry's fields did not deserialize.
    Malformed { kind: ResourceKind, reason: String },
}

impl ResourceDescriptor {
    /// Build the typed variant for a raw manifest entry.
    pub fn from_entry(entry: &Value) -> Self {
        let Some(tag) = entry.get("type").and_then(Value::as_str) else {
            return Self::Untyped;
        };

        let Some(kind) = ResourceKind::from_tag(tag) else {
            return Self::Unsupported {
                kind: tag.to_owned(),
            };
        };

        let parsed = match kind {
            ResourceKind::Project => decode(entry).map(Self::Project),
            ResourceKind::PostgresServer => decode(entry).map(Self::PostgresServer),
            ResourceKind::PostgresDatabase => decode(entry).map(Self::PostgresDatabase),
            ResourceKind::Redis => decode(entry).map(Self::Redis),
            ResourceKind::RabbitMq => decode(entry).map(Self::RabbitMq),
            ResourceKind::Final => Ok(Self::Final),
        };

        parsed.unwrap_or_else(|e| Self::Malformed {
            kind,
            reason: e.to_string(),
        })
    }

    /// Kind of this resource, `None` for untyped and unsupported entries.
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Project(_) => Some(ResourceKind::Project),
            Self::PostgresServer(_) => Some(ResourceKind::PostgresServer),
            Self::PostgresDatabase(_) => Some(ResourceKind::PostgresDatabase),
            Self::Redis(_) => Some(ResourceKind::Redis),
            Self::RabbitMq(_) => Some(ResourceKind::RabbitMq),
            Self::Final => Some(ResourceKind::Final),
            Self::Malformed { kind, .. } => Some(*kind),
            Self::Unsupported { .. } | Self::Untyped => None,
        }
    }

    pub fn is_database(&self) -> bool {
        self.kind().is_some_and(ResourceKind::is_database)
    }

    pub fn as_project(&self) -> Option<&ProjectResource> {
        match self {
            Self::Project(p) => Some(p),
            _ => None,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(entry: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(entry)
}

fn default_scheme() -> String {
    "http".to_owned()
}

fn default_protocol() -> String {
    "tcp".to_owned()
}
