//! In-cluster resolution of `{resource.*}` placeholders in project
//! environment values.
//!
//! Supported expressions:
//!
//! - `{name.connectionString}` for datastore, cache and queue resources
//! - `{name.bindings.<binding>.url|host|port}` for project resources
//!
//! Anything else is left untouched.

use std::collections::BTreeMap;

use manifold_core::{DeployConfig, Manifest, ResourceDescriptor};

use crate::processor::project::binding_port;

pub const POSTGRES_PORT: u16 = 5432;
pub const REDIS_PORT: u16 = 6379;
pub const RABBITMQ_PORT: u16 = 5672;
pub const RABBITMQ_MANAGEMENT_PORT: u16 = 15672;

/// Resolve placeholders in every value of `env`, keeping key order.
pub fn resolve_env(
    env: &BTreeMap<String, String>,
    manifest: &Manifest,
    deploy: &DeployConfig,
) -> Vec<(String, String)> {
    env.iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, manifest, deploy)))
        .collect()
}

/// Replace each resolvable `{...}` expression in `value`.
pub fn resolve_value(value: &str, manifest: &Manifest, deploy: &DeployConfig) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let Some(end) = candidate.find('}') else {
            out.push_str(candidate);
            return out;
        };

        let expression = &candidate[1..end];
        match resolve_expression(expression, manifest, deploy) {
            Some(resolved) => out.push_str(&resolved),
            None => {
                tracing::warn!(expression, "unresolved placeholder left as-is");
                out.push_str(&candidate[..=end]);
            }
        }
        rest = &candidate[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Connection string other workloads use to reach `name` inside the cluster.
pub fn connection_string(name: &str, manifest: &Manifest, deploy: &DeployConfig) -> Option<String> {
    match manifest.get(name)? {
        ResourceDescriptor::PostgresServer(_) => Some(postgres(name, None, deploy)),
        ResourceDescriptor::PostgresDatabase(db) => Some(postgres(&db.parent, Some(name), deploy)),
        ResourceDescriptor::Redis(_) => Some(format!("{name}:{REDIS_PORT}")),
        ResourceDescriptor::RabbitMq(_) => Some(format!(
            "amqp://{user}:{password}@{name}:{RABBITMQ_PORT}",
            user = deploy.rabbitmq_user,
            password = deploy.rabbitmq_password,
        )),
        _ => None,
    }
}

fn resolve_expression(
    expression: &str,
    manifest: &Manifest,
    deploy: &DeployConfig,
) -> Option<String> {
    let mut parts = expression.split('.');
    let resource = parts.next()?;

    match (parts.next()?, parts.next(), parts.next(), parts.next()) {
        ("connectionString", None, None, None) => connection_string(resource, manifest, deploy),
        ("bindings", Some(binding), Some(field), None) => {
            let project = manifest.get(resource)?.as_project()?;
            let binding_def = project.bindings.get(binding)?;
            let port = binding_port(binding_def);
            match field {
                "url" => Some(format!("{}://{resource}:{port}", binding_def.scheme)),
                "host" => Some(resource.to_owned()),
                "port" => Some(port.to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

fn postgres(server: &str, database: Option<&str>, deploy: &DeployConfig) -> String {
    let mut s = format!(
        "Host={server};Port={POSTGRES_PORT};Username={user};Password={password}",
        user = deploy.postgres_user,
        password = deploy.postgres_password,
    );
    if let Some(db) = database {
        s.push_str(&format!(";Database={db}"));
    }
    s
}
