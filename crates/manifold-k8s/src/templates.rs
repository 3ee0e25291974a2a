//! Kubernetes and kustomize documents.
//!
//! Each document is a plain serializable struct; [`Artifact::yaml`]
//! turns it into file content with `serde_yaml`.
//!
//! [`Artifact::yaml`]: crate::output::Artifact::yaml

use std::collections::BTreeMap;

use serde::Serialize;

/// Name of the kustomization file written into every resource directory
/// and the output root.
pub const KUSTOMIZATION_FILE: &str = "kustomization.yml";

/// Creates the database on its server unless it already exists.
///
/// Host, user and password reach `psql` through the libpq environment and
/// the database name through `DATABASE_NAME`; psql's `:'db'` and `:"db"`
/// interpolation quote it as a literal and an identifier.
const CREATE_DATABASE_SCRIPT: &str = r#"until pg_isready; do sleep 2; done
echo "SELECT 1 FROM pg_database WHERE datname = :'db'" \
  | psql -v db="$DATABASE_NAME" -tA | grep -q 1 \
  || echo "CREATE DATABASE :\"db\"" | psql -v db="$DATABASE_NAME"
"#;

/// A named container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPort {
    pub name: String,
    pub port: u16,
}

impl ContainerPort {
    pub fn new(name: &str, port: u16) -> Self {
        Self {
            name: name.to_owned(),
            port,
        }
    }
}

// ── Documents ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSpec {
    pub replicas: u32,
    pub selector: LabelSelector,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectLabels>,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectLabels {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<&'static str>,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<NamedContainerPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedContainerPort {
    pub name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvFromSource {
    pub config_map_ref: NameRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSpec {
    #[serde(rename = "type")]
    pub service_type: &'static str,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub backoff_limit: u32,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub resources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_map_generator: Vec<ConfigMapGenerator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigMapGenerator {
    pub name: String,
    pub literals: Vec<String>,
}

impl Kustomization {
    /// Kustomization listing `resources` in order.
    pub fn new(resources: Vec<String>) -> Self {
        Self {
            api_version: "kustomize.config.k8s.io/v1beta1",
            kind: "Kustomization",
            resources,
            config_map_generator: Vec::new(),
        }
    }

    /// Generate ConfigMap `name` from `literals`. Nothing is added when
    /// `literals` is empty.
    pub fn with_config_map(mut self, name: &str, literals: &[(String, String)]) -> Self {
        if !literals.is_empty() {
            self.config_map_generator.push(ConfigMapGenerator {
                name: name.to_owned(),
                literals: literals.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            });
        }
        self
    }
}

fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_owned(), name.to_owned())])
}

// ── Workloads ──

/// Single-container workload rendered as a Deployment and a ClusterIP Service.
#[derive(Debug, Clone)]
pub struct Workload<'a> {
    pub name: &'a str,
    pub image: &'a str,
    pub replicas: u32,
    pub ports: &'a [ContainerPort],
    /// ConfigMap injected with `envFrom`, usually produced by the
    /// resource's kustomization `configMapGenerator`.
    pub env_config_map: Option<&'a str>,
}

impl Workload<'_> {
    pub fn deployment(&self) -> Deployment {
        let container = Container {
            name: self.name.to_owned(),
            image: self.image.to_owned(),
            image_pull_policy: Some("IfNotPresent"),
            command: Vec::new(),
            args: Vec::new(),
            ports: self
                .ports
                .iter()
                .map(|p| NamedContainerPort {
                    name: p.name.clone(),
                    container_port: p.port,
                })
                .collect(),
            env: Vec::new(),
            env_from: self
                .env_config_map
                .map(|name| EnvFromSource {
                    config_map_ref: NameRef {
                        name: name.to_owned(),
                    },
                })
                .into_iter()
                .collect(),
        };

        Deployment {
            api_version: "apps/v1",
            kind: "Deployment",
            metadata: ObjectMeta {
                name: self.name.to_owned(),
                labels: app_labels(self.name),
            },
            spec: DeploymentSpec {
                replicas: self.replicas,
                selector: LabelSelector {
                    match_labels: app_labels(self.name),
                },
                template: PodTemplate {
                    metadata: Some(ObjectLabels {
                        labels: app_labels(self.name),
                    }),
                    spec: PodSpec {
                        restart_policy: None,
                        containers: vec![container],
                    },
                },
            },
        }
    }

    pub fn service(&self) -> Service {
        Service {
            api_version: "v1",
            kind: "Service",
            metadata: ObjectMeta {
                name: self.name.to_owned(),
                labels: BTreeMap::new(),
            },
            spec: ServiceSpec {
                service_type: "ClusterIP",
                selector: app_labels(self.name),
                ports: self
                    .ports
                    .iter()
                    .map(|p| ServicePort {
                        name: p.name.clone(),
                        port: p.port,
                        target_port: p.port,
                    })
                    .collect(),
            },
        }
    }
}

/// One-shot Job that creates a database on its parent server if missing.
#[derive(Debug, Clone)]
pub struct DatabaseJob<'a> {
    pub database: &'a str,
    pub server: &'a str,
    pub image: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

impl DatabaseJob<'_> {
    pub fn job(&self) -> Job {
        let env = [
            ("PGHOST", self.server),
            ("PGUSER", self.user),
            ("PGPASSWORD", self.password),
            ("DATABASE_NAME", self.database),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_owned(),
            value: value.to_owned(),
        })
        .collect();

        let mut labels = app_labels(self.database);
        labels.insert("server".to_owned(), self.server.to_owned());

        Job {
            api_version: "batch/v1",
            kind: "Job",
            metadata: ObjectMeta {
                name: format!("{}-create", self.database),
                labels,
            },
            spec: JobSpec {
                backoff_limit: 10,
                template: PodTemplate {
                    metadata: None,
                    spec: PodSpec {
                        restart_policy: Some("OnFailure"),
                        containers: vec![Container {
                            name: "create-database".to_owned(),
                            image: self.image.to_owned(),
                            image_pull_policy: None,
                            command: vec!["sh".to_owned(), "-c".to_owned()],
                            args: vec![CREATE_DATABASE_SCRIPT.to_owned()],
                            ports: Vec::new(),
                            env,
                            env_from: Vec::new(),
                        }],
                    },
                },
            },
        }
    }
}
