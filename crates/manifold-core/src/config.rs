use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the per-project configuration.
pub const CONFIG_FILE: &str = "manifold.toml";

/// manifold.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifoldConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory containing the application host project
    #[serde(default = "default_app_host")]
    pub app_host: PathBuf,
    /// Directory that receives the generated kustomize tree
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Registry to push project images to. Overrides the project's own
    /// `ContainerRegistry` property when set.
    pub registry: Option<String>,
    /// Image tag. Overrides the project's `ContainerImageTag` when set.
    pub tag: Option<String>,
    /// Upper bound for a single image build/push, in seconds.
    /// No bound when omitted.
    pub build_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_postgres_image")]
    pub postgres: String,
    #[serde(default = "default_redis_image")]
    pub redis: String,
    #[serde(default = "default_rabbitmq_image")]
    pub rabbitmq: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Replica count for every generated Deployment
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,
    #[serde(default = "default_rabbitmq_user")]
    pub rabbitmq_user: String,
    #[serde(default = "default_rabbitmq_password")]
    pub rabbitmq_password: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            app_host: default_app_host(),
            output_path: default_output_path(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            postgres: default_postgres_image(),
            redis: default_redis_image(),
            rabbitmq: default_rabbitmq_image(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            postgres_user: default_postgres_user(),
            postgres_password: default_postgres_password(),
            rabbitmq_user: default_rabbitmq_user(),
            rabbitmq_password: default_rabbitmq_password(),
        }
    }
}

impl ManifoldConfig {
    /// Load from manifold.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading config");
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

fn default_app_host() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("manifold-output")
}

fn default_postgres_image() -> String {
    "postgres:16".to_owned()
}

fn default_redis_image() -> String {
    "redis:7".to_owned()
}

fn default_rabbitmq_image() -> String {
    "rabbitmq:3-management".to_owned()
}

fn default_replicas() -> u32 {
    1
}

fn default_postgres_user() -> String {
    "postgres".to_owned()
}

fn default_postgres_password() -> String {
    "postgres".to_owned()
}

fn default_rabbitmq_user() -> String {
    "manifold".to_owned()
}

fn default_rabbitmq_password() -> String {
    "manifold".to_owned()
}
