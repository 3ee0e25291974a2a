use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use manifold_core::{
    AcquireError, ContainerBuilder, ContainerDetails, ContainerError, DeployConfig,
    ManifestBuilder, ManifoldConfig, ProjectResource, ResourceDescriptor, ResourceKind,
};
use manifold_k8s::pipeline::{
    ImageStatus, Pipeline, PipelineError, PipelineOptions, ResourceStatus, SelectAll, SelectNamed,
};
use manifold_k8s::processor::{ProcessContext, ProcessError, Processor, ProjectProcessor};
use manifold_k8s::registry::{ProcessorRegistry, RegistryError};
use mockall::{Sequence, mock};
use proptest::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

mock! {
    Builder {}

    impl ContainerBuilder for Builder {
        async fn container_details(
            &self,
            name: &str,
            project: &ProjectResource,
        ) -> Result<ContainerDetails, ContainerError>;

        async fn build_and_push(
            &self,
            name: &str,
            project: &ProjectResource,
            details: &ContainerDetails,
        ) -> Result<(), ContainerError>;
    }
}

mock! {
    Host {}

    impl ManifestBuilder for Host {
        async fn build_manifest(
            &self,
            app_host: &Path,
            output: &Path,
        ) -> Result<PathBuf, AcquireError>;
    }
}

/// Processor that records calls and fails for configured names.
struct RecordingProcessor {
    kind: ResourceKind,
    calls: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl Processor for RecordingProcessor {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn create_manifests(
        &self,
        name: &str,
        _resource: &ResourceDescriptor,
        _ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        self.calls.lock().unwrap().push(name.to_owned());
        if self.failing.contains(name) {
            return Err(ProcessError::UnexpectedDescriptor {
                name: name.to_owned(),
                expected: self.kind,
            });
        }
        Ok(Vec::new())
    }
}

// ── Helpers ──

fn write_manifest(dir: &Path, resources: Value) -> PathBuf {
    let path = dir.join("manifest.json");
    std::fs::write(&path, json!({ "resources": resources }).to_string()).unwrap();
    path
}

fn options(tmp: &TempDir, manifest: Option<PathBuf>) -> PipelineOptions {
    PipelineOptions {
        app_host: tmp.path().to_path_buf(),
        manifest_path: manifest,
        output_path: tmp.path().join("out"),
        skip_build: false,
        build_timeout: None,
        deploy: DeployConfig::default(),
    }
}

fn default_pipeline(options: PipelineOptions) -> Pipeline {
    Pipeline::new(
        ProcessorRegistry::with_defaults(&ManifoldConfig::default()),
        options,
    )
}

fn details(name: &str) -> ContainerDetails {
    ContainerDetails {
        registry: Some("ghcr.io/acme".to_owned()),
        repository: name.to_owned(),
        tag: "1.0".to_owned(),
    }
}

fn project_entry(path: &str) -> Value {
    json!({ "type": "project.v0", "path": path })
}

fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn yaml(path: impl AsRef<Path>) -> serde_yaml::Value {
    serde_yaml::from_str(&read(path)).unwrap()
}

/// Entries of a kustomization's `resources:` list.
fn listed_resources(path: impl AsRef<Path>) -> Vec<String> {
    yaml(path)["resources"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect()
}

/// Builder that resolves and builds every project successfully.
fn happy_builder() -> MockBuilder {
    let mut builder = MockBuilder::new();
    builder
        .expect_container_details()
        .returning(|name, _| Ok(details(name)));
    builder.expect_build_and_push().returning(|_, _, _| Ok(()));
    builder
}

// ── End to end ──

#[tokio::test]
async fn generates_full_topology() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "postgres": { "type": "postgres.server.v0" },
            "catalogdb": { "type": "postgres.database.v0", "parent": "postgres" },
            "cache": { "type": "redis.v0" },
            "messaging": { "type": "rabbitmq.server.v0" },
            "api": {
                "type": "project.v0",
                "path": "Api/Api.csproj",
                "env": {
                    "ConnectionStrings__catalogdb": "{catalogdb.connectionString}",
                    "ConnectionStrings__cache": "{cache.connectionString}"
                },
                "bindings": { "http": { "scheme": "http", "protocol": "tcp", "transport": "http" } }
            }
        }),
    );

    let mut builder = MockBuilder::new();
    builder
        .expect_container_details()
        .times(1)
        .withf(|name, project| name == "api" && project.path.ends_with("Api/Api.csproj"))
        .returning(|name, _| Ok(details(name)));
    builder
        .expect_build_and_push()
        .times(1)
        .withf(|name, _, details| name == "api" && details.full_image() == "ghcr.io/acme/api:1.0")
        .returning(|_, _, _| Ok(()));

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &builder, &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["postgres", "cache", "messaging", "api"]);
    assert!(outcome.is_success());

    let out = tmp.path().join("out");
    assert_eq!(
        listed_resources(out.join("kustomization.yml")),
        outcome.aggregate
    );

    let deployment = yaml(out.join("api/deployment.yml"));
    let container = &deployment["spec"]["template"]["spec"]["containers"][0];
    assert_eq!(container["image"], "ghcr.io/acme/api:1.0");
    assert_eq!(container["envFrom"][0]["configMapRef"]["name"], "api-env");

    let kustomization = yaml(out.join("api/kustomization.yml"));
    let literals: Vec<&str> = kustomization["configMapGenerator"][0]["literals"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(literals.contains(
        &"ConnectionStrings__catalogdb=\
          Host=postgres;Port=5432;Username=postgres;Password=postgres;Database=catalogdb"
    ));
    assert!(literals.contains(&"ConnectionStrings__cache=cache:6379"));

    assert!(out.join("catalogdb/job.yml").exists());
    assert!(out.join("messaging/service.yml").exists());

    let api = outcome.resources.iter().find(|r| r.name == "api").unwrap();
    assert_eq!(
        api.image,
        Some(ImageStatus::Pushed {
            image: "ghcr.io/acme/api:1.0".to_owned()
        })
    );
    assert_eq!(api.status, ResourceStatus::Generated { files: 3 });
    assert!(api.aggregated);
}

#[tokio::test]
async fn acquires_manifest_from_app_host() {
    let tmp = TempDir::new().unwrap();
    let app_host = tmp.path().to_path_buf();

    let mut host = MockHost::new();
    host.expect_build_manifest()
        .times(1)
        .withf(move |dir, output| dir == app_host && output == app_host.join("manifest.json"))
        .returning(|_, output| {
            let body = json!({ "resources": { "cache": { "type": "redis.v0" } } });
            std::fs::write(output, body.to_string()).unwrap();
            Ok(output.to_path_buf())
        });

    let pipeline = default_pipeline(options(&tmp, None));
    let outcome = pipeline
        .run(&host, &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.manifest_path, tmp.path().join("manifest.json"));
    assert_eq!(outcome.aggregate, vec!["cache"]);
}

#[tokio::test]
async fn acquisition_failure_aborts_run() {
    let tmp = TempDir::new().unwrap();
    let mut host = MockHost::new();
    host.expect_build_manifest().returning(|app_host, _| {
        Err(AcquireError {
            app_host: app_host.to_path_buf(),
            source: "dotnet run exited with code 1".into(),
        })
    });

    let pipeline = default_pipeline(options(&tmp, None));
    let result = pipeline.run(&host, &MockBuilder::new(), &SelectAll).await;

    assert!(matches!(result, Err(PipelineError::Acquire(_))));
    assert!(!tmp.path().join("out").exists());
}

#[tokio::test]
async fn unreadable_manifest_aborts_run() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("manifest.json");
    std::fs::write(&path, "not json").unwrap();

    let pipeline = default_pipeline(options(&tmp, Some(path)));
    let result = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await;

    assert!(matches!(result, Err(PipelineError::Manifest { .. })));
}

// ── Ordering ──

#[tokio::test]
async fn populate_runs_for_all_projects_before_any_build() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "a": project_entry("A/A.csproj"),
            "b": project_entry("B/B.csproj"),
        }),
    );

    let mut seq = Sequence::new();
    let mut builder = MockBuilder::new();
    for name in ["a", "b"] {
        builder
            .expect_container_details()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |n, _| n == name)
            .returning(|n, _| Ok(details(n)));
    }
    for name in ["a", "b"] {
        builder
            .expect_build_and_push()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |n, _, _| n == name)
            .returning(|_, _, _| Ok(()));
    }

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &builder, &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["a", "b"]);
}

#[tokio::test]
async fn selection_order_drives_aggregate_order() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "cache": { "type": "redis.v0" },
            "queue": { "type": "rabbitmq.server.v0" },
            "db": { "type": "postgres.server.v0" },
        }),
    );

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let selector = SelectNamed::new(["db", "missing", "cache", "db"]);
    let outcome = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &selector)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["db", "cache"]);
    assert_eq!(outcome.resources.len(), 2);
    assert!(!tmp.path().join("out/queue").exists());
}

// ── Aggregate membership ──

#[tokio::test]
async fn database_is_never_aggregated() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "pg": { "type": "postgres.server.v0" },
            "orders": { "type": "postgres.database.v0", "parent": "pg" },
            "api": project_entry("Api/Api.csproj"),
        }),
    );

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &happy_builder(), &SelectNamed::new(["orders", "api"]))
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["api"]);
    let orders = &outcome.resources[0];
    assert_eq!(orders.status, ResourceStatus::Generated { files: 2 });
    assert!(!orders.aggregated);
}

#[tokio::test]
async fn aggregate_file_matches_outcome_for_yaml_significant_names() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "cache #2": { "type": "redis.v0" },
            "q: x": { "type": "rabbitmq.server.v0" },
        }),
    );

    let outcome = default_pipeline(options(&tmp, Some(manifest)))
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["cache #2", "q: x"]);
    assert_eq!(listed_resources(&outcome.aggregate_path), outcome.aggregate);

    let deployment = yaml(tmp.path().join("out/cache #2/deployment.yml"));
    assert_eq!(deployment["metadata"]["name"], "cache #2");
    let service = yaml(tmp.path().join("out/q: x/service.yml"));
    assert_eq!(service["spec"]["selector"]["app"], "q: x");
}

#[tokio::test]
async fn empty_selection_produces_empty_aggregate() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({ "api": project_entry("Api/Api.csproj"), "cache": { "type": "redis.v0" } }),
    );

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(Arc::new(RecordingProcessor {
            kind: ResourceKind::Redis,
            calls: Arc::clone(&calls),
            failing: HashSet::new(),
        }))
        .unwrap();

    let pipeline = Pipeline::new(registry, options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(
            &MockHost::new(),
            &MockBuilder::new(),
            &SelectNamed::new(Vec::<String>::new()),
        )
        .await
        .unwrap();

    assert!(outcome.aggregate.is_empty());
    assert!(outcome.resources.is_empty());
    assert!(calls.lock().unwrap().is_empty());
    assert!(listed_resources(&outcome.aggregate_path).is_empty());
}

#[tokio::test]
async fn unsupported_kind_does_not_abort_later_resources() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "sidecar": { "type": "container.v0", "image": "nginx" },
            "mystery": { "value": 1 },
            "cache": { "type": "redis.v0" },
        }),
    );

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["cache"]);
    assert!(matches!(
        outcome.resources[0].status,
        ResourceStatus::Skipped { .. }
    ));
    assert!(matches!(
        outcome.resources[1].status,
        ResourceStatus::Skipped { .. }
    ));
    assert!(!tmp.path().join("out/sidecar").exists());
}

#[tokio::test]
async fn malformed_resource_fails_alone() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "orphan": { "type": "postgres.database.v0" },
            "cache": { "type": "redis.v0" },
        }),
    );

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["cache"]);
    assert!(matches!(
        outcome.resources[0].status,
        ResourceStatus::Failed { .. }
    ));
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn missing_processor_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({ "cache": { "type": "redis.v0" }, "queue": { "type": "rabbitmq.server.v0" } }),
    );

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(Arc::new(RecordingProcessor {
            kind: ResourceKind::RabbitMq,
            calls: Arc::clone(&calls),
            failing: HashSet::new(),
        }))
        .unwrap();

    let pipeline = Pipeline::new(registry, options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["queue"]);
    assert_eq!(*calls.lock().unwrap(), vec!["queue"]);
    assert_eq!(
        outcome.resources[0].status,
        ResourceStatus::Skipped {
            reason: "no processor registered for redis.v0".to_owned()
        }
    );
}

#[tokio::test]
async fn generation_failure_excludes_only_that_resource() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "a": { "type": "redis.v0" },
            "b": { "type": "redis.v0" },
            "c": { "type": "redis.v0" },
        }),
    );

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(Arc::new(RecordingProcessor {
            kind: ResourceKind::Redis,
            calls: Arc::clone(&calls),
            failing: HashSet::from(["b".to_owned()]),
        }))
        .unwrap();

    let pipeline = Pipeline::new(registry, options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(outcome.aggregate, vec!["a", "c"]);
    assert_eq!(outcome.failures().count(), 1);
}

// ── Container failures ──

#[tokio::test]
async fn build_failure_is_isolated() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "a": project_entry("A/A.csproj"),
            "b": project_entry("B/B.csproj"),
        }),
    );

    let mut builder = MockBuilder::new();
    builder
        .expect_container_details()
        .times(2)
        .returning(|name, _| Ok(details(name)));
    builder
        .expect_build_and_push()
        .times(1)
        .withf(|name, _, _| name == "a")
        .returning(|name, _, _| {
            Err(ContainerError::Build {
                name: name.to_owned(),
                source: "dotnet publish exited with code 1".into(),
            })
        });
    builder
        .expect_build_and_push()
        .times(1)
        .withf(|name, _, _| name == "b")
        .returning(|_, _, _| Ok(()));

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &builder, &SelectAll)
        .await
        .unwrap();

    let a = &outcome.resources[0];
    assert!(matches!(
        &a.image,
        Some(ImageStatus::Failed { image, reason })
            if image == "ghcr.io/acme/a:1.0" && reason.contains("exited with code 1")
    ));
    assert_eq!(a.status, ResourceStatus::Generated { files: 3 });
    assert_eq!(outcome.aggregate, vec!["a", "b"]);
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn details_failure_skips_project() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({
            "a": project_entry("A/A.csproj"),
            "b": project_entry("B/B.csproj"),
        }),
    );

    let mut builder = MockBuilder::new();
    builder
        .expect_container_details()
        .withf(|name, _| name == "a")
        .returning(|name, _| {
            Err(ContainerError::Details {
                name: name.to_owned(),
                source: "msbuild failed".into(),
            })
        });
    builder
        .expect_container_details()
        .withf(|name, _| name == "b")
        .returning(|name, _| Ok(details(name)));
    builder
        .expect_build_and_push()
        .times(1)
        .withf(|name, _, _| name == "b")
        .returning(|_, _, _| Ok(()));

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let outcome = pipeline
        .run(&MockHost::new(), &builder, &SelectAll)
        .await
        .unwrap();

    assert_eq!(outcome.aggregate, vec!["b"]);
    assert!(matches!(
        outcome.resources[0].image,
        Some(ImageStatus::Unresolved { .. })
    ));
    assert!(matches!(
        outcome.resources[0].status,
        ResourceStatus::Failed { .. }
    ));
    assert!(!tmp.path().join("out/a").exists());
}

/// Builder whose toolchain is missing; counts every call it receives.
#[derive(Default)]
struct UnavailableBuilder {
    calls: Mutex<Vec<&'static str>>,
}

impl ContainerBuilder for UnavailableBuilder {
    async fn check_available(&self) -> Result<(), ContainerError> {
        self.calls.lock().unwrap().push("check");
        Err(ContainerError::Unavailable {
            source: "dotnet: command not found".into(),
        })
    }

    async fn container_details(
        &self,
        _name: &str,
        _project: &ProjectResource,
    ) -> Result<ContainerDetails, ContainerError> {
        self.calls.lock().unwrap().push("details");
        unreachable!("details requested from an unavailable builder")
    }

    async fn build_and_push(
        &self,
        _name: &str,
        _project: &ProjectResource,
        _details: &ContainerDetails,
    ) -> Result<(), ContainerError> {
        self.calls.lock().unwrap().push("build");
        unreachable!("build requested from an unavailable builder")
    }
}

#[tokio::test]
async fn unavailable_builder_aborts_before_populate() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({ "api": project_entry("Api/Api.csproj"), "cache": { "type": "redis.v0" } }),
    );

    let builder = UnavailableBuilder::default();
    let mut opts = options(&tmp, Some(manifest));
    opts.skip_build = true;
    let result = default_pipeline(opts)
        .run(&MockHost::new(), &builder, &SelectAll)
        .await;

    assert!(matches!(result, Err(PipelineError::Builder { .. })));
    assert_eq!(*builder.calls.lock().unwrap(), vec!["check"]);
    assert!(!tmp.path().join("out/cache").exists());
}

#[tokio::test]
async fn builder_not_checked_without_selected_projects() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(
        tmp.path(),
        json!({ "api": project_entry("Api/Api.csproj"), "cache": { "type": "redis.v0" } }),
    );

    let builder = UnavailableBuilder::default();
    let outcome = default_pipeline(options(&tmp, Some(manifest)))
        .run(&MockHost::new(), &builder, &SelectNamed::new(["cache"]))
        .await
        .unwrap();

    assert!(builder.calls.lock().unwrap().is_empty());
    assert_eq!(outcome.aggregate, vec!["cache"]);
}

#[tokio::test]
async fn skip_build_still_populates() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(tmp.path(), json!({ "api": project_entry("Api/Api.csproj") }));

    let mut builder = MockBuilder::new();
    builder
        .expect_container_details()
        .times(1)
        .returning(|name, _| Ok(details(name)));
    builder.expect_build_and_push().never();

    let mut opts = options(&tmp, Some(manifest));
    opts.skip_build = true;
    let outcome = default_pipeline(opts)
        .run(&MockHost::new(), &builder, &SelectAll)
        .await
        .unwrap();

    assert_eq!(
        outcome.resources[0].image,
        Some(ImageStatus::NotBuilt {
            image: "ghcr.io/acme/api:1.0".to_owned()
        })
    );
    assert!(outcome.is_success());
    let deployment = yaml(tmp.path().join("out/api/deployment.yml"));
    assert_eq!(
        deployment["spec"]["template"]["spec"]["containers"][0]["image"],
        "ghcr.io/acme/api:1.0"
    );
}

/// Processor that needs cached container details for every resource.
struct DetailsConsumer;

impl Processor for DetailsConsumer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Redis
    }

    fn create_manifests(
        &self,
        name: &str,
        _resource: &ResourceDescriptor,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<PathBuf>, ProcessError> {
        match ctx.containers.get(name) {
            Some(_) => Ok(Vec::new()),
            None => Err(ProcessError::MissingContainerDetails {
                name: name.to_owned(),
            }),
        }
    }
}

#[tokio::test]
async fn missing_details_at_generation_is_contract_violation() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(tmp.path(), json!({ "cache": { "type": "redis.v0" } }));

    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(DetailsConsumer)).unwrap();

    let pipeline = Pipeline::new(registry, options(&tmp, Some(manifest)));
    let result = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::ContractViolation { name }) if name == "cache"
    ));
    assert!(!tmp.path().join("out/kustomization.yml").exists());
}

#[test]
fn project_processor_cannot_bypass_population() {
    let mut registry = ProcessorRegistry::new();
    assert!(matches!(
        registry.register(Arc::new(ProjectProcessor::new(1))),
        Err(RegistryError::ProjectKind)
    ));
    assert!(registry.project().is_none());
    assert!(registry.resolve(ResourceKind::Project).is_none());
}

// ── Idempotency ──

#[tokio::test]
async fn regeneration_replaces_stale_files() {
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(tmp.path(), json!({ "cache": { "type": "redis.v0" } }));

    let stale = tmp.path().join("out/cache/old-configmap.yml");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "kind: ConfigMap").unwrap();

    let pipeline = default_pipeline(options(&tmp, Some(manifest)));
    let first = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();
    let before = read(tmp.path().join("out/cache/deployment.yml"));
    let second = pipeline
        .run(&MockHost::new(), &MockBuilder::new(), &SelectAll)
        .await
        .unwrap();

    assert!(!stale.exists());
    assert_eq!(read(tmp.path().join("out/cache/deployment.yml")), before);
    assert_eq!(first.aggregate, second.aggregate);
}

// ── Properties ──

#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    Server,
    Database,
    Cache,
    Queue,
    Untyped,
    Unsupported,
}

impl Entry {
    fn json(self) -> Value {
        match self {
            Self::Server => json!({ "type": "postgres.server.v0" }),
            Self::Database => json!({ "type": "postgres.database.v0", "parent": "r0" }),
            Self::Cache => json!({ "type": "redis.v0" }),
            Self::Queue => json!({ "type": "rabbitmq.server.v0" }),
            Self::Untyped => json!({ "connectionString": "x" }),
            Self::Unsupported => json!({ "type": "container.v0" }),
        }
    }

    fn kind(self) -> Option<ResourceKind> {
        match self {
            Self::Server => Some(ResourceKind::PostgresServer),
            Self::Database => Some(ResourceKind::PostgresDatabase),
            Self::Cache => Some(ResourceKind::Redis),
            Self::Queue => Some(ResourceKind::RabbitMq),
            Self::Untyped | Self::Unsupported => None,
        }
    }
}

fn entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        Just(Entry::Server),
        Just(Entry::Database),
        Just(Entry::Cache),
        Just(Entry::Queue),
        Just(Entry::Untyped),
        Just(Entry::Unsupported),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn aggregate_holds_exactly_the_successful_non_database_selection(
        entries in prop::collection::vec(entry(), 0..8),
        picks in prop::collection::vec(0usize..10, 0..10),
        failing in prop::collection::hash_set(0usize..8, 0..3),
        without_cache_processor in any::<bool>(),
    ) {
        let tmp = TempDir::new().unwrap();
        let resources: serde_json::Map<String, Value> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (format!("r{i}"), e.json()))
            .collect();
        let manifest = write_manifest(tmp.path(), Value::Object(resources));

        let failing: HashSet<String> = failing.into_iter().map(|i| format!("r{i}")).collect();
        let mut registry = ProcessorRegistry::new();
        for kind in [
            ResourceKind::PostgresServer,
            ResourceKind::PostgresDatabase,
            ResourceKind::Redis,
            ResourceKind::RabbitMq,
        ] {
            if without_cache_processor && kind == ResourceKind::Redis {
                continue;
            }
            registry
                .register(Arc::new(RecordingProcessor {
                    kind,
                    calls: Arc::new(Mutex::new(Vec::new())),
                    failing: failing.clone(),
                }))
                .unwrap();
        }

        let requested: Vec<String> = picks.iter().map(|i| format!("r{i}")).collect();
        let mut expected: Vec<String> = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();
        for &i in &picks {
            if i >= entries.len() || !seen.insert(i) {
                continue;
            }
            let name = format!("r{i}");
            let Some(kind) = entries[i].kind() else { continue };
            let registered = !(without_cache_processor && kind == ResourceKind::Redis);
            if registered && !failing.contains(&name) && !kind.is_database() {
                expected.push(name);
            }
        }

        let pipeline = Pipeline::new(registry, options(&tmp, Some(manifest)));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let outcome = runtime
            .block_on(pipeline.run(
                &MockHost::new(),
                &MockBuilder::new(),
                &SelectNamed::new(requested),
            ))
            .unwrap();

        prop_assert_eq!(outcome.aggregate, expected);
    }
}
