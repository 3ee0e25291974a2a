use std::path::{Path, PathBuf};
use std::time::Duration;

use manifold_core::ManifoldConfig;
use manifold_host::DotnetClient;
use manifold_k8s::{
    ImageStatus, Pipeline, PipelineOptions, PipelineOutcome, ProcessorRegistry, ResourceReport,
    ResourceSelector, ResourceStatus, SelectAll, SelectNamed,
};

use super::select::InteractiveSelector;

/// Flags for `manifold generate`. Anything unset falls back to manifold.toml.
pub struct GenerateArgs {
    pub project_path: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub non_interactive: bool,
    pub resources: Vec<String>,
    pub skip_build: bool,
}

pub async fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let config = ManifoldConfig::load(Path::new("."))?;
    let client = DotnetClient::new().with_container_config(&config.container);

    // The app host is only run when no manifest was supplied. Container
    // tooling is checked by the pipeline once projects are selected.
    if args.manifest.is_none() {
        let version = client.check_prerequisites().await?;
        println!("Using dotnet SDK {version}");
    }

    let options = PipelineOptions {
        app_host: args
            .project_path
            .unwrap_or_else(|| config.project.app_host.clone()),
        manifest_path: args.manifest,
        output_path: args
            .output_path
            .unwrap_or_else(|| config.project.output_path.clone()),
        skip_build: args.skip_build,
        build_timeout: config.container.build_timeout_secs.map(Duration::from_secs),
        deploy: config.deploy.clone(),
    };

    let selector: Box<dyn ResourceSelector> = if !args.resources.is_empty() {
        Box::new(SelectNamed::new(args.resources))
    } else if args.non_interactive {
        Box::new(SelectAll)
    } else {
        Box::new(InteractiveSelector)
    };

    let pipeline = Pipeline::new(ProcessorRegistry::with_defaults(&config), options);
    let outcome = pipeline.run(&client, &client, selector.as_ref()).await?;

    print_outcome(&outcome);

    let failed = outcome.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} resource(s) did not complete, see above for details");
    }
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!();
    println!("Manifest: {}", outcome.manifest_path.display());

    if outcome.resources.is_empty() {
        println!("No resources selected.");
    }
    for report in &outcome.resources {
        println!("  {}", describe(report));
    }

    println!();
    println!(
        "Aggregate: {} ({} resource(s))",
        outcome.aggregate_path.display(),
        outcome.aggregate.len()
    );
    if let Some(dir) = outcome.aggregate_path.parent() {
        println!("Apply with: kubectl apply -k {}", dir.display());
    }
}

fn describe(report: &ResourceReport) -> String {
    let kind = match report.kind {
        Some(kind) => kind.to_string(),
        None => "untyped".to_owned(),
    };
    let status = match &report.status {
        ResourceStatus::Generated { files } => format!("generated {files} file(s)"),
        ResourceStatus::Skipped { reason } => format!("skipped: {reason}"),
        ResourceStatus::Failed { reason } => format!("FAILED: {reason}"),
    };
    let image = match &report.image {
        Some(ImageStatus::Pushed { image }) => format!(", pushed {image}"),
        Some(ImageStatus::NotBuilt { image }) => format!(", image {image} not built"),
        Some(ImageStatus::Failed { image, reason }) => {
            format!(", image {image} FAILED: {reason}")
        }
        Some(ImageStatus::Unresolved { .. }) | None => String::new(),
    };
    format!("{:<24} {:<22} {status}{image}", report.name, kind)
}
