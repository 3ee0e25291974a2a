mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "manifold", about = "Generate Kubernetes manifests from .NET Aspire app hosts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default manifold.toml in the current directory
    Init,
    /// Build project images and generate Kubernetes manifests
    Generate {
        /// App host project directory (overrides [project].app_host)
        #[arg(long, short = 'p')]
        project_path: Option<PathBuf>,
        /// Use an existing manifest instead of running the app host
        #[arg(long, short = 'm')]
        manifest: Option<PathBuf>,
        /// Output directory (overrides [project].output_path)
        #[arg(long, short = 'o')]
        output_path: Option<PathBuf>,
        /// Process every resource without prompting
        #[arg(long)]
        non_interactive: bool,
        /// Process only these resources, in this order (repeatable)
        #[arg(long = "resource", short = 'r', value_name = "NAME")]
        resources: Vec<String>,
        /// Resolve image names but do not build or push images
        #[arg(long)]
        skip_build: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init_project().await?,
        Commands::Generate {
            project_path,
            manifest,
            output_path,
            non_interactive,
            resources,
            skip_build,
        } => {
            commands::generate(commands::GenerateArgs {
                project_path,
                manifest,
                output_path,
                non_interactive,
                resources,
                skip_build,
            })
            .await?
        }
    }

    Ok(())
}
