use std::path::Path;

use manifold_core::CONFIG_FILE;

const DEFAULT_CONFIG: &str = r#"[project]
# Directory containing the Aspire app host project
app_host = "."
output_path = "manifold-output"

[container]
# registry = "ghcr.io/your-org"
# tag = "latest"
# build_timeout_secs = 1800

[images]
# postgres = "postgres:16"
# redis = "redis:7"
# rabbitmq = "rabbitmq:3-management"

[deploy]
# replicas = 1
# postgres_user = "postgres"
# postgres_password = "postgres"
# rabbitmq_user = "manifold"
# rabbitmq_password = "manifold"
"#;

/// Write a commented manifold.toml into the current directory.
pub async fn init_project() -> anyhow::Result<()> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        eprintln!("{CONFIG_FILE} already exists, skipping");
        println!("Nothing to create, already initialized.");
        return Ok(());
    }

    std::fs::write(config_path, DEFAULT_CONFIG)?;
    println!("Created {CONFIG_FILE}");

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Point [project].app_host at your Aspire app host directory");
    println!();
    println!("  2. Set [container].registry to a registry your cluster can pull from");
    println!();
    println!("  3. Generate manifests:");
    println!("     manifold generate");
    println!();
    println!("  4. Apply them:");
    println!("     kubectl apply -k manifold-output");

    Ok(())
}
