//! icepick CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use icepick_cli::cmd;
use icepick_core::BuildConfig;
use icepick_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Build {
            root,
            entry,
            modules_dir,
            packages_dir,
            output,
            esbuild,
        } => {
            let config = BuildConfig {
                root,
                entry,
                modules_dir,
                packages_dir,
                output,
                esbuild,
            };
            cmd::build::build(&config, quiet).await
        }
        Commands::Inspect { artifact } => cmd::inspect::inspect(&artifact),
        Commands::Plan {
            artifact,
            residents,
        } => cmd::plan::plan(&artifact, &residents),
        Commands::Load { urls, base } => cmd::load::load(&urls, base.as_deref(), quiet).await,
    }
}
