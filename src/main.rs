//! block-hub - build and inspect block demo pages from a content store

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use block_hub::config::HubConfig;
use block_hub::core::DependencyRegistry;
use block_hub::runtime::{PageBuildScheduler, PageError};
use block_hub::store::{CatalogReader, FsContentStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// block-hub - block catalog and page builder
#[derive(Parser, Debug)]
#[command(name = "block-hub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Content store root, overriding the configuration
    #[arg(long)]
    root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the block catalog
    #[command(alias = "ls")]
    Catalog,

    /// Build one page, e.g. `/@hash/blocks/code`
    Build {
        /// Request path
        route: String,
    },

    /// Build every catalog page and report failures
    Prebuild,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HubConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => HubConfig::default(),
    };
    if let Some(root) = cli.root {
        config.content_root = root;
    }

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let store = Arc::new(
        FsContentStore::new(&config.content_root).context("failed to open content store")?,
    );
    tracing::debug!(root = %config.content_root.display(), "using content store");

    match cli.command {
        Commands::Catalog => {
            let catalog = CatalogReader::with_metadata_file(store, config.metadata_file.as_str())
                .discover_all()
                .context("failed to read catalog")?;
            print_json(&catalog)
        }
        Commands::Build { route } => {
            let scheduler = PageBuildScheduler::new(
                store,
                DependencyRegistry::standard(),
                config.scheduler_config(),
            );
            match scheduler.request(&route).await {
                Ok(bundle) => print_json(&*bundle),
                Err(PageError::NotFound(path)) => bail!("no block page at {}", path),
                Err(error) => Err(error).with_context(|| format!("failed to build {}", route)),
            }
        }
        Commands::Prebuild => {
            let scheduler = PageBuildScheduler::new(
                store,
                DependencyRegistry::standard(),
                config.scheduler_config(),
            );
            let report = scheduler.prebuild().await.context("failed to read catalog")?;
            print_json(&report)?;
            if !report.failed.is_empty() {
                bail!("{} block(s) failed to build", report.failed.len());
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
