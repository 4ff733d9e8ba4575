//! Locator CLI - Main entry point

mod manifest;

use anyhow::Context;
use clap::{Parser, Subcommand};
use locator_core::{ActivatorHost, ActivatorState, ServiceRegistryFacade};
use locator_foundation::RegistryConfig;
use manifest::{named_capability, Manifest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Locator - ranked service registry console
#[derive(Parser, Debug)]
#[command(name = "locator")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Registry config file (default: global + project registry.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register the manifest's services and print each capability's ranking
    Resolve {
        /// Service manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Also install the manifest's activators and report their state
    Check {
        /// Service manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Resolve { manifest } => resolve_cmd(config, &manifest),
        Command::Check { manifest } => check_cmd(config, &manifest).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RegistryConfig> {
    match path {
        Some(path) => RegistryConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RegistryConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}", e);
            RegistryConfig::default()
        })),
    }
}

fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    Manifest::load(path).with_context(|| format!("Failed to load manifest {}", path.display()))
}

fn resolve_cmd(config: RegistryConfig, path: &Path) -> anyhow::Result<()> {
    let manifest = load_manifest(path)?;
    let facade = ServiceRegistryFacade::new(config);
    manifest.register_services(&facade);

    print_ranking(&facade, &manifest);
    Ok(())
}

async fn check_cmd(config: RegistryConfig, path: &Path) -> anyhow::Result<()> {
    let manifest = load_manifest(path)?;
    let facade = Arc::new(ServiceRegistryFacade::new(config));
    let host = Arc::new(ActivatorHost::new(Arc::clone(&facade)));

    // 액티베이터를 먼저 설치하고, 서비스 등록은 watch가 따라가게 한다
    for activator in manifest.activators() {
        host.install(Arc::new(activator))?;
    }
    let watcher = host.watch();

    manifest.register_services(&facade);
    host.refresh();

    print_ranking(&facade, &manifest);

    println!("\nActivators\n");
    println!("{:<24} {:<24} {}", "Name", "State", "Missing");
    println!("{}", "-".repeat(72));

    let mut inactive = 0;
    for (name, state) in host.states() {
        let missing = host
            .missing_for(&name)
            .unwrap_or_default()
            .iter()
            .map(|id| id.name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if state != ActivatorState::Active {
            inactive += 1;
        }
        println!("{:<24} {:<24} {}", name, state.to_string(), missing);
    }

    host.shutdown();
    watcher.await?;

    if inactive > 0 {
        anyhow::bail!("{} activator(s) not active", inactive);
    }
    Ok(())
}

fn print_ranking(facade: &ServiceRegistryFacade, manifest: &Manifest) {
    println!("\nServices\n");
    println!(
        "{:<24} {:<6} {:>6} {:>6}  {:<14} {}",
        "Capability", "Best", "Rank", "Order", "Registered", "Name"
    );
    println!("{}", "-".repeat(80));

    for capability in manifest.capability_names() {
        let snapshot = facade.current(&named_capability(capability));
        if snapshot.is_empty() {
            println!(
                "{:<24} {:<6} {:>6} {:>6}  {:<14} {}",
                capability, "-", "-", "-", "-", "(none)"
            );
            continue;
        }

        for (pos, entry) in snapshot.entries().iter().enumerate() {
            let marker = if pos == 0 { "*" } else { "" };
            println!(
                "{:<24} {:<6} {:>6} {:>6}  {:<14} {}",
                if pos == 0 { capability } else { "" },
                marker,
                entry.rank(),
                entry.order(),
                entry.registered_at().format("%H:%M:%S%.3f").to_string(),
                entry.label().unwrap_or(&entry.instance().name)
            );
        }
    }
}
