//! gridwire - client protocol gateway for an in-memory data grid
//!
//! Loads configuration, creates the configured regions, selects the
//! security service and serves client connections until interrupted.

use clap::Parser;
use gridwire_security::{SecurityComponents, SecurityRegistry, SecurityServiceFactory};
use gridwire_server::{Config, RegionConfig, Server, ServerConfig};
use gridwire_store::MemoryCache;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridwire")]
#[command(about = "Client protocol gateway for an in-memory data grid")]
#[command(version)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long, env = "GRIDWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Runtime worker threads
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Idle connection timeout in seconds (0 disables)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Additional region to create at startup (repeatable)
    #[arg(short, long = "region")]
    regions: Vec<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.network.bind_addr = bind;
        }
        if let Some(threads) = self.worker_threads {
            config.network.worker_threads = threads;
        }
        if let Some(max) = self.max_connections {
            config.network.max_connections = max;
        }
        if let Some(secs) = self.idle_timeout {
            config.network.idle_timeout_secs = secs;
        }
        for name in &self.regions {
            if !config.regions.iter().any(|r| &r.name == name) {
                config.regions.push(RegionConfig::new(name.clone()));
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match Config::load_from(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    if let Some(path) = &args.config {
        tracing::info!("Loaded config from {}", path.display());
    }
    args.apply(&mut config);
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.network.worker_threads)
        .thread_name("gridwire-worker")
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting gridwire gateway");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Worker threads: {}", config.network.worker_threads);
    tracing::info!("  Max connections: {}", config.network.max_connections);

    // Regions are created up front; clients can only use existing ones.
    let cache = MemoryCache::new();
    for region in &config.regions {
        cache.create_region(region.name.clone(), region.attributes()?)?;
        tracing::info!("  Region: {}", region.name);
    }

    let security = SecurityServiceFactory::create(
        &config.security.to_properties(),
        &SecurityRegistry::with_builtins(),
        SecurityComponents::default(),
    )
    .map_err(|e| {
        tracing::error!("Failed to configure security: {}", e);
        e
    })?;
    tracing::info!("  Security: {}", security.service_type());

    let server = Arc::new(Server::new(
        ServerConfig::from(&config.network),
        Arc::new(cache),
        security,
    ));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    server.security().close();
    tracing::info!("Server stopped");
    Ok(())
}
