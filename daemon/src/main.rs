use anyhow::{Context, Result};
use cpu_usage_daemon::{
    collector::LinuxProcessCollector,
    config::Config,
    locator::ProcTableLocator,
    registry::{SamplingStrategy, TrackerRegistry},
    server::HttpServer,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("cpu-usage daemon starting...");

    // Load configuration
    let config_path = Config::config_path();
    let config = if config_path.exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    } else {
        info!("No config file found at {:?}, using defaults", config_path);
        Config::default()
    };

    let collector = Arc::new(LinuxProcessCollector::new());
    let locator = Arc::new(ProcTableLocator::new(collector, config.baseline_interval()));
    let registry = Arc::new(TrackerRegistry::from_config(&config, locator));

    match registry.strategy() {
        SamplingStrategy::Passive { retention } => {
            info!("Passive sampling, retention window {:?}", retention)
        }
        SamplingStrategy::Active { interval, duration } => info!(
            "Active sampling every {:?} for {:?} per request",
            interval, duration
        ),
    }
    for target in registry.identities() {
        info!(
            "Tracking {} ({:?} owned by {})",
            target.display_name, target.command_substring, target.owner_account
        );
    }

    let addr = config.server.socket_addr()?;
    let server = HttpServer::bind(addr, registry)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    server.run().await?;

    info!("Daemon stopped");
    Ok(())
}
