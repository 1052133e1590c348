//! CLI entry point for the assetscan-discover network scanner.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use assetscan_core::{ScanId, ScanOptions, ScanRequest};
use assetscan_store::{HostStore, JsonFileHostStore, MemoryHostStore};

use assetscan_discover::api;
use assetscan_discover::config::DiscoverConfig;
use assetscan_discover::events::LogSink;
use assetscan_discover::jobs::ScanJobs;
use assetscan_discover::orchestrator::{CancelFlag, Orchestrator};

#[derive(Parser)]
#[command(name = "assetscan-discover")]
#[command(about = "Network discovery scanner for the asset inventory")]
struct Cli {
    /// Target to scan (CIDR notation, e.g., 192.168.1.0/24).
    #[arg(short, long)]
    target: Option<String>,

    /// Run a single scan in the foreground and exit.
    #[arg(long)]
    once: bool,

    /// Serve the HTTP API.
    #[arg(long)]
    serve: bool,

    /// Resolve hostnames via reverse DNS.
    #[arg(long)]
    use_dns: bool,

    /// Custom DNS server for reverse lookups (repeatable).
    #[arg(long = "dns")]
    dns: Vec<String>,

    /// Directory for discovered-host records. One-shot scans keep results
    /// in memory unless this is given.
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Config file prefix (default: assetscan).
    #[arg(short, long, default_value = "assetscan")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let discover_config = Arc::new(load_discover_config(&cli.config)?);

    if cli.once {
        let target = cli
            .target
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--target is required in --once mode"))?;
        let options = ScanOptions {
            use_dns: cli.use_dns,
            ..Default::default()
        };
        let request = ScanRequest::new(target, options).with_dns_servers(&cli.dns)?;

        let store: Arc<dyn HostStore> = match &cli.store_dir {
            Some(dir) => Arc::new(JsonFileHostStore::new(dir.clone())?),
            None => Arc::new(MemoryHostStore::new()),
        };
        let orchestrator = Orchestrator::new(discover_config, store, Arc::new(LogSink));
        let summary = orchestrator
            .run(ScanId::new(), &request, &CancelFlag::new())
            .await?;

        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if cli.serve {
        let store_dir = cli
            .store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&discover_config.store_dir));
        let store = Arc::new(JsonFileHostStore::new(store_dir.clone())?);
        tracing::info!(store_dir = %store_dir.display(), "Discovered-host store ready");

        let jobs = ScanJobs::new(discover_config.clone(), store, Arc::new(LogSink));
        let listener = TcpListener::bind(&discover_config.bind_addr).await?;
        tracing::info!(bind_addr = %discover_config.bind_addr, "API listening");

        axum::serve(listener, api::router(jobs)).await?;
    } else {
        anyhow::bail!("Specify --once (one-shot scan) or --serve (HTTP API)");
    }

    Ok(())
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("ASSETSCAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(e) => {
            tracing::debug!(error = %e, "No [discover] config, using defaults");
            Ok(DiscoverConfig::default())
        }
    }
}
