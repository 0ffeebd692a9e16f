//! landchain-governance: dispute governance daemon
//!
//! Loads configuration and seed data, then runs the escalation scheduler
//! until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use evidence::{BundleAssembler, EvidenceKind, HttpEvidenceAdapter, StaticAdapter};
use governance::seed::SeedData;
use governance::{GovernanceConfig, GovernanceService, InMemoryOfficialRegistry, InMemoryStore};

#[derive(Parser)]
#[command(name = "landchain-governance")]
#[command(about = "Evidence aggregation and weighted consensus for land disputes")]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, env = "LANDCHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Path to YAML seed file (officials and cases)
    #[arg(short, long, env = "LANDCHAIN_SEED")]
    seed: Option<PathBuf>,

    /// Load the built-in sample officials and case when no seed file is given
    #[arg(long)]
    sample: bool,

    /// Run a single escalation scan and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LANDCHAIN_JSON_LOGS")]
    json_logs: bool,
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("landchain_governance=info".parse()?)
        .add_directive("governance=info".parse()?)
        .add_directive("evidence=info".parse()?);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn build_assembler(config: &GovernanceConfig) -> anyhow::Result<BundleAssembler> {
    let mut builder = BundleAssembler::builder().config(config.evidence.clone());

    match &config.evidence.gateway_url {
        Some(url) => {
            info!(gateway = %url, "Using HTTP evidence adapters");
            for kind in EvidenceKind::ALL {
                builder = builder.adapter(Arc::new(HttpEvidenceAdapter::new(kind, url.clone())?));
            }
        }
        None => {
            warn!("No evidence gateway configured, bundles will be empty");
            for kind in EvidenceKind::ALL {
                builder = builder.adapter(Arc::new(StaticAdapter::new(kind)));
            }
        }
    }

    Ok(builder.build())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    info!("Starting landchain-governance");

    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            GovernanceConfig::from_file(path)?
        }
        None => {
            info!("No config file given, using defaults");
            GovernanceConfig::default()
        }
    };

    let store = Arc::new(InMemoryStore::new());
    let registry = Arc::new(InMemoryOfficialRegistry::new());
    let service = GovernanceService::new(
        store,
        registry.clone(),
        build_assembler(&config)?,
        config.clone(),
    );

    let seed = match (&cli.seed, cli.sample) {
        (Some(path), _) => Some(SeedData::from_file(path)?),
        (None, true) => Some(SeedData::sample()),
        (None, false) => None,
    };
    if let Some(seed) = seed {
        seed.apply(&registry, &service).await?;
    }

    let scheduler = Arc::new(service.escalation_scheduler());

    if cli.once {
        let outcomes = scheduler.run_once(chrono::Utc::now()).await?;
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler.spawn(shutdown_rx);

    info!(
        timeout_hours = config.escalation.timeout_hours,
        scan_interval_secs = config.escalation.scan_interval_secs,
        "Governance daemon running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    handle.await?;

    info!("landchain-governance stopped");
    Ok(())
}
