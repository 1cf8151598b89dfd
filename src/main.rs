use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use inference_gate::budget::{InMemorySpendStore, SpendStore, StoreError};
use inference_gate::config::{load_config, ConfigWatcher, GateConfig, StoreBackend, StoreConfig};
use inference_gate::http::{AdminServer, AppState};
use inference_gate::lifecycle::{spawn_signal_handler, Shutdown};
use inference_gate::observability::{logging, metrics};
use inference_gate::AdmissionGate;

#[derive(Parser)]
#[command(name = "inference-gate")]
#[command(about = "Admission gate for LLM calls", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when it is missing.
    #[arg(short, long, default_value = "gate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_exists = args.config.exists();
    let config = if config_exists {
        load_config(&args.config)?
    } else {
        GateConfig::default()
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "inference-gate starting"
    );
    if !config_exists {
        tracing::warn!(path = ?args.config, "Config file not found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = build_store(&config.store).await?;
    let gate = Arc::new(AdmissionGate::from_config(&config, store));
    tracing::info!(
        backend = ?config.store.backend,
        default_limit = config.budget.default_limit,
        period_secs = config.budget.period_secs,
        fail_max = config.breaker.defaults.fail_max,
        "Admission gate ready"
    );

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(Arc::clone(&shutdown));

    let state = AppState::new(Arc::clone(&gate), config.admin.clone());

    // Hot reload: keep the watcher alive for the life of the process
    let _watcher = if config_exists {
        let (watcher, mut updates) = ConfigWatcher::new(&args.config);
        let watcher = watcher.run()?;
        let gate = Arc::clone(&gate);
        let admin = Arc::clone(&state.admin);
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                gate.ledger().update_config(new_config.budget);
                admin.store(Arc::new(new_config.admin));
                tracing::info!("Configuration reloaded");
            }
        });
        Some(watcher)
    } else {
        None
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        AdminServer::new(state)
            .run(listener, shutdown.subscribe())
            .await?;
    } else {
        tracing::info!("Admin API disabled");
        let mut rx = shutdown.subscribe();
        let _ = rx.recv().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn SpendStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!(
                "Using in-memory spend store; budgets are not shared across instances"
            );
            Ok(Arc::new(InMemorySpendStore::new()))
        }
        StoreBackend::Redis => redis_store(config).await,
    }
}

#[cfg(feature = "redis_backend")]
async fn redis_store(config: &StoreConfig) -> Result<Arc<dyn SpendStore>, StoreError> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| {
            StoreError::Unavailable("store.redis_url is not set".into())
        })?;
    let store = inference_gate::budget::RedisSpendStore::new(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis_backend"))]
async fn redis_store(_config: &StoreConfig) -> Result<Arc<dyn SpendStore>, StoreError> {
    Err(StoreError::Unavailable(
        "redis backend requested but the binary was built without the `redis_backend` feature"
            .into(),
    ))
}
