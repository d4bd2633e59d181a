use std::path::PathBuf;
use std::sync::Arc;

use corvid::cluster::registry::InMemoryRegistry;
use corvid::cluster::worker::IndexServiceWorker;
use corvid::core::config::WorkerConfig;
use corvid::core::indexer::Indexer;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("worker.toml"));
    let config = match WorkerConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %config_path.display(), error = %err, "no worker config found, starting with defaults");
            let mut config = WorkerConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    config.validate().expect("invalid worker configuration");

    let mut indexer = Indexer::init(&config.indexer).expect("failed to open forward store");
    let loaded = indexer.load_from_forward_store().expect("failed to rebuild inverted index");
    info!(documents = loaded, "resumed from forward store");
    let indexer = Arc::new(indexer);

    let registry = if config.registry_endpoints.is_empty() {
        None
    } else {
        warn!(
            endpoints = ?config.registry_endpoints,
            "registry_endpoints configured but no external registry client is wired up; running in standalone mode"
        );
        None::<Arc<InMemoryRegistry>>
    };

    let instance_id = uuid_like_instance_id();
    let endpoint = format!("0.0.0.0:{}", config.service_port);
    let listener = TcpListener::bind(&endpoint).await.expect("failed to bind service port");
    info!(%endpoint, "worker listening");

    let worker = Arc::new(IndexServiceWorker::new(
        indexer.clone(),
        registry,
        "search",
        instance_id,
        endpoint,
        std::time::Duration::from_secs(config.heartbeat_seconds),
    ));

    tokio::select! {
        result = worker.serve(listener) => {
            if let Err(err) = result {
                warn!(error = %err, "worker serve loop exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    worker.deregister();
    if let Err(err) = indexer.close() {
        warn!(error = %err, "error closing forward store");
    }
}

fn uuid_like_instance_id() -> String {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("worker-{pid}-{nanos}")
}
