use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use corvid::cluster::balancer::{LoadBalancer, RoundRobin};
use corvid::cluster::registry::InMemoryRegistry;
use corvid::cluster::registry_proxy::RegistryProxy;
use corvid::cluster::sentinel::Sentinel;
use corvid::cluster::wire::{read_frame, write_frame, WireRequest, WireResponse};
use corvid::core::config::SentinelConfig;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("sentinel.toml"));
    let config = match SentinelConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %config_path.display(), error = %err, "no sentinel config found, starting with defaults");
            let mut config = SentinelConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    // The bundled `InMemoryRegistry` only coordinates workers within this
    // process; a real deployment would point this at an external registry
    // client instead. Listed endpoints are logged but otherwise unused
    // until such a client exists.
    if !config.registry_endpoints.is_empty() {
        warn!(endpoints = ?config.registry_endpoints, "registry_endpoints configured but no external registry client is wired up");
    }
    let registry = Arc::new(InMemoryRegistry::new());
    let proxy = Arc::new(RegistryProxy::new(registry, Duration::from_millis(config.registry_cache_refresh_millis)));
    let balancer: Arc<dyn LoadBalancer> = Arc::new(RoundRobin::new());
    let sentinel = Arc::new(Sentinel::new(
        proxy,
        balancer,
        "search",
        Duration::from_millis(config.dial_timeout_millis),
    ));

    let front_door = "0.0.0.0:7800";
    let listener = TcpListener::bind(front_door).await.expect("failed to bind front door port");
    info!(%front_door, "sentinel listening");

    tokio::select! {
        _ = accept_loop(listener, sentinel.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    if let Err(err) = sentinel.close() {
        warn!(error = %err, "error closing sentinel");
    }
}

async fn accept_loop(listener: TcpListener, sentinel: Arc<Sentinel<InMemoryRegistry>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        let sentinel = sentinel.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, sentinel).await {
                warn!(%peer, error = %err, "client connection closed with error");
            }
        });
    }
}

async fn handle_client(mut stream: TcpStream, sentinel: Arc<Sentinel<InMemoryRegistry>>) -> corvid::core::error::Result<()> {
    loop {
        let request: WireRequest = match read_frame(&mut stream).await {
            Ok(request) => request,
            Err(_) => return Ok(()),
        };
        let response = match request {
            WireRequest::AddDoc { document } => match sentinel.add_doc(document).await {
                Ok(int_id) => WireResponse::DocAdded { int_id },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
            WireRequest::DeleteDoc { id } => match sentinel.delete_doc(id).await {
                Ok((count, _failures)) => WireResponse::DocDeleted { count },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
            WireRequest::Search { query, on, off, or_flags } => match sentinel.search(query, on, off, or_flags).await {
                Ok((documents, _failures)) => WireResponse::SearchResult { documents },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
            WireRequest::Count => match sentinel.count().await {
                Ok((count, _failures)) => WireResponse::CountResult { count },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
        };
        write_frame(&mut stream, &response).await?;
    }
}
