use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::cluster::registry::Registry;
use crate::cluster::wire::{read_frame, write_frame, WireRequest, WireResponse};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::indexer::Indexer;

/// Ports at or below this are reserved well-known ports; spec's error
/// taxonomy rejects them at registration the same way an empty doc id is
/// rejected at `AddDoc`.
const MIN_SERVICE_PORT: u16 = 1024;

/// Registration TTL relative to the heartbeat cadence: the lease outlives
/// several missed heartbeats before a registry would consider the worker
/// gone, so a single slow tick does not flap the worker in and out of
/// `list()`.
const LEASE_TTL_MULTIPLIER: u32 = 3;

/// Wraps an [`Indexer`] with the network and cluster-membership surface a
/// worker process needs: it accepts RPCs per the wire protocol and
/// (optionally) keeps a lease alive in a [`Registry`] so sentinels can
/// find it.
pub struct IndexServiceWorker<R: Registry> {
    indexer: Arc<Indexer>,
    registry: Option<Arc<R>>,
    service_name: String,
    instance_id: String,
    endpoint: String,
    heartbeat_interval: Duration,
}

impl<R: Registry + 'static> IndexServiceWorker<R> {
    pub fn new(
        indexer: Arc<Indexer>,
        registry: Option<Arc<R>>,
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        endpoint: impl Into<String>,
        heartbeat_interval: Duration,
    ) -> Self {
        IndexServiceWorker {
            indexer,
            registry,
            service_name: service_name.into(),
            instance_id: instance_id.into(),
            endpoint: endpoint.into(),
            heartbeat_interval,
        }
    }

    /// Registers with the registry (if configured), starts the heartbeat
    /// loop, then accepts connections until `listener` is closed or the
    /// process is asked to stop.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        self.validate_service_port()?;
        if let Some(registry) = &self.registry {
            registry.register(&self.service_name, &self.instance_id, &self.endpoint, self.lease_ttl())?;
            info!(service = %self.service_name, instance = %self.instance_id, endpoint = %self.endpoint, "registered with service registry");
            tokio::spawn(self.clone().heartbeat_loop());
        }

        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");
            let worker = self.clone();
            tokio::spawn(async move {
                if let Err(err) = worker.handle_connection(stream).await {
                    warn!(%peer, error = %err, "connection closed with error");
                }
            });
        }
    }

    /// Revokes this worker's lease, if it holds one. Callers invoke this
    /// on an orderly shutdown (interrupt/terminate signal) so the registry
    /// drops the endpoint immediately rather than waiting out the TTL.
    pub fn deregister(&self) {
        if let Some(registry) = &self.registry {
            if let Err(err) = registry.deregister(&self.service_name, &self.instance_id) {
                warn!(error = %err, "failed to deregister from service registry");
            } else {
                info!(service = %self.service_name, instance = %self.instance_id, "deregistered from service registry");
            }
        }
    }

    fn lease_ttl(&self) -> Duration {
        self.heartbeat_interval * LEASE_TTL_MULTIPLIER
    }

    /// Rejects a service port at or below [`MIN_SERVICE_PORT`], the same
    /// way `Indexer::add_doc` rejects an empty document id — an
    /// `InvalidArgument` surfaced straight to the caller rather than
    /// silently accepted. Checked here (not only at config-load time) so
    /// a worker built directly, bypassing `WorkerConfig`, still refuses to
    /// register on a reserved port.
    fn validate_service_port(&self) -> Result<()> {
        let port = self.endpoint.rsplit(':').next().and_then(|p| p.parse::<u16>().ok());
        match port {
            Some(port) if port > MIN_SERVICE_PORT => Ok(()),
            _ => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("service port in endpoint {:?} must be greater than {MIN_SERVICE_PORT}", self.endpoint),
            )),
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let registry = match &self.registry {
            Some(registry) => registry.clone(),
            None => return,
        };
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            ticker.tick().await;
            let outcome = registry.heartbeat(&self.service_name, &self.instance_id, self.lease_ttl());
            if let Err(err) = outcome {
                warn!(error = %err, "heartbeat failed, re-registering");
                if let Err(err) = registry.register(&self.service_name, &self.instance_id, &self.endpoint, self.lease_ttl()) {
                    error!(error = %err, "re-registration failed");
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        loop {
            let request: WireRequest = match read_frame(&mut stream).await {
                Ok(request) => request,
                Err(_) => return Ok(()),
            };
            let response = self.dispatch(request);
            write_frame(&mut stream, &response).await?;
        }
    }

    fn dispatch(&self, request: WireRequest) -> WireResponse {
        match request {
            WireRequest::AddDoc { document } => match self.indexer.add_doc(document) {
                Ok(int_id) => WireResponse::DocAdded { int_id },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
            WireRequest::DeleteDoc { id } => match self.indexer.delete_doc(&id) {
                Ok(count) => WireResponse::DocDeleted { count },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
            WireRequest::Search { query, on, off, or_flags } => match self.indexer.search(&query, on, off, &or_flags) {
                Ok(documents) => WireResponse::SearchResult { documents },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
            WireRequest::Count => match self.indexer.count() {
                Ok(count) => WireResponse::CountResult { count },
                Err(err) => WireResponse::Failed { message: err.to_string() },
            },
        }
    }
}
