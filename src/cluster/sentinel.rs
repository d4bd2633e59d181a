use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::warn;

use crate::cluster::balancer::LoadBalancer;
use crate::cluster::registry::Registry;
use crate::cluster::registry_proxy::RegistryProxy;
use crate::cluster::wire::{read_frame, write_frame, WireRequest, WireResponse};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;
use crate::query::TermQuery;

/// Bound on in-flight results a single broadcast will buffer before the
/// collector has drained them, so one slow worker cannot force the
/// fan-out tasks to pile up unbounded memory waiting to send.
const BROADCAST_CHANNEL_CAPACITY: usize = 1000;

/// Single entry point a client talks to: routes `add_doc` to one worker
/// (picked by the configured [`LoadBalancer`], since documents are assumed
/// partitioned across workers upstream) and broadcasts `delete_doc`,
/// `search`, and `count` to every worker currently registered, merging
/// their answers.
///
/// Connections are pooled per endpoint. A pooled connection that fails a
/// round trip is dropped rather than returned to the pool — the next
/// request to that endpoint pays the dial cost again, which amounts to a
/// lazy health check: a dead worker's connection is evicted the moment
/// it's actually used, not on a timer.
pub struct Sentinel<R: Registry> {
    registry_proxy: Arc<RegistryProxy<R>>,
    balancer: Arc<dyn LoadBalancer>,
    dial_timeout: Duration,
    service_name: String,
    pool: Mutex<HashMap<String, TcpStream>>,
}

impl<R: Registry> Sentinel<R> {
    pub fn new(
        registry_proxy: Arc<RegistryProxy<R>>,
        balancer: Arc<dyn LoadBalancer>,
        service_name: impl Into<String>,
        dial_timeout: Duration,
    ) -> Self {
        Sentinel { registry_proxy, balancer, dial_timeout, service_name: service_name.into(), pool: Mutex::new(HashMap::new()) }
    }

    fn take_pooled(&self, endpoint: &str) -> Option<TcpStream> {
        self.pool.lock().remove(endpoint)
    }

    fn return_pooled(&self, endpoint: &str, stream: TcpStream) {
        self.pool.lock().insert(endpoint.to_string(), stream);
    }

    async fn get_conn(&self, endpoint: &str) -> Result<TcpStream> {
        if let Some(stream) = self.take_pooled(endpoint) {
            return Ok(stream);
        }
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(err)) => Err(Error::from(err)),
            Err(_) => Err(Error::new(ErrorKind::DialTimeout, format!("dialing {endpoint} exceeded {:?}", self.dial_timeout))),
        }
    }

    /// Sends one request to `endpoint` and returns its response. On
    /// success the connection goes back into the pool; on any failure it
    /// is simply dropped, evicting it.
    async fn request_one(&self, endpoint: &str, request: &WireRequest) -> Result<WireResponse> {
        let mut stream = self.get_conn(endpoint).await?;
        let outcome: Result<WireResponse> = async {
            write_frame(&mut stream, request).await?;
            read_frame(&mut stream).await
        }
        .await;

        match outcome {
            Ok(response) => {
                self.return_pooled(endpoint, stream);
                Ok(response)
            }
            Err(err) => Err(err),
        }
    }

    async fn pick_endpoint(&self) -> Result<String> {
        let candidates = self.registry_proxy.endpoints(&self.service_name)?;
        self.balancer
            .select(&candidates)
            .map(|instance| instance.endpoint.clone())
            .ok_or_else(|| Error::new(ErrorKind::NoAliveWorker, format!("no alive instance of {}", self.service_name)))
    }

    pub async fn add_doc(&self, document: Document) -> Result<u64> {
        let endpoint = self.pick_endpoint().await?;
        match self.request_one(&endpoint, &WireRequest::AddDoc { document }).await? {
            WireResponse::DocAdded { int_id } => Ok(int_id),
            WireResponse::Failed { message } => Err(Error::new(ErrorKind::RpcFailure, message)),
            other => Err(Error::new(ErrorKind::RpcFailure, format!("unexpected response to add_doc: {other:?}"))),
        }
    }

    /// Broadcasts a delete to every currently registered worker in
    /// parallel and sums the number of documents each one actually
    /// removed (0 or 1 apiece — a document lives on exactly one worker,
    /// per the sharding the sentinel assumes upstream). A per-endpoint
    /// RPC failure is logged and skipped rather than failing the whole
    /// call, same failure-tolerant shape as [`Sentinel::search`].
    pub async fn delete_doc(&self, id: impl Into<String>) -> Result<(usize, usize)> {
        let candidates = self.registry_proxy.endpoints(&self.service_name)?;
        if candidates.is_empty() {
            return Err(Error::new(ErrorKind::NoAliveWorker, format!("no alive instance of {}", self.service_name)));
        }

        let id = id.into();
        let (tx, mut rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        for instance in candidates {
            let endpoint = instance.endpoint;
            let request = WireRequest::DeleteDoc { id: id.clone() };
            let pooled = self.take_pooled(&endpoint);
            let dial_timeout = self.dial_timeout;
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = dispatch(pooled, &endpoint, dial_timeout, &request).await;
                let _ = tx.send((endpoint, outcome)).await;
            });
        }
        drop(tx);

        let mut total = 0usize;
        let mut failures = 0usize;
        while let Some((endpoint, outcome)) = rx.recv().await {
            match outcome {
                Ok((WireResponse::DocDeleted { count }, stream)) => {
                    total += count;
                    self.return_pooled(&endpoint, stream);
                }
                _ => {
                    warn!(%endpoint, "delete_doc RPC failed, skipping this endpoint");
                    failures += 1;
                }
            }
        }
        while tasks.join_next().await.is_some() {}

        Ok((total, failures))
    }

    /// Broadcasts a search to every currently registered worker in
    /// parallel and merges their matching documents. A single worker's
    /// failure does not fail the whole search — its contribution is just
    /// absent from the merged result, which is recorded in the returned
    /// failure count. Results are funneled through a bounded channel so a
    /// slow collector cannot let the fan-out tasks' outputs pile up
    /// unbounded in memory.
    pub async fn search(&self, query: TermQuery, on: u64, off: u64, or_flags: Vec<u64>) -> Result<(Vec<Document>, usize)> {
        let candidates = self.registry_proxy.endpoints(&self.service_name)?;
        if candidates.is_empty() {
            return Err(Error::new(ErrorKind::NoAliveWorker, format!("no alive instance of {}", self.service_name)));
        }

        let (tx, mut rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        for instance in candidates {
            let endpoint = instance.endpoint;
            let request = WireRequest::Search { query: query.clone(), on, off, or_flags: or_flags.clone() };
            let pooled = self.take_pooled(&endpoint);
            let dial_timeout = self.dial_timeout;
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = dispatch(pooled, &endpoint, dial_timeout, &request).await;
                let _ = tx.send((endpoint, outcome)).await;
            });
        }
        drop(tx);

        let mut documents = Vec::new();
        let mut failures = 0usize;
        while let Some((endpoint, outcome)) = rx.recv().await {
            match outcome {
                Ok((WireResponse::SearchResult { documents: mut docs }, stream)) => {
                    documents.append(&mut docs);
                    self.return_pooled(&endpoint, stream);
                }
                _ => {
                    warn!(%endpoint, "search RPC failed, skipping this endpoint");
                    failures += 1;
                }
            }
        }
        while tasks.join_next().await.is_some() {}

        Ok((documents, failures))
    }

    /// Broadcasts a count request to every worker and sums the results,
    /// same failure-tolerant shape as [`Sentinel::search`].
    pub async fn count(&self) -> Result<(usize, usize)> {
        let candidates = self.registry_proxy.endpoints(&self.service_name)?;
        if candidates.is_empty() {
            return Err(Error::new(ErrorKind::NoAliveWorker, format!("no alive instance of {}", self.service_name)));
        }

        let (tx, mut rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        for instance in candidates {
            let endpoint = instance.endpoint;
            let pooled = self.take_pooled(&endpoint);
            let dial_timeout = self.dial_timeout;
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = dispatch(pooled, &endpoint, dial_timeout, &WireRequest::Count).await;
                let _ = tx.send((endpoint, outcome)).await;
            });
        }
        drop(tx);

        let mut total = 0usize;
        let mut failures = 0usize;
        while let Some((endpoint, outcome)) = rx.recv().await {
            match outcome {
                Ok((WireResponse::CountResult { count }, stream)) => {
                    total += count;
                    self.return_pooled(&endpoint, stream);
                }
                _ => {
                    warn!(%endpoint, "count RPC failed, skipping this endpoint");
                    failures += 1;
                }
            }
        }
        while tasks.join_next().await.is_some() {}

        Ok((total, failures))
    }

    /// Drops every pooled connection and releases the registry handle.
    /// Called once, on the sentinel process's own orderly shutdown.
    pub fn close(&self) -> Result<()> {
        self.pool.lock().clear();
        self.registry_proxy.close()
    }
}

/// Sends one request over `pooled` if present, otherwise dials `endpoint`
/// fresh under `dial_timeout`. Returns the response together with the
/// connection so the caller can decide whether to keep it pooled — a
/// free function rather than a method so it can run inside a spawned
/// task without borrowing the `Sentinel` across the task boundary.
async fn dispatch(
    pooled: Option<TcpStream>,
    endpoint: &str,
    dial_timeout: Duration,
    request: &WireRequest,
) -> Result<(WireResponse, TcpStream)> {
    let mut stream = match pooled {
        Some(stream) => stream,
        None => match tokio::time::timeout(dial_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(Error::from(err)),
            Err(_) => return Err(Error::new(ErrorKind::DialTimeout, format!("dialing {endpoint} exceeded {dial_timeout:?}"))),
        },
    };
    write_frame(&mut stream, request).await?;
    let response = read_frame(&mut stream).await?;
    Ok((response, stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::balancer::RoundRobin;
    use crate::cluster::registry::InMemoryRegistry;
    use crate::cluster::worker::IndexServiceWorker;
    use crate::core::config::{DbKind, IndexerConfig};
    use crate::core::indexer::Indexer;
    use tokio::net::TcpListener;

    fn sentinel() -> (Arc<InMemoryRegistry>, Sentinel<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::new());
        let proxy = Arc::new(RegistryProxy::new(registry.clone(), Duration::from_millis(1)));
        (registry, Sentinel::new(proxy, Arc::new(RoundRobin::new()), "search", Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn add_doc_with_no_registered_workers_fails_fast() {
        let (_registry, s) = sentinel();
        let err = s.add_doc(Document::new("doc-1")).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NoAliveWorker));
    }

    #[tokio::test]
    async fn search_with_no_registered_workers_fails_fast() {
        let (_registry, s) = sentinel();
        let err = s.search(TermQuery::leaf("title", "rust"), 0, 0, vec![]).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NoAliveWorker));
    }

    #[tokio::test]
    async fn delete_doc_with_no_registered_workers_fails_fast() {
        let (_registry, s) = sentinel();
        let err = s.delete_doc("doc-1").await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NoAliveWorker));
    }

    /// Spins up a real worker bound to an ephemeral port, wraps it in its
    /// own indexer over a fresh temp directory, and registers it under
    /// `instance_id` in `registry`. Returns the endpoint it ended up
    /// listening on.
    async fn spawn_worker(registry: Arc<InMemoryRegistry>, instance_id: &str) -> String {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexerConfig { db_kind: DbKind::LsmEngine, db_path: dir.path().to_path_buf(), doc_num_estimate: 16 };
        let indexer = Arc::new(Indexer::init(&config).unwrap());
        // leaked on purpose: the tempdir must outlive the spawned task.
        Box::leak(Box::new(dir));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        registry.register("search", instance_id, &endpoint, Duration::from_secs(30)).unwrap();

        let worker = Arc::new(IndexServiceWorker::new(
            indexer,
            None::<Arc<InMemoryRegistry>>,
            "search",
            instance_id,
            endpoint.clone(),
            Duration::from_secs(30),
        ));
        tokio::spawn(worker.serve(listener));
        endpoint
    }

    #[tokio::test]
    async fn search_merges_results_across_two_workers() {
        let (registry, s) = sentinel();
        spawn_worker(registry.clone(), "w1").await;
        spawn_worker(registry.clone(), "w2").await;

        // The balancer is round-robin, so these two writes land on
        // different workers deterministically.
        s.add_doc(Document::new("d1").with_keyword("field", "apple")).await.unwrap();
        s.add_doc(Document::new("d2").with_keyword("field", "apple")).await.unwrap();

        let (documents, failures) = s.search(TermQuery::leaf("field", "apple"), 0, 0, vec![]).await.unwrap();
        assert_eq!(failures, 0);
        let mut ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["d1", "d2"]);
    }

    #[tokio::test]
    async fn delete_doc_broadcasts_and_sums_counts_across_workers() {
        let (registry, s) = sentinel();
        spawn_worker(registry.clone(), "w1").await;
        spawn_worker(registry.clone(), "w2").await;

        s.add_doc(Document::new("d1").with_keyword("field", "apple")).await.unwrap();
        s.add_doc(Document::new("d2").with_keyword("field", "apple")).await.unwrap();

        // d1 lives on exactly one of the two workers; the broadcast delete
        // should report a total of 1 regardless of which one.
        let (deleted, failures) = s.delete_doc("d1").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(failures, 0);

        let (documents, _) = s.search(TermQuery::leaf("field", "apple"), 0, 0, vec![]).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "d2");
    }

    #[tokio::test]
    async fn search_survives_a_dead_worker_after_its_lease_expires() {
        let (registry, s) = sentinel();
        spawn_worker(registry.clone(), "w1").await;

        // A worker that never registered (or whose lease has expired)
        // simply never shows up in the registry's endpoint list — the
        // sentinel has nothing to broadcast to and nothing to fail on.
        registry.register("search", "w2-ghost", "127.0.0.1:1", Duration::from_millis(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        s.add_doc(Document::new("d1").with_keyword("field", "apple")).await.unwrap();
        let (documents, failures) = s.search(TermQuery::leaf("field", "apple"), 0, 0, vec![]).await.unwrap();
        assert_eq!(failures, 0);
        assert_eq!(documents.len(), 1);
    }

    #[tokio::test]
    async fn close_drops_pooled_connections_and_closes_the_registry() {
        let (registry, s) = sentinel();
        spawn_worker(registry.clone(), "w1").await;

        // Round-trip a request so the connection lands in the pool.
        s.add_doc(Document::new("d1").with_keyword("field", "apple")).await.unwrap();
        assert_eq!(s.pool.lock().len(), 1);

        s.close().unwrap();
        assert!(s.pool.lock().is_empty());
    }
}
