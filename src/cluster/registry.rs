use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::error::{Error, ErrorKind, Result};

/// A single registered endpoint for a service, as seen by a reader of the
/// registry. `endpoint` is whatever a client needs to dial it (host:port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub instance_id: String,
    pub endpoint: String,
}

/// Lease-based service discovery: an instance registers with a
/// time-to-live and must heartbeat before the lease expires or it drops
/// out of `list`. This mirrors what an external coordination service
/// (etcd, Consul, ZooKeeper) provides; [`InMemoryRegistry`] is a
/// self-contained stand-in useful for tests and single-process
/// deployments, not a replacement for one in production.
pub trait Registry: Send + Sync {
    fn register(&self, service: &str, instance_id: &str, endpoint: &str, ttl: Duration) -> Result<()>;

    /// Refreshes an existing lease. Fails with `NotFound` if the instance
    /// was never registered or its lease already expired — callers are
    /// expected to re-register in that case rather than resurrect a dead
    /// lease.
    fn heartbeat(&self, service: &str, instance_id: &str, ttl: Duration) -> Result<()>;

    fn deregister(&self, service: &str, instance_id: &str) -> Result<()>;

    /// Endpoints currently within their lease for `service`, in no
    /// particular order.
    fn list(&self, service: &str) -> Result<Vec<ServiceInstance>>;

    /// Releases any resources this registry handle holds (a client
    /// connection to an external coordinator, say). The in-process
    /// reference implementation has nothing to release.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct Lease {
    endpoint: String,
    expires_at: Instant,
}

/// In-process registry implementation: a mutex-guarded map of
/// service -> instance_id -> lease. Expiry is checked lazily on every
/// read rather than by a background sweeper, so an instance that stops
/// heartbeating disappears from `list` the moment its TTL elapses without
/// needing a timer thread.
#[derive(Default)]
pub struct InMemoryRegistry {
    services: Mutex<HashMap<String, HashMap<String, Lease>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        InMemoryRegistry { services: Mutex::new(HashMap::new()) }
    }
}

impl Registry for InMemoryRegistry {
    fn register(&self, service: &str, instance_id: &str, endpoint: &str, ttl: Duration) -> Result<()> {
        let mut services = self.services.lock();
        let instances = services.entry(service.to_string()).or_default();
        instances.insert(
            instance_id.to_string(),
            Lease { endpoint: endpoint.to_string(), expires_at: Instant::now() + ttl },
        );
        Ok(())
    }

    fn heartbeat(&self, service: &str, instance_id: &str, ttl: Duration) -> Result<()> {
        let mut services = self.services.lock();
        let instances = services
            .get_mut(service)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("service {service} has no instances")))?;
        let lease = instances
            .get_mut(instance_id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("instance {instance_id} not registered")))?;
        if lease.expires_at < Instant::now() {
            instances.remove(instance_id);
            return Err(Error::new(ErrorKind::NotFound, format!("instance {instance_id} lease already expired")));
        }
        lease.expires_at = Instant::now() + ttl;
        Ok(())
    }

    fn deregister(&self, service: &str, instance_id: &str) -> Result<()> {
        let mut services = self.services.lock();
        if let Some(instances) = services.get_mut(service) {
            instances.remove(instance_id);
        }
        Ok(())
    }

    fn list(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        let mut services = self.services.lock();
        let Some(instances) = services.get_mut(service) else {
            return Ok(Vec::new());
        };
        let now = Instant::now();
        instances.retain(|_, lease| lease.expires_at >= now);
        Ok(instances
            .iter()
            .map(|(id, lease)| ServiceInstance { instance_id: id.clone(), endpoint: lease.endpoint.clone() })
            .collect())
    }
}
