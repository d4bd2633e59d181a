use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cluster::registry::{Registry, ServiceInstance};
use crate::core::error::Result;

struct CacheEntry {
    instances: Vec<ServiceInstance>,
    fetched_at: Instant,
}

/// Throttles reads of a [`Registry`] behind a short-lived cache so a
/// dispatcher handling many requests per second does not hit the registry
/// on every single one. A cache entry older than `refresh_interval` is
/// refetched on next access; everything in between is served from memory.
///
/// Per spec §4.8, writes (`register`/`unregister`) are meant to pass
/// straight through uncached. This type deliberately exposes no such
/// passthrough: in this crate workers register directly against a
/// [`Registry`] and the sentinel only ever reads through the proxy, so
/// there is no write traffic that would need one. A deployment that routed
/// registration through the sentinel would add `register`/`unregister`
/// methods here that forward to `self.registry` unconditionally, bypassing
/// `cache` entirely.
pub struct RegistryProxy<R: Registry> {
    registry: Arc<R>,
    refresh_interval: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl<R: Registry> RegistryProxy<R> {
    pub fn new(registry: Arc<R>, refresh_interval: Duration) -> Self {
        RegistryProxy { registry, refresh_interval, cache: Mutex::new(HashMap::new()) }
    }

    /// Current endpoints for `service`, refreshed from the underlying
    /// registry if the cached entry has aged past `refresh_interval`.
    pub fn endpoints(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(service) {
                if entry.fetched_at.elapsed() < self.refresh_interval {
                    return Ok(entry.instances.clone());
                }
            }
        }

        let instances = self.registry.list(service)?;
        let mut cache = self.cache.lock();
        cache.insert(service.to_string(), CacheEntry { instances: instances.clone(), fetched_at: Instant::now() });
        Ok(instances)
    }

    /// Drops the cached entry for `service`, forcing the next call to
    /// `endpoints` to hit the registry regardless of age. Used when a
    /// caller has already observed the cached endpoints to be stale (a
    /// dial failure, say) and wants a fresher view immediately.
    pub fn invalidate(&self, service: &str) {
        self.cache.lock().remove(service);
    }

    /// Passes `close` straight through to the wrapped registry — writes
    /// (and this lifecycle call) are never cached, only endpoint reads are.
    pub fn close(&self) -> Result<()> {
        self.registry.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::registry::InMemoryRegistry;
    use std::thread::sleep;

    #[test]
    fn caches_within_refresh_window() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register("search", "w1", "127.0.0.1:7700", Duration::from_secs(5)).unwrap();
        let proxy = RegistryProxy::new(registry.clone(), Duration::from_millis(200));

        let first = proxy.endpoints("search").unwrap();
        registry.deregister("search", "w1").unwrap();
        let second = proxy.endpoints("search").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn refetches_after_refresh_window_elapses() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register("search", "w1", "127.0.0.1:7700", Duration::from_secs(5)).unwrap();
        let proxy = RegistryProxy::new(registry.clone(), Duration::from_millis(10));

        proxy.endpoints("search").unwrap();
        registry.deregister("search", "w1").unwrap();
        sleep(Duration::from_millis(25));
        assert!(proxy.endpoints("search").unwrap().is_empty());
    }

    #[test]
    fn invalidate_forces_immediate_refetch() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register("search", "w1", "127.0.0.1:7700", Duration::from_secs(5)).unwrap();
        let proxy = RegistryProxy::new(registry.clone(), Duration::from_secs(60));

        proxy.endpoints("search").unwrap();
        registry.deregister("search", "w1").unwrap();
        proxy.invalidate("search");
        assert!(proxy.endpoints("search").unwrap().is_empty());
    }
}
