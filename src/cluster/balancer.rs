use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::cluster::registry::ServiceInstance;

/// Picks one endpoint out of a non-empty candidate slice. Returns `None`
/// for an empty slice rather than panicking — callers (the sentinel) treat
/// that as "no alive worker" and surface it accordingly.
pub trait LoadBalancer: Send + Sync {
    fn select<'a>(&self, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Cycles through candidates in order, advancing a shared counter on every
/// call regardless of the candidate list's length at that moment — so the
/// position drifts gracefully as the set of alive workers changes instead
/// of resetting to zero.
#[derive(Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        RoundRobin { next: AtomicUsize::new(0) }
    }
}

impl LoadBalancer for RoundRobin {
    fn select<'a>(&self, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(&candidates[i])
    }
}

/// Picks a uniformly random candidate on every call.
#[derive(Default)]
pub struct RandomSelect;

impl RandomSelect {
    pub fn new() -> Self {
        RandomSelect
    }
}

impl LoadBalancer for RandomSelect {
    fn select<'a>(&self, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let i = rand::thread_rng().gen_range(0..candidates.len());
        Some(&candidates[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(n: usize) -> Vec<ServiceInstance> {
        (0..n).map(|i| ServiceInstance { instance_id: format!("w{i}"), endpoint: format!("127.0.0.1:770{i}") }).collect()
    }

    #[test]
    fn round_robin_cycles_through_all_candidates() {
        let balancer = RoundRobin::new();
        let candidates = instances(3);
        let picks: Vec<String> =
            (0..6).map(|_| balancer.select(&candidates).unwrap().instance_id.clone()).collect();
        assert_eq!(picks, vec!["w0", "w1", "w2", "w0", "w1", "w2"]);
    }

    #[test]
    fn round_robin_on_empty_candidates_returns_none() {
        let balancer = RoundRobin::new();
        assert!(balancer.select(&[]).is_none());
    }

    #[test]
    fn random_select_always_returns_one_of_the_candidates() {
        let balancer = RandomSelect::new();
        let candidates = instances(5);
        for _ in 0..50 {
            let picked = balancer.select(&candidates).unwrap();
            assert!(candidates.contains(picked));
        }
    }

    #[test]
    fn random_select_on_empty_candidates_returns_none() {
        let balancer = RandomSelect::new();
        assert!(balancer.select(&[]).is_none());
    }
}
