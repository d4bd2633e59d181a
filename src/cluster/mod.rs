pub mod balancer;
pub mod registry;
pub mod registry_proxy;
pub mod sentinel;
pub mod wire;
pub mod worker;

pub use balancer::{LoadBalancer, RandomSelect, RoundRobin};
pub use registry::{InMemoryRegistry, Registry, ServiceInstance};
pub use registry_proxy::RegistryProxy;
pub use sentinel::Sentinel;
pub use wire::{WireRequest, WireResponse};
pub use worker::IndexServiceWorker;
