//! Reverse proxy routing HTTP requests to Jolokia endpoints exposed by
//! Kubernetes pods.
//!
//! A discovery watcher keeps an atomic routing table in sync with the
//! cluster's pod set; the proxy router forwards `/proxy/{namespace}/{pod}/...`
//! requests to the matching pod IP and Jolokia port.

pub mod cli;
pub mod error;
pub mod k8s;
pub mod metrics;
pub mod proxy;
pub mod registry;

pub use error::{ProxyError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
