pub mod client;
pub mod discovery;
pub mod types;

pub use client::{ClientSettings, K8sClient};
pub use discovery::DiscoveryWatcher;
pub use types::{Backend, PortFilter, RouteKey};
