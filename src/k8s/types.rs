use k8s_openapi::api::core::v1::{ContainerPort, Pod};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key addressing a single pod, as it appears in proxy paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub namespace: String,
    pub pod_name: String,
}

impl RouteKey {
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
        }
    }

    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let pod_name = pod.metadata.name.clone()?;
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());

        Some(Self {
            namespace,
            pod_name,
        })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)
    }
}

/// Which container ports count as Jolokia endpoints, by number or by name.
#[derive(Debug, Clone)]
pub struct PortFilter {
    ports: Vec<u16>,
    names: Vec<String>,
}

impl PortFilter {
    pub fn new(ports: Vec<u16>, names: Vec<String>) -> Self {
        Self { ports, names }
    }

    pub fn matches(&self, port: &ContainerPort) -> bool {
        if self.ports.iter().any(|p| i32::from(*p) == port.container_port) {
            return true;
        }

        port.name
            .as_deref()
            .is_some_and(|name| self.names.iter().any(|n| n == name))
    }
}

/// A concrete pod endpoint eligible to receive proxied requests.
/// Immutable once created; replaced wholesale on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub namespace: String,
    pub pod_name: String,
    pub ip: String,
    pub port: u16,
    pub port_name: Option<String>,
}

impl Backend {
    /// Extract a routable backend from a pod. Returns `None` when the pod is
    /// not Running, is terminating, has no IP yet, or exposes no container
    /// port matching the filter. The first matching container port wins.
    pub fn from_pod(pod: &Pod, filter: &PortFilter) -> Option<Self> {
        let key = RouteKey::from_pod(pod)?;

        if pod.metadata.deletion_timestamp.is_some() {
            return None;
        }

        let status = pod.status.as_ref()?;
        if status.phase.as_deref() != Some("Running") {
            return None;
        }
        let ip = status.pod_ip.clone()?;

        let spec = pod.spec.as_ref()?;
        for container in &spec.containers {
            let Some(ports) = container.ports.as_ref() else {
                continue;
            };

            for container_port in ports {
                if !filter.matches(container_port) {
                    continue;
                }
                let port = u16::try_from(container_port.container_port).ok()?;

                return Some(Self {
                    namespace: key.namespace,
                    pod_name: key.pod_name,
                    ip,
                    port,
                    port_name: container_port.name.clone(),
                });
            }
        }

        None
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
