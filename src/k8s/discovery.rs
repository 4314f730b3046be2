//! Pod discovery: list+watch against the cluster API, publishing routing
//! snapshots to the target registry.
//!
//! The run loop doubles as the lifecycle supervisor: stream failures are
//! retried with exponential backoff and a full re-list, while the last
//! published snapshot keeps serving lookups.

use crate::k8s::types::{Backend, PortFilter, RouteKey};
use crate::metrics::ProxyMetrics;
use crate::registry::{Snapshot, TargetRegistry};
use crate::{ProxyError, Result};
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher::{self, Event};
use kube::Api;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Watches the cluster's pod set and keeps the registry in sync.
/// Single writer: nothing else publishes snapshots.
pub struct DiscoveryWatcher {
    api: Api<Pod>,
    filter: PortFilter,
    registry: Arc<TargetRegistry>,
    metrics: Arc<ProxyMetrics>,
}

impl DiscoveryWatcher {
    pub fn new(
        api: Api<Pod>,
        filter: PortFilter,
        registry: Arc<TargetRegistry>,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        Self {
            api,
            filter,
            registry,
            metrics,
        }
    }

    /// Runs indefinitely; spawn as a task. Each watch restart re-lists all
    /// pods, so an expired watch cursor is never surfaced to callers.
    pub async fn run(&self) {
        info!("Starting pod discovery watcher");

        let mut backoff = INITIAL_BACKOFF;

        loop {
            match self.watch_pods().await {
                Ok(()) => {
                    warn!("Pod watch stream ended, reconnecting");
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    error!("Pod watch failed: {}, reconnecting in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                }
            }

            self.metrics.discovery_restarts_total.inc();
        }
    }

    async fn watch_pods(&self) -> Result<()> {
        let config = watcher::Config::default();
        let mut stream = watcher::watcher(self.api.clone(), config).boxed();

        // Working set for incremental events; `pending` collects the re-list
        // so the previous snapshot keeps serving until InitDone.
        let mut working: Snapshot = self.registry.snapshot().as_ref().clone();
        let mut pending: Option<Snapshot> = None;

        while let Some(event) = stream
            .try_next()
            .await
            .map_err(|e| ProxyError::Kubernetes(format!("Pod watch stream error: {}", e)))?
        {
            match event {
                Event::Init => {
                    debug!("Pod re-list started");
                    pending = Some(Snapshot::new());
                }
                Event::InitApply(pod) => {
                    if let Some(snapshot) = pending.as_mut() {
                        upsert_backend(snapshot, &pod, &self.filter);
                    }
                }
                Event::InitDone => {
                    if let Some(snapshot) = pending.take() {
                        working = snapshot;
                        self.publish(&working);
                        info!(
                            "Initial pod sync complete, {} backend(s) routable",
                            working.len()
                        );
                    }
                }
                Event::Apply(pod) => {
                    upsert_backend(&mut working, &pod, &self.filter);
                    self.publish(&working);
                }
                Event::Delete(pod) => {
                    remove_backend(&mut working, &pod);
                    self.publish(&working);
                }
            }
        }

        Ok(())
    }

    fn publish(&self, snapshot: &Snapshot) {
        self.metrics.backends.set(snapshot.len() as i64);
        self.registry.publish(snapshot.clone());
    }
}

/// Insert or refresh the backend for `pod`. Drops the entry when the pod no
/// longer matches the filter or has no routable address.
pub fn upsert_backend(snapshot: &mut Snapshot, pod: &Pod, filter: &PortFilter) {
    let Some(key) = RouteKey::from_pod(pod) else {
        return;
    };

    match Backend::from_pod(pod, filter) {
        Some(backend) => {
            debug!("Backend {} -> {}", key, backend.addr());
            snapshot.insert(key, backend);
        }
        None => {
            if snapshot.remove(&key).is_some() {
                debug!("Backend {} no longer routable", key);
            }
        }
    }
}

/// Remove the backend for a deleted pod, if it was routable.
pub fn remove_backend(snapshot: &mut Snapshot, pod: &Pod) {
    let Some(key) = RouteKey::from_pod(pod) else {
        return;
    };

    if snapshot.remove(&key).is_some() {
        debug!("Removed backend {}", key);
    }
}
