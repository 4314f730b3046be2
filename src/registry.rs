use crate::k8s::types::{Backend, RouteKey};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable point-in-time view of the full routing table.
pub type Snapshot = HashMap<RouteKey, Backend>;

/// Concurrently-readable table mapping route keys to backends.
///
/// A single writer (the discovery watcher) replaces the whole snapshot
/// atomically; readers never observe a partially-updated mapping. Absence is
/// reported, never retried here.
pub struct TargetRegistry {
    current: ArcSwap<Snapshot>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::new()),
        }
    }

    /// Atomically replace the current mapping.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Look up the backend for a key in the current snapshot.
    pub fn lookup(&self, key: &RouteKey) -> Option<Backend> {
        self.current.load().get(key).cloned()
    }

    /// Hand out the current snapshot for whole-request consistency.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(ip: &str, port: u16) -> Backend {
        Backend {
            namespace: "default".to_string(),
            pod_name: "app-1".to_string(),
            ip: ip.to_string(),
            port,
            port_name: Some("jolokia".to_string()),
        }
    }

    #[test]
    fn test_lookup_missing_key() {
        let registry = TargetRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.lookup(&RouteKey::new("default", "app-1")).is_none());
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let registry = TargetRegistry::new();
        let key_a = RouteKey::new("default", "app-1");
        let key_b = RouteKey::new("default", "app-2");

        let mut first = Snapshot::new();
        first.insert(key_a.clone(), backend("10.0.0.1", 8778));
        registry.publish(first);
        assert_eq!(registry.len(), 1);

        let mut second = Snapshot::new();
        second.insert(key_b.clone(), backend("10.0.0.2", 8778));
        registry.publish(second);

        assert!(registry.lookup(&key_a).is_none());
        assert_eq!(registry.lookup(&key_b).unwrap().ip, "10.0.0.2");
    }

    #[test]
    fn test_snapshot_is_stable_across_publishes() {
        let registry = TargetRegistry::new();
        let key = RouteKey::new("default", "app-1");

        let mut first = Snapshot::new();
        first.insert(key.clone(), backend("10.0.0.1", 8778));
        registry.publish(first);

        let held = registry.snapshot();
        registry.publish(Snapshot::new());

        // The held snapshot still resolves; new lookups see the empty table.
        assert!(held.contains_key(&key));
        assert!(registry.lookup(&key).is_none());
    }

    #[test]
    fn test_concurrent_lookup_never_observes_torn_backend() {
        let registry = Arc::new(TargetRegistry::new());
        let key = RouteKey::new("default", "app-1");

        let mut s1 = Snapshot::new();
        s1.insert(key.clone(), backend("10.0.0.1", 1111));
        let mut s2 = Snapshot::new();
        s2.insert(key.clone(), backend("10.0.0.2", 2222));

        registry.publish(s1.clone());

        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    let snapshot = if i % 2 == 0 { s2.clone() } else { s1.clone() };
                    registry.publish(snapshot);
                }
            })
        };

        for _ in 0..1000 {
            let found = registry.lookup(&key).expect("key always present");
            let consistent = (found.ip == "10.0.0.1" && found.port == 1111)
                || (found.ip == "10.0.0.2" && found.port == 2222);
            assert!(consistent, "torn backend observed: {:?}", found);
        }

        writer.join().unwrap();
    }
}
