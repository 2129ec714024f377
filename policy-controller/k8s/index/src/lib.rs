//! Traffic index
//!
//! Watches `Pod` resources and derives, for each pod, the traffic flows it is expected to take
//! part in: one flow per declared container port and one per environment variable that looks
//! like a service address. Flows are held per pod, so removing a pod drops its flows.
//!
//! ```text
//! [ Pod ] -> [ TrafficFlow ]* -> status.observedTraffic
//! ```
//!
//! The controller reads this index through [`ObservedTraffic`] while a generator is learning.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod metrics;
pub mod pod;


pub use self::metrics::{IndexMetrics, SizedIndex};
use ahash::AHashMap as HashMap;
use kube::ResourceExt;
use kubert::index::NamespacedRemoved;
use netpol_generator_core::{FlowSet, ObservedTraffic};
use netpol_generator_k8s_api::{self as k8s, TrafficFlow};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

pub type SharedIndex = Arc<RwLock<TrafficIndex>>;

/// A read handle on the traffic index.
#[derive(Clone, Debug)]
pub struct Reader(SharedIndex);

/// Holds the flows derived from each pod, by namespace and pod name.
#[derive(Debug, Default)]
pub struct TrafficIndex {
    namespaces: HashMap<String, BTreeMap<String, Vec<TrafficFlow>>>,
}

// === impl TrafficIndex ===

impl TrafficIndex {
    pub fn shared() -> (Reader, SharedIndex) {
        let index = Arc::new(RwLock::new(Self::default()));
        (Reader(index.clone()), index)
    }

    /// Returns the deduplicated flows of every pod in the namespace, ordered by pod name.
    pub fn flows(&self, namespace: &str) -> FlowSet {
        self.namespaces
            .get(namespace)
            .into_iter()
            .flat_map(|pods| pods.values())
            .flatten()
            .cloned()
            .collect()
    }

    fn remove(&mut self, namespace: &str, name: &str) {
        if let Some(pods) = self.namespaces.get_mut(namespace) {
            pods.remove(name);
            if pods.is_empty() {
                self.namespaces.remove(namespace);
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Pod> for TrafficIndex {
    fn apply(&mut self, pod: k8s::Pod) {
        let Some(namespace) = pod.namespace() else {
            tracing::warn!(name = %pod.name_any(), "ignoring pod without a namespace");
            return;
        };
        let name = pod.name_unchecked();
        let flows = pod::flows(&pod);
        tracing::trace!(%namespace, %name, flows = flows.len(), "indexed pod");
        self.namespaces
            .entry(namespace)
            .or_default()
            .insert(name, flows);
    }

    fn delete(&mut self, namespace: String, name: String) {
        tracing::trace!(%namespace, %name, "removing pod");
        self.remove(&namespace, &name);
    }

    fn reset(&mut self, pods: Vec<k8s::Pod>, removed: NamespacedRemoved) {
        for (namespace, names) in removed {
            for name in names {
                self.remove(&namespace, &name);
            }
        }
        for pod in pods {
            self.apply(pod);
        }
    }
}

impl SizedIndex for TrafficIndex {
    fn size(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, BTreeMap::len)
    }

    fn flow_count(&self, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .map_or(0, |pods| pods.values().map(Vec::len).sum())
    }
}

// === impl Reader ===

impl ObservedTraffic for Reader {
    fn observed_traffic(&self, namespace: &str) -> Vec<TrafficFlow> {
        self.0.read().flows(namespace).into_vec()
    }
}
