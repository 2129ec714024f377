use ahash::AHashSet as HashSet;
use netpol_generator_k8s_api::TrafficFlow;

/// Supplies the flows observed for workloads in a namespace.
pub trait ObservedTraffic {
    fn observed_traffic(&self, namespace: &str) -> Vec<TrafficFlow>;
}

/// An insertion-ordered set of valid traffic flows.
#[derive(Clone, Debug, Default)]
pub struct FlowSet {
    flows: Vec<TrafficFlow>,
    seen: HashSet<TrafficFlow>,
}

// === impl FlowSet ===

impl FlowSet {
    /// Adds a flow, returning false if it is invalid or already present.
    pub fn insert(&mut self, flow: TrafficFlow) -> bool {
        if !flow.is_valid() || self.seen.contains(&flow) {
            return false;
        }
        self.seen.insert(flow.clone());
        self.flows.push(flow);
        true
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrafficFlow> {
        self.flows.iter()
    }

    pub fn into_vec(self) -> Vec<TrafficFlow> {
        self.flows
    }
}

impl Extend<TrafficFlow> for FlowSet {
    fn extend<I: IntoIterator<Item = TrafficFlow>>(&mut self, iter: I) {
        for flow in iter {
            self.insert(flow);
        }
    }
}

impl FromIterator<TrafficFlow> for FlowSet {
    fn from_iter<I: IntoIterator<Item = TrafficFlow>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}
