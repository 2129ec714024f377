use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct ControllerMetrics {
    reconciles: Family<OutcomeLabels, Counter>,
    applies: Family<OperationLabels, Counter>,
    deletes: Counter,
    conflicts: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OperationLabels {
    operation: &'static str,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "reconciles",
            "Count of generator reconciliations by outcome",
            metrics.reconciles.clone(),
        );
        prom.register(
            "policy_applies",
            "Count of generated policies written by operation",
            metrics.applies.clone(),
        );
        prom.register(
            "policy_deletes",
            "Count of generated policies deleted",
            metrics.deletes.clone(),
        );
        prom.register(
            "policy_conflicts",
            "Count of policy writes retried after a conflict",
            metrics.conflicts.clone(),
        );
        metrics
    }

    pub(crate) fn reconciled(&self, outcome: &'static str) {
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }

    pub(crate) fn applied(&self, operation: &'static str) {
        self.applies
            .get_or_create(&OperationLabels { operation })
            .inc();
    }

    pub(crate) fn deleted(&self) {
        self.deletes.inc();
    }

    pub(crate) fn conflict(&self) {
        self.conflicts.inc();
    }
}
