//! Generator controller
//!
//! Reconciles `NetworkPolicyGenerator` resources. Each pass fetches the generator, keeps its
//! finalizer in place, advances its learning/enforcing lifecycle and, while enforcing, applies
//! the compiled `NetworkPolicy` documents. When a generator is deleted, every document it may
//! have produced is removed before the finalizer is released.
//!
//! ```text
//! [ NetworkPolicyGenerator ] -> Step -> compile -> [ NetworkPolicy ]* -> status
//! ```
//!
//! All reads and writes go through a [`Store`], so the reconciler can be driven against an
//! in-memory store in tests.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod apply;
mod controller;
mod gc;
mod metrics;
mod reconcile;
mod render;
mod store;


pub use self::{
    controller::{run, Config, Leadership},
    metrics::ControllerMetrics,
    reconcile::{Clock, Reconciler},
    store::{KubeStore, Store},
};
use kube::runtime::controller::Action;
use netpol_generator_core::ValidationError;
use netpol_generator_k8s_api as k8s;
use std::time::Duration;

/// The longest delay handed to the controller's scheduler. Longer waits are split into
/// several passes, each of which re-reads `lastAnalyzed`.
pub const MAX_REQUEUE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid generator: {0}")]
    Invalid(#[from] ValidationError),

    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("resource has no namespace")]
    MissingNamespace,

    #[error("failed to delete {namespace}/{name}: {source}")]
    Cleanup {
        namespace: String,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Kube(#[from] k8s::Error),
}

// === impl Error ===

impl Error {
    /// Maps a `409 Conflict` response from a write to [`Error::Conflict`].
    pub(crate) fn from_write<K>(error: k8s::Error, namespace: &str, name: &str) -> Self
    where
        K: k8s::Resource<DynamicType = ()>,
    {
        match error {
            k8s::Error::Api(response) if response.code == 409 => Self::Conflict {
                kind: K::kind(&()).to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            error => Self::Kube(error),
        }
    }

    /// Invalid declarations cannot succeed until the generator is edited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// Schedules the next pass, never further out than [`MAX_REQUEUE`].
pub(crate) fn requeue(after: Duration) -> Action {
    Action::requeue(after.min(MAX_REQUEUE))
}
