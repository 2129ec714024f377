use crate::{metrics::ControllerMetrics, Error, Store};
use netpol_generator_k8s_api::{NetworkPolicy, ResourceExt};
use tracing::{debug, info};

/// Creates the policy, or replaces the existing one carrying its current `resourceVersion`.
///
/// A write that conflicts with a concurrent change is retried once against a freshly read
/// version; a second conflict is returned to the caller.
pub(crate) async fn apply<S: Store + ?Sized>(
    store: &S,
    desired: NetworkPolicy,
    metrics: &ControllerMetrics,
) -> Result<(), Error> {
    match write(store, &desired, metrics).await {
        Err(Error::Conflict { .. }) => {
            debug!(namespace = ?desired.namespace(), name = %desired.name_any(), "retrying after conflict");
            metrics.conflict();
            write(store, &desired, metrics).await
        }
        res => res,
    }
}

async fn write<S: Store + ?Sized>(
    store: &S,
    desired: &NetworkPolicy,
    metrics: &ControllerMetrics,
) -> Result<(), Error> {
    let namespace = desired.namespace().ok_or(Error::MissingNamespace)?;
    let name = desired.name_any();

    match store.get_policy(&namespace, &name).await? {
        None => {
            store.create_policy(desired).await?;
            info!(%namespace, %name, "created policy");
            metrics.applied("created");
        }
        Some(existing) => {
            let mut policy = desired.clone();
            policy.metadata.resource_version = existing.resource_version();
            store.replace_policy(&policy).await?;
            debug!(%namespace, %name, "updated policy");
            metrics.applied("updated");
        }
    }
    Ok(())
}
