use crate::{metrics::ControllerMetrics, Error, Store};
use netpol_generator_core::{document_name, target_namespaces};
use netpol_generator_k8s_api::{NetworkPolicyGenerator, ResourceExt};

/// Deletes every document the generator may have produced.
///
/// Candidates are derived from the generator's current spec, not from what exists in the
/// cluster. Absent documents count as deleted. The first other failure stops collection so that
/// the caller keeps the finalizer and retries later.
pub(crate) async fn collect<S: Store + ?Sized>(
    store: &S,
    generator: &NetworkPolicyGenerator,
    metrics: &ControllerMetrics,
) -> Result<(), Error> {
    let namespace = generator.namespace().ok_or(Error::MissingNamespace)?;
    let name = document_name(&generator.name_any());

    for target in target_namespaces(&namespace, &generator.spec) {
        let deleted = store
            .delete_policy(target, &name)
            .await
            .map_err(|error| Error::Cleanup {
                namespace: target.to_string(),
                name: name.clone(),
                source: Box::new(error),
            })?;
        if deleted {
            tracing::debug!(namespace = %target, %name, "deleted policy");
            metrics.deleted();
        }
    }
    Ok(())
}
