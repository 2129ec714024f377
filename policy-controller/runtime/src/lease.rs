use crate::{
    core::FIELD_MANAGER,
    k8s::{self, api::apps::v1::Deployment, ObjectMeta, PostParams, Resource},
};
use anyhow::{Context, Result};
use k8s_openapi::api::coordination::v1::Lease;
use kubert::lease::{Claim, ClaimParams, LeaseManager};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

pub(crate) const LEASE_DURATION: Duration = Duration::from_secs(30);
const LEASE_NAME: &str = "netpol-generator-write";
const RENEW_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Ensures the write lease exists and competes for it as `hostname`.
///
/// Only the holder reconciles generators, so replicas never race on the same policies.
pub async fn init<T>(
    runtime: &kubert::Runtime<T>,
    ns: &str,
    deployment_name: &str,
    hostname: &str,
) -> Result<watch::Receiver<Arc<Claim>>> {
    let deployment = k8s::Api::<Deployment>::namespaced(runtime.client(), ns)
        .get(deployment_name)
        .await
        .with_context(|| format!("failed to fetch deployment {ns}/{deployment_name}"))?;

    let api = k8s::Api::<Lease>::namespaced(runtime.client(), ns);
    let params = PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    };
    match api.create(&params, &lease_for(&deployment, ns)?).await {
        Ok(_) => tracing::info!(lease = LEASE_NAME, "created write lease"),
        Err(k8s::Error::Api(rsp)) if rsp.code == 409 => {
            tracing::debug!(lease = LEASE_NAME, "write lease exists")
        }
        Err(error) => return Err(error.into()),
    }

    let (claims, _task) = LeaseManager::init(api, LEASE_NAME)
        .await?
        .spawn(
            hostname,
            ClaimParams {
                lease_duration: LEASE_DURATION,
                renew_grace_period: RENEW_GRACE_PERIOD,
            },
        )
        .await?;
    Ok(claims)
}

/// An unclaimed lease, removed together with the controller's deployment.
fn lease_for(deployment: &Deployment, ns: &str) -> Result<Lease> {
    let owner = deployment
        .controller_owner_ref(&())
        .context("controller deployment has no uid")?;
    Ok(Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(ns.to_string()),
            owner_references: Some(vec![owner]),
            labels: Some(
                [(
                    "app.kubernetes.io/managed-by".to_string(),
                    FIELD_MANAGER.to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(uid: Option<&str>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                namespace: Some("netpol".to_string()),
                name: Some("netpol-generator".to_string()),
                uid: uid.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn lease_is_owned_by_deployment() {
        let lease = lease_for(&deployment(Some("5e2c")), "netpol").expect("lease must build");
        assert_eq!(lease.metadata.name.as_deref(), Some(LEASE_NAME));
        assert_eq!(lease.metadata.namespace.as_deref(), Some("netpol"));
        assert_eq!(lease.metadata.resource_version, None);
        assert!(lease.spec.is_none(), "a new lease must be unclaimed");

        let owners = lease.metadata.owner_references.expect("owner must be set");
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Deployment");
        assert_eq!(owners[0].name, "netpol-generator");
        assert_eq!(owners[0].uid, "5e2c");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn deployment_without_uid_is_an_error() {
        assert!(lease_for(&deployment(None), "netpol").is_err());
    }
}
