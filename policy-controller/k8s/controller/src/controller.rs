use crate::{requeue, Error, KubeStore, Reconciler};
use futures::prelude::*;
use kube::runtime::{
    controller::{Action, Controller},
    watcher,
};
use kubert::lease::Claim;
use netpol_generator_core::ObservedTraffic;
use netpol_generator_k8s_api::{Api, Client, NetworkPolicy, NetworkPolicyGenerator, ResourceExt};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct Config {
    /// How long to wait before retrying a pass that failed with a transient error.
    pub error_requeue: Duration,
}

/// Restricts reconciliation to the replica holding the write lease.
#[derive(Clone, Debug)]
pub struct Leadership {
    pub claims: watch::Receiver<Arc<Claim>>,
    pub hostname: String,
    pub lease_duration: Duration,
}

struct Context<T> {
    reconciler: Reconciler<KubeStore, T>,
    leadership: Option<Leadership>,
    config: Config,
}

/// Reconciles every generator in the cluster until `drain` is signaled.
pub async fn run<T>(
    client: Client,
    reconciler: Reconciler<KubeStore, T>,
    config: Config,
    leadership: Option<Leadership>,
    drain: drain::Watch,
) where
    T: ObservedTraffic + Send + Sync + 'static,
{
    let generators = Api::<NetworkPolicyGenerator>::all(client.clone());
    let policies = Api::<NetworkPolicy>::all(client);
    let ctx = Arc::new(Context {
        reconciler,
        leadership,
        config,
    });

    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
    let controller = Controller::new(generators, watcher::Config::default())
        .owns(policies, watcher::Config::default())
        .graceful_shutdown_on(close_rx.map(|_| ()))
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!(generator = %obj, ?action, "reconciled"),
                Err(error) => warn!(%error, "reconcile failed"),
            }
        });
    tokio::pin!(controller);

    info!("generator controller running");
    tokio::select! {
        _ = &mut controller => {}
        handle = drain.signaled() => {
            let _ = close_tx.send(());
            handle.release_after(controller).await;
        }
    }
}

async fn reconcile<T>(
    generator: Arc<NetworkPolicyGenerator>,
    ctx: Arc<Context<T>>,
) -> Result<Action, Error>
where
    T: ObservedTraffic + Send + Sync + 'static,
{
    if let Some(Leadership {
        claims,
        hostname,
        lease_duration,
    }) = &ctx.leadership
    {
        if !claims.borrow().is_current_for(hostname) {
            debug!(generator = %generator.name_any(), "not the lease holder; skipping");
            return Ok(requeue(*lease_duration));
        }
    }

    let namespace = generator.namespace().ok_or(Error::MissingNamespace)?;
    ctx.reconciler
        .reconcile(&namespace, &generator.name_any())
        .await
}

fn error_policy<T>(
    generator: Arc<NetworkPolicyGenerator>,
    error: &Error,
    ctx: Arc<Context<T>>,
) -> Action {
    let action = on_error(error, &ctx.config);
    if error.is_terminal() {
        warn!(
            generator = %generator.name_any(),
            namespace = ?generator.namespace(),
            %error,
            "generator is invalid; waiting for a change"
        );
    } else {
        warn!(
            generator = %generator.name_any(),
            namespace = ?generator.namespace(),
            %error,
            "reconcile failed; retrying"
        );
    }
    action
}

/// Invalid generators wait for an edit; every other failure is retried after a fixed delay.
fn on_error(error: &Error, config: &Config) -> Action {
    if error.is_terminal() {
        return Action::await_change();
    }
    requeue(config.error_requeue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_generator_core::ValidationError;

    const CONFIG: Config = Config {
        error_requeue: Duration::from_secs(15),
    };

    #[test]
    fn invalid_waits_for_change() {
        let error = Error::Invalid(ValidationError::InvalidMode("auditing".to_string()));
        assert_eq!(on_error(&error, &CONFIG), Action::await_change());

        let error = Error::Invalid(ValidationError::NamespaceOverlap("shared".to_string()));
        assert_eq!(on_error(&error, &CONFIG), Action::await_change());
    }

    #[test]
    fn transient_errors_retry() {
        let conflict = Error::Conflict {
            kind: "NetworkPolicy".to_string(),
            namespace: "tenant".to_string(),
            name: "web-generated".to_string(),
        };
        assert_eq!(
            on_error(&conflict, &CONFIG),
            Action::requeue(Duration::from_secs(15))
        );

        let cleanup = Error::Cleanup {
            namespace: "b".to_string(),
            name: "web-generated".to_string(),
            source: Box::new(Error::MissingNamespace),
        };
        assert_eq!(
            on_error(&cleanup, &CONFIG),
            Action::requeue(Duration::from_secs(15))
        );
    }
}
