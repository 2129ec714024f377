use crate::{apply, gc, metrics::ControllerMetrics, render, requeue, Error, Store};
use kube::runtime::controller::Action;
use netpol_generator_core::{compile, validate, Mode, ObservedTraffic, Step};
use netpol_generator_k8s_api::{
    NetworkPolicyGenerator, NetworkPolicyGeneratorStatus, Phase, ResourceExt, Time, FINALIZER,
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

/// Returns the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives a single generator toward its declared state.
pub struct Reconciler<S, T> {
    store: S,
    traffic: T,
    enforcing_poll_interval: Duration,
    clock: Clock,
    metrics: ControllerMetrics,
}

// === impl Reconciler ===

impl<S: Store, T: ObservedTraffic> Reconciler<S, T> {
    pub fn new(
        store: S,
        traffic: T,
        enforcing_poll_interval: Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            store,
            traffic,
            enforcing_poll_interval,
            clock: Arc::new(Utc::now),
            metrics,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one pass for the named generator, returning when it should run again.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, Error> {
        let res = self.reconcile_generator(namespace, name).await;
        self.metrics.reconciled(match &res {
            Ok(_) => "ok",
            Err(e) if e.is_terminal() => "invalid",
            Err(Error::Conflict { .. }) => "conflict",
            Err(_) => "error",
        });
        res
    }

    async fn reconcile_generator(&self, namespace: &str, name: &str) -> Result<Action, Error> {
        let Some(generator) = self.store.get_generator(namespace, name).await? else {
            debug!("generator no longer exists");
            return Ok(Action::await_change());
        };

        if generator.metadata.deletion_timestamp.is_some() {
            if has_finalizer(&generator) {
                gc::collect(&self.store, &generator, &self.metrics).await?;
                let mut generator = generator;
                set_finalizer(&mut generator, false);
                self.store.replace_generator(&generator).await?;
                info!("released generator");
            }
            return Ok(Action::await_change());
        }

        let generator = if has_finalizer(&generator) {
            generator
        } else {
            let mut generator = generator;
            set_finalizer(&mut generator, true);
            self.store.replace_generator(&generator).await?
        };

        let spec = validate(&generator.spec)?;
        let mut status = generator.status.clone().unwrap_or_default();
        let now = (self.clock)();
        let elapsed = status
            .last_analyzed
            .as_ref()
            .map(|Time(since)| elapsed_since(*since, now));
        let step = Step::next(spec.mode, status.phase, elapsed, spec.duration);
        debug!(?step);

        match step {
            Step::EnterLearning { wake_after } => {
                info!(duration = ?spec.duration, "learning");
                status.phase = Some(Phase::Learning);
                status.last_analyzed = Some(Time(now));
                status.observed_traffic = self.traffic.observed_traffic(namespace);
                self.write_status(namespace, name, &status).await?;
                Ok(requeue(wake_after))
            }

            Step::KeepLearning { wake_after } => {
                status.observed_traffic = self.traffic.observed_traffic(namespace);
                self.write_status(namespace, name, &status).await?;
                Ok(requeue(wake_after))
            }

            Step::BeginEnforcing => {
                info!("learning window elapsed; enforcing");
                // The mode is written before the phase. If the phase write is lost, the next
                // pass sees `mode=enforcing` and finishes the transition as an enforcing pass.
                let mut generator = generator;
                generator.spec.mode = Mode::Enforcing.to_string();
                self.store.replace_generator(&generator).await?;

                status.phase = Some(Phase::Enforcing);
                self.write_status(namespace, name, &status).await?;
                Ok(Action::requeue(Duration::ZERO))
            }

            Step::Enforce => {
                for doc in compile(name, namespace, &spec) {
                    let policy = render::network_policy(&generator, doc);
                    apply::apply(&self.store, policy, &self.metrics).await?;
                }
                status.phase = Some(Phase::Enforcing);
                status.last_analyzed = Some(Time(now));
                self.write_status(namespace, name, &status).await?;
                Ok(requeue(self.enforcing_poll_interval))
            }
        }
    }

    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        status: &NetworkPolicyGeneratorStatus,
    ) -> Result<(), Error> {
        self.store
            .patch_generator_status(namespace, name, status)
            .await
    }
}

/// A timestamp in the future counts as no time elapsed.
fn elapsed_since(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or_default()
}

fn has_finalizer(generator: &NetworkPolicyGenerator) -> bool {
    generator.finalizers().iter().any(|f| f == FINALIZER)
}

fn set_finalizer(generator: &mut NetworkPolicyGenerator, present: bool) {
    let finalizers = generator.metadata.finalizers.get_or_insert_with(Vec::new);
    finalizers.retain(|f| f != FINALIZER);
    if present {
        finalizers.push(FINALIZER.to_string());
    }
}
