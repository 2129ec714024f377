use crate::{
    admission::Admission,
    controller::{self, ControllerMetrics, KubeStore, Leadership, Reconciler},
    index::{IndexMetrics, TrafficIndex},
    k8s::{self, K8sDuration},
    lease,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "netpol-generator", about = "A NetworkPolicy generator controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "netpol_generator=info,warn",
        env = "NETPOL_GENERATOR_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// How often enforcing generators are reapplied when nothing has changed.
    #[clap(long, default_value = "5m")]
    enforcing_poll_interval: K8sDuration,

    /// How long to wait before retrying a reconciliation that failed.
    #[clap(long, default_value = "15s")]
    error_requeue: K8sDuration,

    #[clap(long, default_value = "netpol-generator")]
    controller_deployment_name: String,

    #[clap(long, default_value = "netpol-generator")]
    controller_namespace: String,

    /// Reconciles on every replica instead of only the holder of the write lease.
    #[clap(long)]
    lease_disabled: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            enforcing_poll_interval,
            error_requeue,
            controller_deployment_name,
            controller_namespace,
            lease_disabled,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let (traffic, traffic_index) = TrafficIndex::shared();

        let mut prom = <Registry>::default();
        let traffic_index = IndexMetrics::register(
            traffic_index,
            prom.sub_registry_with_prefix("traffic_index"),
        )
        .shared();
        let controller_metrics =
            ControllerMetrics::register(prom.sub_registry_with_prefix("generator"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let leadership = if lease_disabled {
            info!("write lease disabled; reconciling on every replica");
            None
        } else {
            let hostname = std::env::var("HOSTNAME")
                .context("failed to fetch `HOSTNAME` environment variable")?;
            let claims = lease::init(
                &runtime,
                &controller_namespace,
                &controller_deployment_name,
                &hostname,
            )
            .await?;
            Some(Leadership {
                claims,
                hostname,
                lease_duration: lease::LEASE_DURATION,
            })
        };

        // Spawn the pod watch that feeds observed traffic to learning generators.
        let pods = runtime.watch_all::<k8s::Pod>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(traffic_index, pods).instrument(info_span!("pods")),
        );

        let client = runtime.client();
        let reconciler = Reconciler::new(
            KubeStore::new(client.clone()),
            traffic,
            enforcing_poll_interval.into(),
            controller_metrics,
        );
        tokio::spawn(
            controller::run(
                client,
                reconciler,
                controller::Config {
                    error_requeue: error_requeue.into(),
                },
                leadership,
                runtime.shutdown_handle(),
            )
            .instrument(info_span!("generators")),
        );

        let runtime = runtime.spawn_server(Admission::new);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
