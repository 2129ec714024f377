use kube::ResourceExt;
use netpol_generator_k8s_api::{self as k8s, TrafficFlow};

/// Environment variable name fragments that mark a value as a service address.
const ADDRESS_HINTS: [&str; 3] = ["host", "url", "endpoint"];

const DEFAULT_PORT: i32 = 80;

/// Derives the flows a pod is expected to take part in.
///
/// Each container port yields an inbound flow with no destination. Each environment variable
/// whose name mentions a host, URL or endpoint yields an outbound TCP flow to the address in
/// its value, read as `<pod>.<namespace>[...][:port]`.
pub fn flows(pod: &k8s::Pod) -> Vec<TrafficFlow> {
    let namespace = pod.namespace().unwrap_or_default();
    let name = pod.name_unchecked();
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();

    let mut flows = Vec::new();
    for container in containers {
        for port in container.ports.iter().flatten() {
            flows.push(TrafficFlow {
                source_namespace: namespace.clone(),
                source_pod: name.clone(),
                protocol: port.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                port: port.container_port,
                ..Default::default()
            });
        }

        for env in container.env.iter().flatten() {
            if let Some(flow) = env_flow(&namespace, &name, env) {
                flows.push(flow);
            }
        }
    }
    flows
}

fn env_flow(namespace: &str, pod: &str, env: &k8s::EnvVar) -> Option<TrafficFlow> {
    let key = env.name.to_ascii_lowercase();
    if !ADDRESS_HINTS.iter().any(|hint| key.contains(hint)) {
        return None;
    }

    let (host, port) = host_and_port(env.value.as_deref()?);
    if host.is_empty() {
        return None;
    }
    let mut labels = host.split('.');
    Some(TrafficFlow {
        source_namespace: namespace.to_string(),
        source_pod: pod.to_string(),
        dest_pod: labels.next().unwrap_or_default().to_string(),
        dest_namespace: labels.next().unwrap_or_default().to_string(),
        protocol: "TCP".to_string(),
        port,
    })
}

/// Splits `host[:port]`. The port defaults to 80 when it is missing or not a number.
fn host_and_port(value: &str) -> (&str, i32) {
    let mut parts = value.split(':');
    let host = parts.next().unwrap_or_default();
    let port = parts
        .next()
        .and_then(|p| p.parse::<i32>().ok())
        .unwrap_or(DEFAULT_PORT);
    (host, port)
}
