use netpol_generator_core::{CompiledDocument, Peer, PortMatch, Rule};
use netpol_generator_k8s_api::{
    IPBlock, IntOrString, LabelSelector, LabelSelectorRequirement, NetworkPolicy,
    NetworkPolicyEgressRule, NetworkPolicyGenerator, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec, ObjectMeta, OwnerReference, Resource,
    NAMESPACE_NAME_LABEL,
};

const ANY_ADDRESS: &str = "0.0.0.0/0";

/// Renders a compiled document as a `NetworkPolicy` owned by the generator.
pub(crate) fn network_policy(
    generator: &NetworkPolicyGenerator,
    doc: CompiledDocument,
) -> NetworkPolicy {
    NetworkPolicy {
        metadata: ObjectMeta {
            namespace: Some(doc.namespace),
            name: Some(doc.name),
            owner_references: Some(vec![owner_reference(generator)]),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector::default(),
            policy_types: Some(vec!["Ingress".to_string(), "Egress".to_string()]),
            ingress: Some(doc.ingress.into_iter().map(ingress_rule).collect()),
            egress: Some(doc.egress.into_iter().map(egress_rule).collect()),
        }),
        ..Default::default()
    }
}

fn owner_reference(generator: &NetworkPolicyGenerator) -> OwnerReference {
    OwnerReference {
        api_version: NetworkPolicyGenerator::api_version(&()).to_string(),
        kind: NetworkPolicyGenerator::kind(&()).to_string(),
        name: generator.metadata.name.clone().unwrap_or_default(),
        uid: generator.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn ingress_rule(Rule { peers, ports }: Rule) -> NetworkPolicyIngressRule {
    NetworkPolicyIngressRule {
        from: non_empty(peers.into_iter().map(peer).collect()),
        ports: non_empty(ports.into_iter().map(port).collect()),
    }
}

fn egress_rule(Rule { peers, ports }: Rule) -> NetworkPolicyEgressRule {
    NetworkPolicyEgressRule {
        to: non_empty(peers.into_iter().map(peer).collect()),
        ports: non_empty(ports.into_iter().map(port).collect()),
    }
}

fn peer(peer: Peer) -> NetworkPolicyPeer {
    match peer {
        Peer::Namespace(ns) => NetworkPolicyPeer {
            namespace_selector: Some(LabelSelector {
                match_labels: Some([(NAMESPACE_NAME_LABEL.to_string(), ns)].into_iter().collect()),
                ..Default::default()
            }),
            ..Default::default()
        },
        Peer::NamespaceNotIn(values) => NetworkPolicyPeer {
            namespace_selector: Some(LabelSelector {
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: NAMESPACE_NAME_LABEL.to_string(),
                    operator: "NotIn".to_string(),
                    values: Some(values),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
        Peer::Any => NetworkPolicyPeer {
            ip_block: Some(IPBlock {
                cidr: ANY_ADDRESS.to_string(),
                except: None,
            }),
            ..Default::default()
        },
    }
}

fn port(PortMatch { port, protocol }: PortMatch) -> NetworkPolicyPort {
    NetworkPolicyPort {
        port: Some(IntOrString::Int(port.into())),
        protocol: Some(protocol.to_string()),
        end_port: None,
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_generator_core::Protocol;
    use pretty_assertions::assert_eq;

    fn generator() -> NetworkPolicyGenerator {
        let mut generator = NetworkPolicyGenerator::new("web", Default::default());
        generator.metadata.namespace = Some("tenant".to_string());
        generator.metadata.uid = Some("uid-1".to_string());
        generator
    }

    #[test]
    fn renders_owned_policy() {
        let doc = CompiledDocument {
            namespace: "tenant".to_string(),
            name: "web-generated".to_string(),
            ingress: vec![
                Rule {
                    peers: vec![Peer::Namespace("ns1".to_string())],
                    ports: vec![],
                },
                Rule {
                    peers: vec![Peer::Any],
                    ports: vec![PortMatch {
                        port: 80,
                        protocol: Protocol::Tcp,
                    }],
                },
            ],
            egress: vec![Rule {
                peers: vec![Peer::NamespaceNotIn(vec!["a".to_string(), "b".to_string()])],
                ports: vec![],
            }],
        };

        let policy = network_policy(&generator(), doc);
        assert_eq!(
            policy.metadata.owner_references,
            Some(vec![OwnerReference {
                api_version: "security.policy.io/v1".to_string(),
                kind: "NetworkPolicyGenerator".to_string(),
                name: "web".to_string(),
                uid: "uid-1".to_string(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            }])
        );

        let spec = policy.spec.expect("policy must have a spec");
        assert_eq!(spec.pod_selector, LabelSelector::default());
        assert_eq!(
            spec.policy_types,
            Some(vec!["Ingress".to_string(), "Egress".to_string()])
        );

        let ingress = spec.ingress.expect("ingress must be set");
        assert_eq!(
            ingress[0].from.as_ref().unwrap()[0]
                .namespace_selector
                .as_ref()
                .unwrap()
                .match_labels,
            Some(maplit::btreemap! {
                "kubernetes.io/metadata.name".to_string() => "ns1".to_string(),
            })
        );
        assert_eq!(ingress[0].ports, None);
        assert_eq!(
            ingress[1].from.as_ref().unwrap()[0].ip_block,
            Some(IPBlock {
                cidr: "0.0.0.0/0".to_string(),
                except: None,
            })
        );
        assert_eq!(
            ingress[1].ports,
            Some(vec![NetworkPolicyPort {
                port: Some(IntOrString::Int(80)),
                protocol: Some("TCP".to_string()),
                end_port: None,
            }])
        );

        let egress = spec.egress.expect("egress must be set");
        let selector = egress[0].to.as_ref().unwrap()[0]
            .namespace_selector
            .clone()
            .unwrap();
        assert_eq!(
            selector.match_expressions,
            Some(vec![LabelSelectorRequirement {
                key: "kubernetes.io/metadata.name".to_string(),
                operator: "NotIn".to_string(),
                values: Some(vec!["a".to_string(), "b".to_string()]),
            }])
        );
    }

    #[test]
    fn empty_rule_lists_stay_empty() {
        let doc = CompiledDocument {
            namespace: "tenant".to_string(),
            name: "web-generated".to_string(),
            ingress: vec![],
            egress: vec![],
        };
        let spec = network_policy(&generator(), doc).spec.unwrap();
        assert_eq!(spec.ingress, Some(vec![]));
        assert_eq!(spec.egress, Some(vec![]));
    }
}
