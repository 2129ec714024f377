use super::*;
use netpol_generator_k8s_api::{
    DefaultPolicy, DefaultPolicyType, GlobalRule, GlobalRuleSet, NetworkPolicyGeneratorSpec,
};
use pretty_assertions::assert_eq;

fn declaration(policy_type: DefaultPolicyType) -> NetworkPolicyGeneratorSpec {
    NetworkPolicyGeneratorSpec {
        mode: "enforcing".to_string(),
        default_policy: DefaultPolicy { policy_type },
        ..Default::default()
    }
}

fn namespaces(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn compiled(spec: &NetworkPolicyGeneratorSpec) -> Vec<CompiledDocument> {
    let validated = validate(spec).expect("declaration must validate");
    compile("web", "tenant", &validated)
}

fn tcp(port: u16) -> PortMatch {
    PortMatch {
        port,
        protocol: Protocol::Tcp,
    }
}

fn http_ingress(enabled: bool) -> Option<GlobalRuleSet> {
    Some(GlobalRuleSet {
        enabled,
        ingress: vec![GlobalRule {
            port: 80,
            protocol: "TCP".to_string(),
        }],
        egress: vec![],
    })
}

#[test]
fn deny_without_allowed_blocks_everything() {
    let docs = compiled(&declaration(DefaultPolicyType::Deny));
    assert_eq!(
        docs,
        vec![CompiledDocument {
            namespace: "tenant".to_string(),
            name: "web-generated".to_string(),
            ingress: vec![],
            egress: vec![],
        }]
    );
}

#[test]
fn deny_peers_follow_declared_order() {
    let spec = NetworkPolicyGeneratorSpec {
        allowed_namespaces: namespaces(&["ns2", "ns1", "ns3"]),
        ..declaration(DefaultPolicyType::Deny)
    };
    let docs = compiled(&spec);
    assert_eq!(docs.len(), 1);

    let expected = Rule {
        peers: vec![
            Peer::Namespace("ns2".to_string()),
            Peer::Namespace("ns1".to_string()),
            Peer::Namespace("ns3".to_string()),
        ],
        ports: vec![],
    };
    assert_eq!(docs[0].ingress, vec![expected.clone()]);
    assert_eq!(docs[0].egress, vec![expected]);
}

#[test]
fn allow_emits_one_document_per_denied_namespace() {
    let spec = NetworkPolicyGeneratorSpec {
        denied_namespaces: namespaces(&["a", "b", "c"]),
        ..declaration(DefaultPolicyType::Allow)
    };
    let docs = compiled(&spec);

    assert_eq!(
        docs.iter().map(|d| d.namespace.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
    let exclusion = Rule {
        peers: vec![Peer::NamespaceNotIn(namespaces(&["a", "b", "c"]))],
        ports: vec![],
    };
    for doc in &docs {
        assert_eq!(doc.name, "web-generated");
        assert_eq!(doc.ingress, vec![exclusion.clone()]);
        assert_eq!(doc.egress, vec![exclusion.clone()]);
    }
}

#[test]
fn allow_without_denied_emits_nothing() {
    assert!(compiled(&declaration(DefaultPolicyType::Allow)).is_empty());
}

#[test]
fn duplicate_denied_namespace_targets_once() {
    let spec = NetworkPolicyGeneratorSpec {
        denied_namespaces: namespaces(&["a", "b", "a"]),
        ..declaration(DefaultPolicyType::Allow)
    };
    let docs = compiled(&spec);
    assert_eq!(docs.len(), 2);
    assert_eq!(target_namespaces("tenant", &spec), vec!["a", "b"]);
}

#[test]
fn compilation_is_deterministic() {
    let spec = NetworkPolicyGeneratorSpec {
        allowed_namespaces: namespaces(&["x", "y"]),
        global_allow_rules: http_ingress(true),
        global_deny_rules: Some(GlobalRuleSet {
            enabled: true,
            ingress: vec![],
            egress: vec![GlobalRule {
                port: 53,
                protocol: "UDP".to_string(),
            }],
        }),
        ..declaration(DefaultPolicyType::Deny)
    };
    assert_eq!(compiled(&spec), compiled(&spec));
}

#[test]
fn global_allow_appends_open_rule() {
    let base = NetworkPolicyGeneratorSpec {
        allowed_namespaces: namespaces(&["ns1"]),
        ..declaration(DefaultPolicyType::Deny)
    };
    let enabled = NetworkPolicyGeneratorSpec {
        global_allow_rules: http_ingress(true),
        ..base.clone()
    };

    let docs = compiled(&enabled);
    assert_eq!(docs[0].ingress.len(), 2);
    assert_eq!(
        docs[0].ingress[0].peers,
        vec![Peer::Namespace("ns1".to_string())]
    );
    assert_eq!(
        docs[0].ingress[1],
        Rule {
            peers: vec![Peer::Any],
            ports: vec![tcp(80)],
        }
    );
    assert_eq!(docs[0].egress.len(), 1);

    let disabled = NetworkPolicyGeneratorSpec {
        global_allow_rules: http_ingress(false),
        ..base.clone()
    };
    assert_eq!(compiled(&disabled), compiled(&base));
}

#[test]
fn global_rules_apply_to_every_document() {
    let spec = NetworkPolicyGeneratorSpec {
        denied_namespaces: namespaces(&["a", "b"]),
        global_allow_rules: http_ingress(true),
        global_deny_rules: Some(GlobalRuleSet {
            enabled: true,
            ingress: vec![GlobalRule {
                port: 22,
                protocol: "TCP".to_string(),
            }],
            egress: vec![],
        }),
        ..declaration(DefaultPolicyType::Allow)
    };
    for doc in compiled(&spec) {
        assert_eq!(
            doc.ingress[1..].to_vec(),
            vec![
                Rule {
                    peers: vec![Peer::Any],
                    ports: vec![tcp(80)],
                },
                Rule {
                    peers: vec![Peer::Any],
                    ports: vec![tcp(22)],
                },
            ]
        );
    }
}

#[test]
fn deny_targets_own_namespace() {
    let spec = NetworkPolicyGeneratorSpec {
        denied_namespaces: namespaces(&["ignored"]),
        ..declaration(DefaultPolicyType::Deny)
    };
    assert_eq!(target_namespaces("tenant", &spec), vec!["tenant"]);
}

#[test]
fn targets_ignore_validity() {
    let spec = NetworkPolicyGeneratorSpec {
        mode: "unknown".to_string(),
        denied_namespaces: namespaces(&["a", "b"]),
        ..declaration(DefaultPolicyType::Allow)
    };
    assert!(validate(&spec).is_err());
    assert_eq!(target_namespaces("tenant", &spec), vec!["a", "b"]);
}

#[test]
fn document_names() {
    assert_eq!(document_name("x"), "x-generated");
}
