use crate::{
    document::{document_name, CompiledDocument, Peer, Rule},
    validate::{GlobalRules, ValidatedSpec},
};
use netpol_generator_k8s_api::{DefaultPolicyType, NetworkPolicyGeneratorSpec};

/// Compiles a validated declaration into the documents it owns.
///
/// Under default-allow there is one document per denied namespace, each excluding the whole
/// denied set. Under default-deny there is one document in the generator's own namespace with
/// one peer per allowed namespace; no allowed namespaces means no rules, which blocks all
/// traffic. Global rules are appended after the namespace rules, allow rules before deny rules.
pub fn compile(name: &str, namespace: &str, spec: &ValidatedSpec) -> Vec<CompiledDocument> {
    let (ingress, egress) = match spec.default_policy {
        DefaultPolicyType::Allow => {
            if spec.denied_namespaces.is_empty() {
                return vec![];
            }
            let rule = Rule::peers(vec![Peer::NamespaceNotIn(spec.denied_namespaces.clone())]);
            (vec![rule.clone()], vec![rule])
        }
        DefaultPolicyType::Deny => {
            if spec.allowed_namespaces.is_empty() {
                (vec![], vec![])
            } else {
                let rule = Rule::peers(
                    spec.allowed_namespaces
                        .iter()
                        .cloned()
                        .map(Peer::Namespace)
                        .collect(),
                );
                (vec![rule.clone()], vec![rule])
            }
        }
    };

    let mut template = CompiledDocument {
        namespace: String::new(),
        name: document_name(name),
        ingress,
        egress,
    };
    for globals in [&spec.global_allow, &spec.global_deny] {
        append_global(&mut template, globals);
    }

    target_locations(namespace, spec.default_policy, &spec.denied_namespaces)
        .into_iter()
        .map(|ns| CompiledDocument {
            namespace: ns.to_string(),
            ..template.clone()
        })
        .collect()
}

/// Returns every namespace that may hold a document derived from this declaration.
///
/// This only depends on the default policy and the denied namespaces, so it is usable on a
/// declaration that no longer validates.
pub fn target_namespaces<'s>(namespace: &'s str, spec: &'s NetworkPolicyGeneratorSpec) -> Vec<&'s str> {
    target_locations(
        namespace,
        spec.default_policy.policy_type,
        &spec.denied_namespaces,
    )
}

fn target_locations<'s>(
    namespace: &'s str,
    default_policy: DefaultPolicyType,
    denied: &'s [String],
) -> Vec<&'s str> {
    match default_policy {
        DefaultPolicyType::Deny => vec![namespace],
        DefaultPolicyType::Allow => {
            let mut seen = ahash::AHashSet::with_capacity(denied.len());
            denied
                .iter()
                .map(String::as_str)
                .filter(|ns| seen.insert(*ns))
                .collect()
        }
    }
}

fn append_global(doc: &mut CompiledDocument, globals: &GlobalRules) {
    doc.ingress
        .extend(globals.ingress.iter().copied().map(Rule::any_peer_on));
    doc.egress
        .extend(globals.egress.iter().copied().map(Rule::any_peer_on));
}
