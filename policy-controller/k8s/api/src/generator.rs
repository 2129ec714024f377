use crate::{duration::K8sDuration, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Describes the access policy a tenant wants for its namespace. The controller compiles it
/// into `NetworkPolicy` objects named `<name>-generated`.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "security.policy.io",
    version = "v1",
    kind = "NetworkPolicyGenerator",
    status = "NetworkPolicyGeneratorStatus",
    shortname = "npg",
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicyGeneratorSpec {
    /// Either `learning` or `enforcing`.
    ///
    /// Kept as a string so that an object with an unrecognized mode can still be read and
    /// reported rather than failing to decode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,

    /// How long to observe traffic before switching to enforcing.
    #[serde(default, skip_serializing_if = "K8sDuration::is_zero")]
    pub duration: K8sDuration,

    #[serde(default)]
    pub default_policy: DefaultPolicy,

    /// Namespaces permitted to communicate when the default policy is `deny`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_namespaces: Vec<String>,

    /// Namespaces cut off when the default policy is `allow`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denied_namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_allow_rules: Option<GlobalRuleSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_deny_rules: Option<GlobalRuleSet>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct DefaultPolicy {
    #[serde(rename = "type", default)]
    pub policy_type: DefaultPolicyType,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicyType {
    Allow,
    #[default]
    Deny,
}

/// Port/protocol pairs applied regardless of namespace identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct GlobalRuleSet {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<GlobalRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<GlobalRule>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct GlobalRule {
    pub port: i32,
    pub protocol: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicyGeneratorStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analyzed: Option<Time>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observed_traffic: Vec<TrafficFlow>,
}

/// The observed lifecycle state, as opposed to the declared `mode`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Phase {
    Learning,
    Enforcing,
}

/// One observed communication between workloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrafficFlow {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_pod: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest_namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest_pod: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default)]
    pub port: i32,
}

// === impl Phase ===

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Learning => f.write_str("Learning"),
            Self::Enforcing => f.write_str("Enforcing"),
        }
    }
}

// === impl DefaultPolicyType ===

impl std::fmt::Display for DefaultPolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

// === impl TrafficFlow ===

impl TrafficFlow {
    /// A flow is usable only when its source and protocol are known and it names a port.
    pub fn is_valid(&self) -> bool {
        !self.source_namespace.is_empty()
            && !self.source_pod.is_empty()
            && !self.protocol.is_empty()
            && self.port > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_manifest() {
        let spec: NetworkPolicyGeneratorSpec = serde_yaml::from_str(
            r#"
mode: learning
duration: 5m
defaultPolicy:
  type: allow
deniedNamespaces: [a, b]
globalAllowRules:
  enabled: true
  ingress:
    - port: 80
      protocol: TCP
"#,
        )
        .expect("spec must decode");

        assert_eq!(spec.mode, "learning");
        assert_eq!(spec.duration.as_duration().as_secs(), 300);
        assert_eq!(spec.default_policy.policy_type, DefaultPolicyType::Allow);
        assert_eq!(spec.denied_namespaces, vec!["a", "b"]);
        let allow = spec.global_allow_rules.expect("allow rules must be set");
        assert!(allow.enabled);
        assert_eq!(
            allow.ingress,
            vec![GlobalRule {
                port: 80,
                protocol: "TCP".to_string()
            }]
        );
        assert!(allow.egress.is_empty());
        assert!(spec.global_deny_rules.is_none());
    }

    #[test]
    fn default_policy_is_deny() {
        let spec: NetworkPolicyGeneratorSpec = serde_json::from_str(r#"{"mode":"enforcing"}"#)
            .expect("spec must decode");
        assert_eq!(spec.default_policy.policy_type, DefaultPolicyType::Deny);
        assert!(spec.duration.is_zero());
    }

    #[test]
    fn unknown_mode_still_decodes() {
        let spec: NetworkPolicyGeneratorSpec =
            serde_json::from_str(r#"{"mode":"auditing"}"#).expect("spec must decode");
        assert_eq!(spec.mode, "auditing");
    }

    #[test]
    fn flow_validity() {
        let flow = TrafficFlow {
            source_namespace: "web".to_string(),
            source_pod: "frontend-0".to_string(),
            protocol: "TCP".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert!(flow.is_valid());
        assert!(!TrafficFlow { port: 0, ..flow.clone() }.is_valid());
        assert!(!TrafficFlow {
            source_pod: String::new(),
            ..flow
        }
        .is_valid());
    }
}
