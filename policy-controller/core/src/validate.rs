//! Structural checks on a generator declaration.
//!
//! A declaration that passes is turned into a [`ValidatedSpec`], the only input the compiler
//! accepts.

use crate::{
    document::{PortMatch, Protocol},
    mode::Mode,
};
use netpol_generator_k8s_api::{
    DefaultPolicyType, GlobalRule, GlobalRuleSet, NetworkPolicyGeneratorSpec,
};
use std::{fmt, time::Duration};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedSpec {
    pub mode: Mode,
    pub duration: Duration,
    pub default_policy: DefaultPolicyType,
    pub allowed_namespaces: Vec<String>,
    pub denied_namespaces: Vec<String>,
    pub global_allow: GlobalRules,
    pub global_deny: GlobalRules,
}

/// The port matches of an enabled global rule set. A disabled or absent set is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalRules {
    pub ingress: Vec<PortMatch>,
    pub egress: Vec<PortMatch>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid mode {0:?}: must be one of learning or enforcing")]
    InvalidMode(String),

    #[error("namespace {0} cannot be both allowed and denied")]
    NamespaceOverlap(String),

    #[error("{direction} port {port} is out of valid range (1-65535)")]
    InvalidPort { direction: Direction, port: i32 },

    #[error("invalid {direction} protocol {protocol:?}: must be one of TCP, UDP or SCTP")]
    InvalidProtocol {
        direction: Direction,
        protocol: String,
    },

    #[error("duration must not be negative: {0}")]
    InvalidDuration(String),
}

/// Checks a declaration, in order: mode, namespace overlap (default-deny only), global rule
/// ports and protocols, and duration.
pub fn validate(spec: &NetworkPolicyGeneratorSpec) -> Result<ValidatedSpec, ValidationError> {
    let mode = spec
        .mode
        .parse::<Mode>()
        .map_err(|_| ValidationError::InvalidMode(spec.mode.clone()))?;

    let default_policy = spec.default_policy.policy_type;
    if default_policy == DefaultPolicyType::Deny {
        if let Some(ns) = spec
            .allowed_namespaces
            .iter()
            .find(|ns| spec.denied_namespaces.contains(ns))
        {
            return Err(ValidationError::NamespaceOverlap(ns.clone()));
        }
    }

    let global_allow = GlobalRules::validate(spec.global_allow_rules.as_ref())?;
    let global_deny = GlobalRules::validate(spec.global_deny_rules.as_ref())?;

    if spec.duration.is_negative() {
        return Err(ValidationError::InvalidDuration(spec.duration.to_string()));
    }

    Ok(ValidatedSpec {
        mode,
        duration: spec.duration.as_duration(),
        default_policy,
        allowed_namespaces: spec.allowed_namespaces.clone(),
        denied_namespaces: spec.denied_namespaces.clone(),
        global_allow,
        global_deny,
    })
}

// === impl GlobalRules ===

impl GlobalRules {
    /// Every declared rule is checked, even in a disabled set, so that enabling a set later
    /// cannot surface an error that was accepted earlier.
    fn validate(set: Option<&GlobalRuleSet>) -> Result<Self, ValidationError> {
        let Some(set) = set else {
            return Ok(Self::default());
        };

        let ingress = Self::port_matches(Direction::Ingress, &set.ingress)?;
        let egress = Self::port_matches(Direction::Egress, &set.egress)?;
        if !set.enabled {
            return Ok(Self::default());
        }
        Ok(Self { ingress, egress })
    }

    fn port_matches(
        direction: Direction,
        rules: &[GlobalRule],
    ) -> Result<Vec<PortMatch>, ValidationError> {
        rules
            .iter()
            .map(|GlobalRule { port, protocol }| {
                let port = u16::try_from(*port)
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or(ValidationError::InvalidPort {
                        direction,
                        port: *port,
                    })?;
                let protocol = protocol.parse::<Protocol>().map_err(|_| {
                    ValidationError::InvalidProtocol {
                        direction,
                        protocol: protocol.clone(),
                    }
                })?;
                Ok(PortMatch { port, protocol })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty() && self.egress.is_empty()
    }
}

// === impl Direction ===

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => f.write_str("ingress"),
            Self::Egress => f.write_str("egress"),
        }
    }
}
