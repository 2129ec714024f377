#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod duration;
pub mod generator;

pub use self::{
    duration::K8sDuration,
    generator::{
        DefaultPolicy, DefaultPolicyType, GlobalRule, GlobalRuleSet, NetworkPolicyGenerator,
        NetworkPolicyGeneratorSpec, NetworkPolicyGeneratorStatus, Phase, TrafficFlow,
    },
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Container, ContainerPort, EnvVar, Namespace, Pod, PodSpec},
        networking::v1::{
            IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule,
            NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec,
        },
    },
    apimachinery::{
        self,
        pkg::{
            apis::meta::v1::{
                LabelSelector, LabelSelectorRequirement, OwnerReference, Time,
            },
            util::intstr::IntOrString,
        },
    },
};
pub use kube::{
    api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams, Resource, ResourceExt},
    error::ErrorResponse,
    Client, Error,
};

/// The finalizer that guards cleanup of generated policies.
pub const FINALIZER: &str = "security.policy.io/finalizer";

/// The label every namespace carries with its own name.
pub const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";
