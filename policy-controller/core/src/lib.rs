#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod compile;
mod document;
pub mod mode;
mod traffic;
pub mod validate;

#[cfg(test)]
mod tests;

pub use self::{
    compile::{compile, target_namespaces},
    document::{document_name, CompiledDocument, Peer, PortMatch, Protocol, Rule},
    mode::{Mode, Step},
    traffic::{FlowSet, ObservedTraffic},
    validate::{validate, Direction, GlobalRules, ValidatedSpec, ValidationError},
};

/// The field manager recorded on every write made by the controller.
pub const FIELD_MANAGER: &str = "netpol-generator";
