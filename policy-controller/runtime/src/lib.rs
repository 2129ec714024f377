#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_generator_core as core;
pub use netpol_generator_k8s_api as k8s;
pub use netpol_generator_k8s_controller as controller;
pub use netpol_generator_k8s_index as index;

mod admission;
mod args;
mod lease;

pub use self::args::Args;
