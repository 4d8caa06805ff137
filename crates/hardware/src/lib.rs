//! `fold-hardware` library crate.
//!
//! Shells out to GPU vendor tooling and the container runtime to answer
//! availability questions, sample utilization while jobs run, and list
//! the GPU inventory for the diagnostics endpoint.

pub mod command;
pub mod inventory;
pub mod probe;

pub use command::DiagnosticCommand;
pub use probe::{HardwareProbe, NvidiaSmiProbe};
