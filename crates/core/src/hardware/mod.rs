//! Hardware probing and telemetry domain logic.
//!
//! Pure parsing and classification of the text produced by GPU vendor
//! tooling and the container runtime. Process spawning lives in the
//! `fold-hardware` crate; this module only interprets what came back.

pub mod probe;
pub mod telemetry;

pub use probe::{classify_probe, CommandResult, ProbeOutcome};
pub use telemetry::{
    parse_container_listing, parse_csv_table, parse_utilization, ContainerEntry, GpuTelemetry,
    GpuUtilization,
};
