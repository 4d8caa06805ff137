//! Job execution pipeline.
//!
//! The [`JobRegistry`](registry::JobRegistry) holds every job's record,
//! the [`Supervisor`](supervisor::Supervisor) runs the folding tool for one
//! job, the [`TelemetryMonitor`](telemetry::TelemetryMonitor) samples GPU
//! utilization while it runs, and the [`JobExecutor`](executor::JobExecutor)
//! bounds how many jobs run at once.

pub mod config;
pub mod executor;
pub mod registry;
pub mod supervisor;
pub mod telemetry;
