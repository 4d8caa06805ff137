use std::sync::Arc;

use fold_hardware::HardwareProbe;
use fold_pipeline::executor::JobExecutor;
use fold_pipeline::registry::JobRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Every job submitted since startup.
    pub registry: Arc<JobRegistry>,
    /// Runs submitted jobs in the background.
    pub executor: Arc<JobExecutor>,
    /// Used by the diagnostics endpoint.
    pub probe: Arc<dyn HardwareProbe>,
}
