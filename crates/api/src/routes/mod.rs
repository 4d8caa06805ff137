pub mod gpu;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the job and diagnostics route tree.
///
/// ```text
/// POST /predict                 submit a folding job
/// GET  /status/{job_id}         job record
/// GET  /result/{job_id}         top-ranked model (attachment)
/// GET  /gpu-info                accelerator diagnostics
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(jobs::router()).merge(gpu::router())
}
