use axum::routing::get;
use axum::Router;

use crate::handlers::gpu;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/gpu-info", get(gpu::gpu_info))
}
