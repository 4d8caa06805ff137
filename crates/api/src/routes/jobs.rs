use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/predict", post(jobs::predict))
        .route("/status/{job_id}", get(jobs::get_status))
        .route("/result/{job_id}", get(jobs::get_result))
}
