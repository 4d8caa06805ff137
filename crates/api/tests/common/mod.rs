#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use fold_cloud::{Destination, ObjectStore, Publisher, UploadError};
use fold_core::hardware::{GpuTelemetry, ProbeOutcome};
use fold_hardware::HardwareProbe;
use fold_pipeline::config::{FoldingTool, PipelineConfig};
use fold_pipeline::executor::JobExecutor;
use fold_pipeline::registry::JobRegistry;
use fold_pipeline::supervisor::Supervisor;
use http_body_util::BodyExt;
use tower::ServiceExt;

use fold_api::config::ServerConfig;
use fold_api::router::build_app_router;
use fold_api::state::AppState;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub struct FakeProbe;

#[async_trait]
impl HardwareProbe for FakeProbe {
    async fn probe_accelerator(&self) -> ProbeOutcome {
        ProbeOutcome::available("NVIDIA A100-SXM4-40GB")
    }

    async fn probe_container_runtime(&self) -> ProbeOutcome {
        ProbeOutcome::available("NVIDIA A100-SXM4-40GB")
    }

    async fn sample_telemetry(&self) -> Option<GpuTelemetry> {
        None
    }
}

/// Probe whose container runtime check hangs, like a first `docker run`
/// pulling the CUDA image.
pub struct HangingRuntimeProbe;

#[async_trait]
impl HardwareProbe for HangingRuntimeProbe {
    async fn probe_accelerator(&self) -> ProbeOutcome {
        ProbeOutcome::available("NVIDIA A100-SXM4-40GB")
    }

    async fn probe_container_runtime(&self) -> ProbeOutcome {
        tokio::time::sleep(Duration::from_secs(300)).await;
        ProbeOutcome::available("NVIDIA A100-SXM4-40GB")
    }

    async fn sample_telemetry(&self) -> Option<GpuTelemetry> {
        None
    }
}

pub struct NoopStore;

#[async_trait]
impl ObjectStore for NoopStore {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn put(&self, _local: &Path, _destination: &Destination) -> Result<(), UploadError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Folding tool stand-ins
// ---------------------------------------------------------------------------

/// Writes a result directory containing `ranked_0.pdb`.
pub const SUCCESS_SCRIPT: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --output_dir=*) OUT="${arg#--output_dir=}" ;;
  esac
done
echo "Found device: device:GPU:0"
echo "Running model model_1"
mkdir -p "$OUT/seq"
echo "Using GPU" > "$OUT/seq/log.txt"
printf 'ATOM      1  N   MET A   1\n' > "$OUT/seq/ranked_0.pdb"
"#;

pub const SLOW_SCRIPT: &str = "sleep 2\n";

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        gpu_info_timeout_secs: 20,
    }
}

/// A running test app and the scratch directory its jobs write into.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub tmp: tempfile::TempDir,
}

/// Build the full application router with all middleware layers, backed by
/// a folding tool running `script` and the given capacity limits.
pub async fn build_test_app_with(script: &str, concurrent: usize, queued: usize) -> TestApp {
    build_test_app_from(script, concurrent, queued, Arc::new(FakeProbe), test_config()).await
}

/// Like [`build_test_app_with`] with a custom probe and server config.
pub async fn build_test_app_from(
    script: &str,
    concurrent: usize,
    queued: usize,
    probe: Arc<dyn HardwareProbe>,
    config: ServerConfig,
) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let script_path = tmp.path().join("fold.sh");
    std::fs::write(&script_path, script).unwrap();

    let pipeline = PipelineConfig {
        data_dir: tmp.path().join("data"),
        output_dir: tmp.path().join("output"),
        sequences_dir: tmp.path().join("sequences"),
        tool: FoldingTool {
            program: "sh".into(),
            script: Some(script_path),
            max_template_date: "2022-01-01".into(),
        },
        telemetry_interval: Duration::from_millis(50),
        max_concurrent_jobs: concurrent,
        max_queued_jobs: queued,
    };
    pipeline.ensure_dirs().await.unwrap();
    let pipeline = Arc::new(pipeline);

    let publisher = Arc::new(Publisher::new(Arc::new(NoopStore), Arc::new(NoopStore)));
    let registry = Arc::new(JobRegistry::new());
    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&pipeline),
        Arc::clone(&probe),
        publisher,
    ));
    let executor = Arc::new(JobExecutor::from_config(
        &pipeline,
        Arc::clone(&registry),
        supervisor,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        executor,
        probe,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        tmp,
    }
}

pub async fn build_test_app() -> TestApp {
    build_test_app_with(SUCCESS_SCRIPT, 2, 8).await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll `/status/{job_id}` until the job reaches `status`.
pub async fn wait_for_status(app: &Router, job_id: &str, status: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = get(app.clone(), &format!("/status/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["status"] == status {
            return json;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} never reached {status}: {json}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
