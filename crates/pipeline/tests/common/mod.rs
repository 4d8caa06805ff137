#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fold_cloud::{Destination, ObjectStore, Publisher, UploadError};
use fold_core::hardware::{GpuTelemetry, GpuUtilization, ProbeOutcome};
use fold_core::job::{JobRecord, JobStatus};
use fold_hardware::HardwareProbe;
use fold_pipeline::config::{FoldingTool, PipelineConfig};
use fold_pipeline::registry::JobRegistry;
use fold_pipeline::supervisor::{JobRequest, Supervisor};

// ---------------------------------------------------------------------------
// Hardware
// ---------------------------------------------------------------------------

/// Probe reporting one healthy GPU and counting telemetry samples.
pub struct FakeProbe {
    pub samples: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            samples: AtomicUsize::new(0),
        })
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HardwareProbe for FakeProbe {
    async fn probe_accelerator(&self) -> ProbeOutcome {
        ProbeOutcome::available("NVIDIA A100-SXM4-40GB")
    }

    async fn probe_container_runtime(&self) -> ProbeOutcome {
        ProbeOutcome::unavailable("docker: command not found")
    }

    async fn sample_telemetry(&self) -> Option<GpuTelemetry> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        Some(GpuTelemetry {
            gpus: vec![GpuUtilization {
                gpu_index: 0,
                utilization_percent: Some(87),
                memory_used_mb: Some(30_000),
                memory_total_mb: Some(40_960),
            }],
            sampled_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Store that rejects every upload.
pub struct RejectingStore;

#[async_trait]
impl ObjectStore for RejectingStore {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    async fn put(&self, _local: &Path, _destination: &Destination) -> Result<(), UploadError> {
        Err(UploadError::Provider {
            provider: "rejecting",
            message: "no credentials".into(),
        })
    }
}

/// Store that accepts every upload.
pub struct AcceptingStore;

#[async_trait]
impl ObjectStore for AcceptingStore {
    fn name(&self) -> &'static str {
        "accepting"
    }

    async fn put(&self, _local: &Path, _destination: &Destination) -> Result<(), UploadError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Folding tool stand-ins
// ---------------------------------------------------------------------------

/// Preamble extracting `--output_dir=` into `$OUT`.
const SCRIPT_PREAMBLE: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --output_dir=*) OUT="${arg#--output_dir=}" ;;
  esac
done
"#;

/// Tool that reports GPU use, hits both milestones and writes a result.
pub const SUCCESS_SCRIPT: &str = r#"
echo "I0101 Found device: device:GPU:0"
echo "Running model model_1_pred_0"
echo "Relaxing structure"
mkdir -p "$OUT/seq"
echo "Using GPU for inference" > "$OUT/seq/log.txt"
echo "ATOM      1  N   MET A   1" > "$OUT/seq/ranked_0.pdb"
echo "ATOM      1  N   MET A   1" > "$OUT/seq/ranked_1.pdb"
"#;

/// Tool that fails with a message on stderr.
pub const FAILING_SCRIPT: &str = r#"
echo "Running model model_1_pred_0"
echo "CUDA OOM" >&2
exit 1
"#;

/// Tool that succeeds without writing anything.
pub const EMPTY_SCRIPT: &str = "exit 0\n";

/// Tool that writes a result directory with no model in it.
pub const NO_MODEL_SCRIPT: &str = r#"
mkdir -p "$OUT/seq"
echo "done" > "$OUT/seq/log.txt"
"#;

/// Tool that takes a while.
pub const SLOW_SCRIPT: &str = "sleep 2\n";

/// Temporary directory tree plus a config pointing at a scripted tool.
pub struct Fixture {
    pub tmp: tempfile::TempDir,
    pub config: Arc<PipelineConfig>,
}

impl Fixture {
    pub async fn new(script_body: &str) -> Self {
        Self::with_capacity(script_body, 2, 8).await
    }

    pub async fn with_capacity(script_body: &str, concurrent: usize, queued: usize) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fold.sh");
        std::fs::write(&script, format!("{SCRIPT_PREAMBLE}{script_body}")).unwrap();

        let config = PipelineConfig {
            data_dir: tmp.path().join("data"),
            output_dir: tmp.path().join("output"),
            sequences_dir: tmp.path().join("sequences"),
            tool: FoldingTool {
                program: "sh".into(),
                script: Some(script),
                max_template_date: "2022-01-01".into(),
            },
            telemetry_interval: Duration::from_millis(20),
            max_concurrent_jobs: concurrent,
            max_queued_jobs: queued,
        };
        config.ensure_dirs().await.unwrap();

        Self {
            tmp,
            config: Arc::new(config),
        }
    }

    pub fn supervisor(&self, probe: Arc<FakeProbe>) -> Supervisor {
        let publisher = Publisher::new(Arc::new(RejectingStore), Arc::new(RejectingStore));
        self.supervisor_with_publisher(probe, publisher)
    }

    pub fn supervisor_with_publisher(
        &self,
        probe: Arc<FakeProbe>,
        publisher: Publisher,
    ) -> Supervisor {
        Supervisor::new(Arc::clone(&self.config), probe, Arc::new(publisher))
    }

    pub fn path(&self) -> PathBuf {
        self.tmp.path().to_path_buf()
    }
}

pub fn request(job_id: &str) -> JobRequest {
    JobRequest {
        job_id: job_id.into(),
        name: "ubiquitin".into(),
        sequence: "MQIFVKTLTGKTITLEVEPSDTIENVKAKIQDKEGIPPDQQRLIFAGKQLEDGRTLSDYNIQKESTLHLVLRLRGG"
            .into(),
        destination: None,
    }
}

/// Poll until the job reaches a terminal state.
pub async fn wait_for_terminal(registry: &JobRegistry, job_id: &str) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let record = registry.get(job_id).await.expect("job registered");
        if record.status.is_terminal() {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} still {} after 10s",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn wait_for_status(registry: &JobRegistry, job_id: &str, status: JobStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while registry.status(job_id).await != Some(status) {
        assert!(tokio::time::Instant::now() < deadline, "job {job_id} never reached {status}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
