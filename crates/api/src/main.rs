use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fold_cloud::Publisher;
use fold_hardware::{HardwareProbe, NvidiaSmiProbe};
use fold_pipeline::config::PipelineConfig;
use fold_pipeline::executor::JobExecutor;
use fold_pipeline::registry::JobRegistry;
use fold_pipeline::supervisor::Supervisor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fold_api::config::ServerConfig;
use fold_api::router::build_app_router;
use fold_api::state::AppState;

const DEFAULT_LOG_FILTER: &str =
    "fold_api=info,fold_pipeline=info,fold_cloud=info,fold_hardware=info,tower_http=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline_config = PipelineConfig::from_env().expect("Invalid pipeline configuration");
    pipeline_config
        .ensure_dirs()
        .await
        .expect("Failed to create data directories");
    tracing::info!(
        output_dir = %pipeline_config.output_dir.display(),
        program = %pipeline_config.tool.program,
        max_concurrent_jobs = pipeline_config.max_concurrent_jobs,
        max_queued_jobs = pipeline_config.max_queued_jobs,
        "Loaded pipeline configuration",
    );
    let pipeline_config = Arc::new(pipeline_config);

    // --- Pipeline ---
    let probe: Arc<dyn HardwareProbe> = Arc::new(NvidiaSmiProbe::new());
    let publisher = Arc::new(Publisher::from_env().await);
    tracing::info!("Result publisher ready");

    let registry = Arc::new(JobRegistry::new());
    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&pipeline_config),
        Arc::clone(&probe),
        publisher,
    ));
    let executor = Arc::new(JobExecutor::from_config(
        &pipeline_config,
        Arc::clone(&registry),
        supervisor,
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        executor: Arc::clone(&executor),
        probe,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(
        in_flight = executor.in_flight(),
        "Server stopped accepting connections, draining jobs"
    );
    let drained = executor
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if !drained {
        tracing::warn!("Exiting with folding jobs still running");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
