use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagesmith_api::background;
use pagesmith_api::config::ServerConfig;
use pagesmith_api::engine::orchestrator::{JobOrchestrator, OrchestratorLimits};
use pagesmith_api::router::build_app_router;
use pagesmith_api::state::AppState;
use pagesmith_imagegen::OpenAiImageClient;
use pagesmith_store::{JobStore, LocalArtifactStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pagesmith_api=debug,pagesmith_imagegen=debug,pagesmith_store=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        model = %config.image.model,
        max_concurrent = config.max_concurrent_generations,
        max_queued = config.max_queued_generations,
        "Loaded server configuration"
    );

    // --- Stores ---
    let artifacts = LocalArtifactStore::open(&config.generated_dir)
        .await
        .expect("Failed to prepare artifact directory");
    let artifacts = Arc::new(artifacts);
    let jobs = Arc::new(JobStore::new());

    // --- Generation engine ---
    let generator = Arc::new(OpenAiImageClient::new(config.image.clone()));
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&jobs),
        artifacts.clone(),
        generator,
        OrchestratorLimits {
            max_concurrent: config.max_concurrent_generations,
            max_queued: config.max_queued_generations,
        },
    ));
    tracing::info!("Generation engine started");

    // --- Job retention ---
    let retention_cancel = tokio_util::sync::CancellationToken::new();
    let retention_handle = tokio::spawn(background::job_retention::run(
        Arc::clone(&jobs),
        config.job_retention_hours,
        retention_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        artifacts,
        orchestrator: Arc::clone(&orchestrator),
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
    tracing::info!("Server stopped accepting connections, cleaning up");

    let in_flight = orchestrator.in_flight();
    tracing::info!(in_flight, "Waiting for in-flight generations");
    let drained = orchestrator
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if drained {
        tracing::info!("All generations finished");
    } else {
        tracing::warn!(
            remaining = orchestrator.in_flight(),
            "Shutdown timeout reached, abandoning in-flight generations"
        );
    }

    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Job retention task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
