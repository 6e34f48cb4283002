#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use pagesmith_api::config::ServerConfig;
use pagesmith_api::engine::orchestrator::{JobOrchestrator, OrchestratorLimits};
use pagesmith_api::router::build_app_router;
use pagesmith_api::state::AppState;
use pagesmith_core::job::GenerationRequest;
use pagesmith_imagegen::{GenerationError, ImageApiConfig, ImageGenerator};
use pagesmith_store::{JobStore, LocalArtifactStore};

/// Prompt that makes [`StubGenerator`] report that no image was produced.
pub const PROMPT_NO_IMAGE: &str = "produce nothing";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and writes artifacts to `generated_dir`.
pub fn test_config(generated_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        generated_dir,
        public_base_url: None,
        max_concurrent_generations: 2,
        max_queued_generations: 4,
        job_retention_hours: 24,
        image: ImageApiConfig::new("test-key"),
    }
}

/// In-process generator standing in for the remote API.
///
/// Each call waits for a permit on `gate`, so tests decide exactly when a
/// generation completes. The produced bytes embed the prompt.
pub struct StubGenerator {
    pub gate: Semaphore,
}

impl StubGenerator {
    /// Generations complete immediately.
    pub fn open() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
        })
    }

    /// Generations block until [`release`](Self::release) is called.
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
        })
    }

    /// Let `n` blocked generations proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        self.gate
            .acquire()
            .await
            .expect("stub gate closed")
            .forget();

        if let Some(url) = &request.reference_image_url {
            if url.contains("missing") {
                return Err(GenerationError::ReferenceFetch {
                    url: url.clone(),
                    status: "404 Not Found".into(),
                });
            }
        }
        if request.prompt == PROMPT_NO_IMAGE {
            return Err(GenerationError::NoImageProduced);
        }

        Ok(format!("image:{}", request.prompt).into_bytes())
    }
}

/// A running application with handles to its internals.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub generator: Arc<StubGenerator>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.router.clone(), uri).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        post_json(self.router.clone(), uri, body).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> Response<Body> {
        post_raw(self.router.clone(), uri, body).await
    }

    /// Poll `/check-job/{id}` until it leaves `pending`, returning the final body.
    pub async fn wait_for_job(&self, job_id: &str) -> serde_json::Value {
        for _ in 0..200 {
            let json = body_json(self.get(&format!("/check-job/{job_id}")).await).await;
            if json["status"] != "pending" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} still pending");
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as `main.rs` so integration tests
/// exercise the production middleware stack.
pub async fn build_test_app(generator: Arc<StubGenerator>) -> TestApp {
    build_test_app_with(generator, |_| {}).await
}

/// Like [`build_test_app`], with a hook to adjust the configuration.
pub async fn build_test_app_with(
    generator: Arc<StubGenerator>,
    customize: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("generated"));
    customize(&mut config);

    let artifacts = Arc::new(LocalArtifactStore::open(&config.generated_dir).await.unwrap());
    let jobs = Arc::new(JobStore::new());
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&jobs),
        artifacts.clone(),
        generator.clone(),
        OrchestratorLimits {
            max_concurrent: config.max_concurrent_generations,
            max_queued: config.max_queued_generations,
        },
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        artifacts,
        orchestrator,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        generator,
        _dir: dir,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("host", "localhost:3000")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

/// POST an arbitrary string labelled as JSON.
pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
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
