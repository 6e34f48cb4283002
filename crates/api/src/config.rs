use std::path::PathBuf;

use pagesmith_imagegen::ImageApiConfig;

/// Default cap on simultaneous calls to the generation API.
pub const DEFAULT_MAX_CONCURRENT_GENERATIONS: usize = 4;

/// Default cap on admitted-but-unfinished generations.
pub const DEFAULT_MAX_QUEUED_GENERATIONS: usize = 64;

/// Default retention of finished job records in memory.
pub const DEFAULT_JOB_RETENTION_HOURS: i64 = 24;

/// Upper bound for `JOB_RETENTION_HOURS` (ten years).
pub const MAX_JOB_RETENTION_HOURS: i64 = 87_600;

/// Server configuration loaded from environment variables.
///
/// All fields except the generation API key have sensible defaults
/// suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight generations (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Directory holding generated artifacts (default: `generated`).
    pub generated_dir: PathBuf,
    /// Overrides the request host when building artifact URLs,
    /// e.g. `https://images.example.com`.
    pub public_base_url: Option<String>,
    pub max_concurrent_generations: usize,
    pub max_queued_generations: usize,
    pub job_retention_hours: i64,
    /// Remote generation API settings.
    pub image: ImageApiConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `HOST`                       | `0.0.0.0`                  |
    /// | `PORT`                       | `3000`                     |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                       |
    /// | `GENERATED_DIR`              | `generated`                |
    /// | `PUBLIC_BASE_URL`            | unset                      |
    /// | `MAX_CONCURRENT_GENERATIONS` | `4`                        |
    /// | `MAX_QUEUED_GENERATIONS`     | `64`                       |
    /// | `JOB_RETENTION_HOURS`        | `24`                       |
    ///
    /// Generation API variables are documented on [`ImageApiConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let generated_dir: PathBuf = std::env::var("GENERATED_DIR")
            .unwrap_or_else(|_| "generated".into())
            .into();

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let max_concurrent_generations: usize = std::env::var("MAX_CONCURRENT_GENERATIONS")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT_GENERATIONS.to_string())
            .parse()
            .expect("MAX_CONCURRENT_GENERATIONS must be a valid usize");
        assert!(
            max_concurrent_generations > 0,
            "MAX_CONCURRENT_GENERATIONS must be at least 1"
        );

        let max_queued_generations: usize = std::env::var("MAX_QUEUED_GENERATIONS")
            .unwrap_or_else(|_| DEFAULT_MAX_QUEUED_GENERATIONS.to_string())
            .parse()
            .expect("MAX_QUEUED_GENERATIONS must be a valid usize");
        assert!(
            max_queued_generations >= max_concurrent_generations,
            "MAX_QUEUED_GENERATIONS must be >= MAX_CONCURRENT_GENERATIONS"
        );

        let job_retention_hours: i64 = std::env::var("JOB_RETENTION_HOURS")
            .unwrap_or_else(|_| DEFAULT_JOB_RETENTION_HOURS.to_string())
            .parse()
            .expect("JOB_RETENTION_HOURS must be a valid i64");
        check_job_retention_hours(job_retention_hours);

        let image = ImageApiConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            generated_dir,
            public_base_url,
            max_concurrent_generations,
            max_queued_generations,
            job_retention_hours,
            image,
        }
    }
}

/// Panics unless `hours` lies in `0..=MAX_JOB_RETENTION_HOURS`.
fn check_job_retention_hours(hours: i64) {
    assert!(
        (0..=MAX_JOB_RETENTION_HOURS).contains(&hours),
        "JOB_RETENTION_HOURS must be between 0 and {MAX_JOB_RETENTION_HOURS}"
    );
}
