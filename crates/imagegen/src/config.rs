use std::time::Duration;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model driving the `image_generation` tool.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Default output resolution (portrait book page).
pub const DEFAULT_SIZE: &str = "1024x1536";

/// Default timeout for the generation call in seconds.
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 300;

/// Default timeout for fetching a reference image in seconds.
const DEFAULT_REFERENCE_TIMEOUT_SECS: u64 = 30;

/// Settings for [`OpenAiImageClient`](crate::OpenAiImageClient).
#[derive(Debug, Clone)]
pub struct ImageApiConfig {
    /// Bearer token for the generation API.
    pub api_key: String,
    /// API base URL; requests go to `{base_url}/responses`.
    pub base_url: String,
    pub model: String,
    /// Output resolution, e.g. `1024x1536`.
    pub size: String,
    /// `input_fidelity` sent with the tool when a reference image is
    /// attached (e.g. `high`). Omitted when `None`.
    pub input_fidelity: Option<String>,
    /// Wraps the client prompt; `{prompt}` is replaced by it. When the
    /// placeholder is missing the prompt is appended.
    pub prompt_template: Option<String>,
    pub generation_timeout: Duration,
    pub reference_timeout: Duration,
}

impl ImageApiConfig {
    /// Config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            size: DEFAULT_SIZE.to_string(),
            input_fidelity: None,
            prompt_template: None,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            reference_timeout: Duration::from_secs(DEFAULT_REFERENCE_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                      |
    /// |--------------------------------|------------------------------|
    /// | `OPENAI_API_KEY`               | required                     |
    /// | `OPENAI_BASE_URL`              | `https://api.openai.com/v1`  |
    /// | `IMAGE_MODEL`                  | `gpt-4.1`                    |
    /// | `IMAGE_SIZE`                   | `1024x1536`                  |
    /// | `IMAGE_INPUT_FIDELITY`         | unset                        |
    /// | `IMAGE_PROMPT_TEMPLATE`        | unset                        |
    /// | `GENERATION_TIMEOUT_SECS`      | `300`                        |
    /// | `REFERENCE_FETCH_TIMEOUT_SECS` | `30`                         |
    pub fn from_env() -> Self {
        let api_key =
            std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set in the environment");
        assert!(!api_key.is_empty(), "OPENAI_API_KEY must not be empty");

        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        let model = std::env::var("IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let size = std::env::var("IMAGE_SIZE").unwrap_or_else(|_| DEFAULT_SIZE.into());

        let input_fidelity = std::env::var("IMAGE_INPUT_FIDELITY")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let prompt_template = std::env::var("IMAGE_PROMPT_TEMPLATE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let generation_timeout_secs: u64 = std::env::var("GENERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_GENERATION_TIMEOUT_SECS.to_string())
            .parse()
            .expect("GENERATION_TIMEOUT_SECS must be a valid u64");

        let reference_timeout_secs: u64 = std::env::var("REFERENCE_FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REFERENCE_TIMEOUT_SECS.to_string())
            .parse()
            .expect("REFERENCE_FETCH_TIMEOUT_SECS must be a valid u64");

        Self {
            api_key,
            base_url,
            model,
            size,
            input_fidelity,
            prompt_template,
            generation_timeout: Duration::from_secs(generation_timeout_secs),
            reference_timeout: Duration::from_secs(reference_timeout_secs),
        }
    }
}
