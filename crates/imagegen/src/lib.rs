//! Client for the remote image-generation API.
//!
//! Fetches an optional reference image, sends the prompt (plus the
//! reference as inline base64 data) to an OpenAI-compatible Responses
//! endpoint with an `image_generation` tool, and returns the decoded image
//! bytes. Performs no retries.

pub mod api;
pub mod config;
pub mod error;
pub mod reference;

use async_trait::async_trait;
use pagesmith_core::job::GenerationRequest;

pub use api::OpenAiImageClient;
pub use config::ImageApiConfig;
pub use error::GenerationError;

/// Something that turns a [`GenerationRequest`] into image bytes.
///
/// The orchestrator depends on this trait rather than on
/// [`OpenAiImageClient`] so tests can substitute a stub.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError>;
}
