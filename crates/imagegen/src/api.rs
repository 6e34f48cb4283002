//! REST client for an OpenAI-compatible Responses endpoint.
//!
//! Sends one `user` turn (text plus optional inline reference image) with a
//! required `image_generation` tool, then scans the response `output` for
//! the `image_generation_call` item carrying the base64 image.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pagesmith_core::job::{ArtifactFormat, GenerationRequest};
use serde::{Deserialize, Serialize};

use crate::config::ImageApiConfig;
use crate::error::GenerationError;
use crate::reference::{fetch_reference, ReferenceImage};
use crate::ImageGenerator;

/// Output item type produced by the image generation tool.
const IMAGE_GENERATION_CALL: &str = "image_generation_call";

/// Placeholder replaced by the client prompt in a prompt template.
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// HTTP client for the remote image-generation API.
pub struct OpenAiImageClient {
    client: reqwest::Client,
    config: ImageApiConfig,
}

// ---- wire types ----

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage>,
    tool_choice: &'static str,
    tools: Vec<ImageGenerationTool<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent {
    InputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Serialize)]
struct ImageGenerationTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    size: &'a str,
    output_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_fidelity: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    result: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(config: ImageApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Apply the configured prompt template, if any.
    fn render_prompt(&self, prompt: &str) -> String {
        match self.config.prompt_template.as_deref() {
            Some(template) if template.contains(PROMPT_PLACEHOLDER) => {
                template.replace(PROMPT_PLACEHOLDER, prompt)
            }
            Some(template) => format!("{template} {prompt}"),
            None => prompt.to_string(),
        }
    }

    /// Build the body for `POST {base_url}/responses`.
    fn build_body(
        &self,
        request: &GenerationRequest,
        reference: Option<&ReferenceImage>,
    ) -> ResponsesRequest<'_> {
        let mut content = vec![InputContent::InputText {
            text: self.render_prompt(&request.prompt),
        }];
        if let Some(reference) = reference {
            content.push(InputContent::InputImage {
                image_url: reference.data_url(),
            });
        }

        let format = request.output_format();
        let tool = ImageGenerationTool {
            kind: "image_generation",
            size: &self.config.size,
            output_format: format.api_name(),
            background: (format == ArtifactFormat::Png && request.transparent_background)
                .then_some("transparent"),
            input_fidelity: reference.and(self.config.input_fidelity.as_deref()),
        };

        ResponsesRequest {
            model: &self.config.model,
            input: vec![InputMessage {
                role: "user",
                content,
            }],
            tool_choice: "required",
            tools: vec![tool],
        }
    }

    /// Ensure the response has a success status code, or turn it into a
    /// [`GenerationError::RemoteApi`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Decode the image carried by the first `image_generation_call` item.
fn extract_image(response: ResponsesResponse) -> Result<Vec<u8>, GenerationError> {
    let payload = response
        .output
        .into_iter()
        .find(|item| item.kind == IMAGE_GENERATION_CALL)
        .and_then(|item| item.result)
        .ok_or(GenerationError::NoImageProduced)?;

    Ok(STANDARD.decode(payload)?)
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let reference = match request.reference_image_url.as_deref() {
            Some(url) => {
                Some(fetch_reference(&self.client, url, self.config.reference_timeout).await?)
            }
            None => None,
        };

        let body = self.build_body(request, reference.as_ref());

        tracing::debug!(
            model = %self.config.model,
            has_reference = reference.is_some(),
            transparent = request.transparent_background,
            "Sending generation request",
        );

        let response = self
            .client
            .post(format!("{}/responses", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.generation_timeout)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let parsed: ResponsesResponse = response.json().await?;
        let item_types: Vec<String> = parsed.output.iter().map(|o| o.kind.clone()).collect();

        let bytes = extract_image(parsed).inspect_err(|_| {
            tracing::warn!(output_types = ?item_types, "Generation produced no image");
        })?;

        tracing::debug!(size = bytes.len(), "Generation returned image");
        Ok(bytes)
    }
}
