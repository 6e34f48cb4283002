//! Fetching of reference images supplied by URL.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;

use crate::error::GenerationError;

/// Content type assumed when neither the header nor the bytes tell us.
const FALLBACK_MIME_TYPE: &str = "image/jpeg";

/// A fetched reference image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReferenceImage {
    /// Inline `data:` URL carrying the image as base64.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Download the reference image at `url`.
///
/// A non-success status fails with [`GenerationError::ReferenceFetch`]
/// carrying the status line. The content type comes from the response
/// header, falling back to sniffing the bytes, then to `image/jpeg`.
pub async fn fetch_reference(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ReferenceImage, GenerationError> {
    tracing::debug!(url, "Fetching reference image");

    let transport = |source| GenerationError::ReferenceTransport {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url, %status, "Reference image fetch rejected");
        return Err(GenerationError::ReferenceFetch {
            url: url.to_string(),
            status: status.to_string(),
        });
    }

    let header_mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
        .filter(|v| !v.is_empty());

    let bytes = response.bytes().await.map_err(transport)?.to_vec();
    let mime_type = header_mime.unwrap_or_else(|| sniff_mime_type(&bytes).to_string());

    tracing::debug!(url, mime_type = %mime_type, size = bytes.len(), "Reference image fetched");

    Ok(ReferenceImage { mime_type, bytes })
}

/// Guess an image content type from its leading bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME_TYPE)
}
