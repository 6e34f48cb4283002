/// Errors from a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The reference image URL answered with a non-success status.
    #[error("Failed to fetch reference image: {status}")]
    ReferenceFetch {
        url: String,
        /// Upstream status line, e.g. `404 Not Found`.
        status: String,
    },

    /// The reference image could not be fetched at all (DNS, TLS, timeout).
    #[error("Failed to fetch reference image {url}: {source}")]
    ReferenceTransport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP request to the generation API failed (network, TLS, timeout).
    #[error("Remote generation call failed: {0}")]
    RemoteCall(#[from] reqwest::Error),

    /// The generation API returned a non-2xx status code.
    #[error("Remote generation API error ({status}): {body}")]
    RemoteApi {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The call succeeded but no image was produced (e.g. moderation).
    #[error("No image generated")]
    NoImageProduced,

    /// The image payload was not valid base64.
    #[error("Invalid image payload: {0}")]
    InvalidImagePayload(#[from] base64::DecodeError),
}
