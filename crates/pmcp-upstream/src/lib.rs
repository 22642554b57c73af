//! Upstream generation client: outbound calls to the Pollinations service.
//!
//! Pure request/response, no state beyond the pooled HTTP client. Every call
//! carries a fixed timeout and fails immediately on timeout or a non-2xx
//! status; there is no retry and no backoff. Callers turn the failure into a
//! JSON-RPC error.

use std::future::Future;
use std::time::Duration;

pub use bytes::Bytes;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Hard limit for a single upstream call.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_IMAGE_BASE: &str = "https://image.pollinations.ai";
pub const DEFAULT_TEXT_BASE: &str = "https://text.pollinations.ai";

/// Content type reported when the upstream omits the header.
const FALLBACK_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Upper bound on the upstream error body kept in diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Upstream client configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the image endpoint
    pub image_base: String,
    /// Base URL of the text endpoint
    pub text_base: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            image_base: DEFAULT_IMAGE_BASE.into(),
            text_base: DEFAULT_TEXT_BASE.into(),
            timeout: UPSTREAM_TIMEOUT,
        }
    }
}

/// Failure of an upstream call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid upstream URL {0}")]
    InvalidUrl(String),
}

/// Parameters of an image generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub model: String,
    pub seed: Option<u64>,
}

/// Raw image returned by the upstream.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub content_type: String,
    /// The URL the image was fetched from.
    pub url: String,
}

/// Parameters of a text generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub prompt: String,
    pub model: String,
}

/// The generation backend used by the tools.
///
/// Implemented by [`PollinationsClient`]; tests substitute in-memory stubs.
pub trait Generator: Send + Sync + 'static {
    fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> impl Future<Output = Result<GeneratedImage, UpstreamError>> + Send;

    /// Returns the upstream body: a JSON object or array when it parses as one, else a string.
    fn generate_text(
        &self,
        request: &TextRequest,
    ) -> impl Future<Output = Result<Value, UpstreamError>> + Send;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct TextBody<'a> {
    messages: [ChatMessage<'a>; 1],
    #[serde(rename = "jsonMode")]
    json_mode: bool,
}

/// reqwest-backed client for the Pollinations image and text endpoints.
#[derive(Debug, Clone)]
pub struct PollinationsClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl PollinationsClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pollinations-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::Transport)?;
        Ok(Self { http, config })
    }

    /// `{image_base}/prompt/{prompt}?width&height&model&nologo=true&nofeed=true[&seed]`
    pub fn image_url(&self, request: &ImageRequest) -> Result<Url, UpstreamError> {
        let mut url = parse_base(&self.config.image_base)?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.config.image_base.clone()))?
            .pop_if_empty()
            .push("prompt")
            .push(&request.prompt);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &request.width.to_string())
                .append_pair("height", &request.height.to_string())
                .append_pair("model", &request.model)
                .append_pair("nologo", "true")
                .append_pair("nofeed", "true");
            if let Some(seed) = request.seed {
                query.append_pair("seed", &seed.to_string());
            }
        }
        Ok(url)
    }

    /// `{text_base}/{model}`
    pub fn text_url(&self, model: &str) -> Result<Url, UpstreamError> {
        let mut url = parse_base(&self.config.text_base)?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.config.text_base.clone()))?
            .pop_if_empty()
            .push(model);
        Ok(url)
    }

    fn map_send_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.timeout)
        } else {
            UpstreamError::Transport(err)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Structured bodies stay structured; any other body is the model's answer as a string.
fn text_content(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(text),
    }
}

fn parse_base(base: &str) -> Result<Url, UpstreamError> {
    Url::parse(base).map_err(|_| UpstreamError::InvalidUrl(base.to_string()))
}

impl Generator for PollinationsClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, UpstreamError> {
        let url = self.image_url(request)?;
        debug!(model = %request.model, width = request.width, height = request.height, "Requesting image");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await.inspect_err(|e| {
            warn!("Image generation failed: {e}");
        })?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FALLBACK_IMAGE_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        debug!(bytes = bytes.len(), %content_type, "Image received");

        Ok(GeneratedImage {
            bytes,
            content_type,
            url: url.to_string(),
        })
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<Value, UpstreamError> {
        let url = self.text_url(&request.model)?;
        debug!(model = %request.model, "Requesting text");

        let body = TextBody {
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            json_mode: false,
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await.inspect_err(|e| {
            warn!("Text generation failed: {e}");
        })?;

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        Ok(text_content(text))
    }
}
