// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP transport for the OpenAI-compatible vision API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::error::Error as _;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::Result;

/// Timeout for the lightweight model listing call
const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat completion request with one text part and one image part
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatRequest {
    /// Single user message carrying `prompt` and a base64 JPEG
    pub fn vision(model: &str, prompt: &str, jpeg_base64: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text { text: prompt.to_string() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", jpeg_base64),
                        },
                    },
                ],
            }],
            max_tokens,
            temperature,
        }
    }
}

/// Broad category of a failure below the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Connect,
    Timeout,
    Tls,
    TooManyRedirects,
    ChunkedEncoding,
    ContentDecoding,
    Other,
}

/// Why a single request did not produce a usable response
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// The server answered with a non-success status
    Http { status: u16, message: Option<String> },
    /// No HTTP response was obtained
    Transport { kind: TransportKind, message: String },
    /// Anything else (request construction, local bugs)
    Other { category: String, message: String },
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Http { status, message: Some(m) } => write!(f, "HTTP {}: {}", status, m),
            ApiFailure::Http { status, message: None } => write!(f, "HTTP {}", status),
            ApiFailure::Transport { kind, message } => write!(f, "{:?}: {}", kind, message),
            ApiFailure::Other { category, message } => write!(f, "{}: {}", category, message),
        }
    }
}

impl ApiFailure {
    /// Map a reqwest error onto a transport category
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return ApiFailure::Other {
                category: "RequestBuilder".to_string(),
                message: error_chain(err),
            };
        }

        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_redirect() {
            TransportKind::TooManyRedirects
        } else if err.is_connect() {
            // TLS handshake failures surface as connect errors
            if sources_mention_tls(err) {
                TransportKind::Tls
            } else {
                TransportKind::Connect
            }
        } else if err.is_decode() {
            TransportKind::ContentDecoding
        } else if err.is_body() {
            TransportKind::ChunkedEncoding
        } else {
            TransportKind::Other
        };

        ApiFailure::Transport { kind, message: error_chain(err) }
    }
}

/// Full `a: b: c` text of an error and its sources
fn error_chain(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Looks only below the top-level error, whose text embeds the request URL
fn sources_mention_tls(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if ["certificate", "tls", "ssl", "handshake"]
            .iter()
            .any(|needle| text.contains(needle))
        {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw text
pub fn upstream_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(trimmed).ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Some(from_json.unwrap_or_else(|| trimmed.chars().take(300).collect()))
}

/// The two calls the analysis client needs from the remote service
#[async_trait]
pub trait VisionTransport: Send + Sync {
    /// POST a chat completion; returns the decoded body of a 2xx response.
    /// A 2xx body that is not JSON comes back as `Value::Null`.
    async fn complete(&self, request: &ChatRequest) -> std::result::Result<Value, ApiFailure>;

    /// GET the model listing; returns the decoded body of a 200 response
    async fn list_models(&self) -> std::result::Result<Value, ApiFailure>;
}

/// reqwest-backed transport with bearer authentication
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Normalize URL
        let base_url = config
            .base_url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    async fn read_body(response: reqwest::Response) -> std::result::Result<Value, ApiFailure> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiFailure::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(ApiFailure::Http {
                status: status.as_u16(),
                message: upstream_message(&text),
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl VisionTransport for HttpTransport {
    async fn complete(&self, request: &ChatRequest) -> std::result::Result<Value, ApiFailure> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Sending vision request: model={}", request.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiFailure::from_reqwest(&e))?;

        Self::read_body(response).await
    }

    async fn list_models(&self) -> std::result::Result<Value, ApiFailure> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await
            .map_err(|e| ApiFailure::from_reqwest(&e))?;

        let status = response.status();
        if status != StatusCode::OK && status.is_success() {
            return Err(ApiFailure::Http { status: status.as_u16(), message: None });
        }

        Self::read_body(response).await
    }
}
