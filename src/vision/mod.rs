// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vision API client for describing screenshots
//!
//! `AnalysisClient::analyze` never returns an error: every path ends in an
//! `AnalysisOutcome`, with failures explained well enough to act on.

pub mod image;
pub mod messages;
pub mod response;
pub mod transport;

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::cost::UsageTracker;
use crate::Result;
use messages::ExplainContext;
use response::Interpretation;
use transport::{ChatRequest, HttpTransport, VisionTransport};

/// Instruction sent with every screenshot
pub const ANALYSIS_PROMPT: &str = "Analyze this screenshot and provide a concise 4-5 word \
    description that captures the main content or purpose. Focus on what the user was doing \
    or viewing. Examples: 'Web browser article reading', 'Code editor Python file', \
    'Settings screen preferences', 'Email inbox messages'. Be specific but brief.";

/// How many model names to show when the configured one is missing
const MODEL_SAMPLE_SIZE: usize = 5;

/// Why an analysis produced no description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The image could not be decoded or encoded; not retried
    ImagePreparation,
    /// The model declined to describe the content; not retried
    Refused,
    /// Every attempt failed
    RetriesExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    /// Short summary, e.g. "Failed after 4 attempts"
    pub summary: String,
    /// Human-actionable explanation
    pub details: String,
}

/// Result of one analysis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisOutcome {
    /// Requests actually sent
    pub attempts: u32,
    pub result: std::result::Result<String, AnalysisFailure>,
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn description(&self) -> Option<&str> {
        self.result.as_ref().ok().map(String::as_str)
    }

    pub fn failure(&self) -> Option<&AnalysisFailure> {
        self.result.as_ref().err()
    }

    /// Attempts beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Outcome of the connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    /// Reachable and the configured model is listed
    Ready { model: String },
    /// Reachable, but the configured model is not offered
    ModelUnavailable { model: String, available: Vec<String> },
    /// The listing call itself failed
    Unreachable { explanation: String },
}

impl Connectivity {
    pub fn is_ok(&self) -> bool {
        matches!(self, Connectivity::Ready { .. })
    }

    /// Whether the endpoint answered at all
    pub fn is_connected(&self) -> bool {
        !matches!(self, Connectivity::Unreachable { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Connectivity::Ready { model } => {
                format!("API connection successful. Model '{}' is available.", model)
            }
            Connectivity::ModelUnavailable { model, available } => {
                let sample = if available.is_empty() {
                    "(none reported)".to_string()
                } else {
                    available
                        .iter()
                        .take(MODEL_SAMPLE_SIZE)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!(
                    "API connection successful, but model '{}' is not available. \
                     Available models include: {}",
                    model, sample
                )
            }
            Connectivity::Unreachable { explanation } => {
                format!("API connection failed: {}", explanation)
            }
        }
    }
}

/// Steps of one `analyze` call
enum Step {
    Preparing,
    Requesting(String),
    Backoff,
    Succeeded(String),
    Refused(String),
    PreparationFailed(String),
    Exhausted,
}

/// Describes screenshots through a remote vision model
pub struct AnalysisClient {
    transport: Box<dyn VisionTransport>,
    usage: Arc<dyn UsageTracker>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
    max_retries: u32,
    backoff_unit: Duration,
}

impl AnalysisClient {
    /// Client talking HTTP to the configured endpoint
    pub fn new(config: &ApiConfig, usage: Arc<dyn UsageTracker>) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(Box::new(transport), config, usage))
    }

    /// Client over any transport
    pub fn with_transport(
        transport: Box<dyn VisionTransport>,
        config: &ApiConfig,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            transport,
            usage,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Scale backoff delays; attempt `n` waits `unit * 2^n`
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    fn explain_context(&self) -> ExplainContext<'_> {
        ExplainContext {
            model: &self.model,
            timeout_secs: self.timeout_secs,
        }
    }

    /// Describe one screenshot in at most five words.
    ///
    /// Up to `max_retries` extra attempts follow a failed request, each after
    /// an exponential backoff. Image and refusal failures end the call at once.
    pub async fn analyze(&self, path: &Path) -> AnalysisOutcome {
        let mut attempts = 0u32;
        let mut errors: Vec<String> = Vec::new();
        let mut step = Step::Preparing;

        loop {
            step = match step {
                Step::Preparing => match image::prepare_image(path) {
                    Ok(prepared) => Step::Requesting(prepared.base64),
                    Err(e) => Step::PreparationFailed(e.to_string()),
                },

                Step::Requesting(image_data) => {
                    attempts += 1;
                    let request = ChatRequest::vision(
                        &self.model,
                        ANALYSIS_PROMPT,
                        &image_data,
                        self.max_tokens,
                        self.temperature,
                    );

                    match self.transport.complete(&request).await {
                        Ok(payload) => self.settle(&payload),
                        Err(failure) => {
                            self.usage.track_request(false, None);
                            let explanation = messages::explain(&failure, &self.explain_context());
                            warn!(
                                "API request failed for {:?} (attempt {}): {}",
                                path.file_name(),
                                attempts,
                                explanation
                            );
                            errors.push(format!("Attempt {}: {}", attempts, explanation));

                            if attempts > self.max_retries {
                                Step::Exhausted
                            } else {
                                Step::Backoff
                            }
                        }
                    }
                }

                Step::Backoff => {
                    let delay = self.backoff_unit.saturating_mul(2u32.saturating_pow(attempts));
                    info!("Retrying in {:?} (attempt {})", delay, attempts + 1);
                    tokio::time::sleep(delay).await;
                    Step::Preparing
                }

                Step::Succeeded(description) => {
                    return AnalysisOutcome { attempts, result: Ok(description) };
                }

                Step::Refused(raw) => {
                    return AnalysisOutcome {
                        attempts,
                        result: Err(AnalysisFailure {
                            kind: FailureKind::Refused,
                            summary: messages::REFUSAL_SUMMARY.to_string(),
                            details: messages::refusal_details(&raw),
                        }),
                    };
                }

                Step::PreparationFailed(error) => {
                    warn!("Error preparing image {:?}: {}", path, error);
                    errors.push(messages::image_preparation_details(&error));
                    return AnalysisOutcome {
                        attempts,
                        result: Err(AnalysisFailure {
                            kind: FailureKind::ImagePreparation,
                            summary: messages::IMAGE_PREPARATION_FAILED.to_string(),
                            details: errors.join("\n"),
                        }),
                    };
                }

                Step::Exhausted => {
                    return AnalysisOutcome {
                        attempts,
                        result: Err(AnalysisFailure {
                            kind: FailureKind::RetriesExhausted,
                            summary: messages::exhausted_summary(attempts),
                            details: errors.join("\n"),
                        }),
                    };
                }
            };
        }
    }

    /// Turn a 2xx payload into a terminal step and report usage
    fn settle(&self, payload: &Value) -> Step {
        match response::interpret(payload) {
            Interpretation::Description(description) => {
                self.usage.track_request(true, Some(&description));
                debug!("Description: {}", description);
                Step::Succeeded(description)
            }
            Interpretation::Refusal(raw) => {
                // The image was still processed and billed
                self.usage.track_request(true, Some(&raw));
                Step::Refused(raw)
            }
        }
    }

    /// List models to confirm the endpoint, credential and model name
    pub async fn check_connection(&self) -> Connectivity {
        let payload = match self.transport.list_models().await {
            Ok(payload) => payload,
            Err(failure) => {
                return Connectivity::Unreachable {
                    explanation: messages::explain(&failure, &self.explain_context()),
                }
            }
        };

        let available = model_ids(&payload);
        if available.iter().any(|id| id == &self.model) {
            Connectivity::Ready { model: self.model.clone() }
        } else {
            Connectivity::ModelUnavailable {
                model: self.model.clone(),
                available,
            }
        }
    }
}

/// `data[].id` from a model listing, skipping anything malformed
fn model_ids(payload: &Value) -> Vec<String> {
    payload
        .get("data")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::transport::{ApiFailure, TransportKind};
    use super::*;
    use crate::cost::CostCalculator;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Transport that replays scripted results and records requests
    struct ScriptedTransport {
        completions: Mutex<VecDeque<std::result::Result<Value, ApiFailure>>>,
        models: std::result::Result<Value, ApiFailure>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl ScriptedTransport {
        fn new(completions: Vec<std::result::Result<Value, ApiFailure>>) -> Self {
            Self {
                completions: Mutex::new(completions.into()),
                models: Ok(json!({ "data": [] })),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_models(mut self, models: std::result::Result<Value, ApiFailure>) -> Self {
            self.models = models;
            self
        }
    }

    #[async_trait]
    impl VisionTransport for ScriptedTransport {
        async fn complete(&self, request: &ChatRequest) -> std::result::Result<Value, ApiFailure> {
            self.requests.lock().unwrap().push(request.clone());
            self.completions
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra request")
        }

        async fn list_models(&self) -> std::result::Result<Value, ApiFailure> {
            self.models.clone()
        }
    }

    fn config(max_retries: u32) -> ApiConfig {
        ApiConfig {
            api_key: "test_key_12345".to_string(),
            model: "gpt-4-vision-preview".to_string(),
            timeout_secs: 10,
            max_retries,
            ..ApiConfig::default()
        }
    }

    fn client(
        transport: ScriptedTransport,
        max_retries: u32,
    ) -> (AnalysisClient, Arc<CostCalculator>) {
        let costs = Arc::new(CostCalculator::new());
        let client = AnalysisClient::with_transport(Box::new(transport), &config(max_retries), costs.clone())
            .with_backoff_unit(Duration::ZERO);
        (client, costs)
    }

    fn screenshot(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("Screenshot 2025-06-09 at 9.15.24.png");
        ::image::RgbImage::from_pixel(1600, 900, ::image::Rgb([200, 200, 200]))
            .save(&path)
            .unwrap();
        path
    }

    fn completion(text: &str) -> std::result::Result<Value, ApiFailure> {
        Ok(json!({ "choices": [ { "message": { "content": text } } ] }))
    }

    fn http(status: u16, message: &str) -> std::result::Result<Value, ApiFailure> {
        Err(ApiFailure::Http { status, message: Some(message.to_string()) })
    }

    fn transport_err(kind: TransportKind, message: &str) -> std::result::Result<Value, ApiFailure> {
        Err(ApiFailure::Transport { kind, message: message.to_string() })
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new(vec![completion("Code editor Python file")]);
        let requests = transport.requests.clone();
        let (client, costs) = client(transport, 3);

        let outcome = client.analyze(&screenshot(&dir)).await;
        assert_eq!(outcome.description(), Some("Code editor Python file"));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.retries(), 0);
        assert_eq!(costs.actual_costs().successful_requests, 1);

        let sent = requests.lock().unwrap();
        assert_eq!(sent[0].model, "gpt-4-vision-preview");
        assert!(sent[0].temperature < 0.5);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new(vec![
            http(503, "busy"),
            completion("Email inbox messages"),
        ]);
        let (client, costs) = client(transport, 3);

        let outcome = client.analyze(&screenshot(&dir)).await;
        assert_eq!(outcome.description(), Some("Email inbox messages"));
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.retries(), 1);
        assert_eq!(costs.actual_costs().failed_requests, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_every_error() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new(vec![
            transport_err(TransportKind::Timeout, "First timeout"),
            transport_err(TransportKind::Connect, "Connection failed"),
        ]);
        let (client, _) = client(transport, 1);

        let outcome = client.analyze(&screenshot(&dir)).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert!(failure.summary.contains("Failed after 2 attempts"));
        assert!(failure.details.contains("First timeout"));
        assert!(failure.details.contains("Connection failed"));
        assert!(failure.details.contains("10 seconds"));
        let first = failure.details.find("First timeout").unwrap();
        let second = failure.details.find("Connection failed").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_non_transient_errors_still_use_full_budget() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new(vec![
            http(401, "Incorrect API key provided"),
            http(401, "Incorrect API key provided"),
            http(401, "Incorrect API key provided"),
            http(401, "Incorrect API key provided"),
        ]);
        let (client, costs) = client(transport, 3);

        let outcome = client.analyze(&screenshot(&dir)).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(outcome.attempts, 4);
        assert!(failure.details.contains("Authentication failed (401)"));
        assert!(failure.details.contains("OPENAI_API_KEY"));
        assert!(failure.details.contains("Incorrect API key provided"));
        assert_eq!(costs.actual_costs().failed_requests, 4);
    }

    #[tokio::test]
    async fn test_refusal_is_terminal() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new(vec![completion("I'm sorry, I can't help with that.")]);
        let (client, _) = client(transport, 3);

        let outcome = client.analyze(&screenshot(&dir)).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(failure.kind, FailureKind::Refused);
        assert_eq!(failure.summary, "AI declined to analyze this content");
        assert!(failure.details.contains("sensitive or personal"));
    }

    #[tokio::test]
    async fn test_malformed_success_falls_back() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new(vec![Ok(json!({ "data": "invalid structure" }))]);
        let (client, _) = client(transport, 3);

        let outcome = client.analyze(&screenshot(&dir)).await;
        assert_eq!(outcome.description(), Some("Screenshot content"));
    }

    #[tokio::test]
    async fn test_corrupt_image_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Screenshot 2025-06-09 at 9.15.24.png");
        std::fs::write(&path, b"not an image").unwrap();

        // No scripted responses: any request would panic
        let (client, costs) = client(ScriptedTransport::new(vec![]), 3);

        let outcome = client.analyze(&path).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(outcome.attempts, 0);
        assert_eq!(failure.kind, FailureKind::ImagePreparation);
        assert_eq!(failure.summary, "Failed to process image file");
        assert!(failure.details.contains("Could not read, convert, or encode"));
        assert!(failure.details.contains("corrupted or in an unsupported format"));
        assert_eq!(costs.actual_costs().total_requests(), 0);
    }

    /// Fails the request and corrupts the image before the retry
    struct CorruptingTransport {
        path: PathBuf,
    }

    #[async_trait]
    impl VisionTransport for CorruptingTransport {
        async fn complete(&self, _request: &ChatRequest) -> std::result::Result<Value, ApiFailure> {
            std::fs::write(&self.path, b"truncated").unwrap();
            http(503, "busy")
        }

        async fn list_models(&self) -> std::result::Result<Value, ApiFailure> {
            Ok(json!({ "data": [] }))
        }
    }

    #[tokio::test]
    async fn test_image_failure_after_retry_keeps_earlier_attempts() {
        let dir = TempDir::new().unwrap();
        let path = screenshot(&dir);
        let costs = Arc::new(CostCalculator::new());
        let client = AnalysisClient::with_transport(
            Box::new(CorruptingTransport { path: path.clone() }),
            &config(3),
            costs.clone(),
        )
        .with_backoff_unit(Duration::ZERO);

        let outcome = client.analyze(&path).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(failure.kind, FailureKind::ImagePreparation);
        assert_eq!(failure.summary, "Failed to process image file");

        let earlier = failure.details.find("Attempt 1: Service unavailable (503)").unwrap();
        let image = failure.details.find("Could not read, convert, or encode").unwrap();
        assert!(earlier < image);
        assert_eq!(costs.actual_costs().failed_requests, 1);
    }

    #[tokio::test]
    async fn test_connection_ready() {
        let transport = ScriptedTransport::new(vec![]).with_models(Ok(json!({
            "data": [ { "id": "gpt-4-vision-preview" }, { "id": "gpt-4" } ]
        })));
        let (client, _) = client(transport, 3);

        let status = client.check_connection().await;
        assert!(status.is_ok());
        let message = status.message();
        assert!(message.contains("API connection successful"));
        assert!(message.contains("gpt-4-vision-preview"));
        assert!(message.contains("available"));
    }

    #[tokio::test]
    async fn test_connection_model_missing_is_soft_failure() {
        let transport = ScriptedTransport::new(vec![]).with_models(Ok(json!({
            "data": [ { "id": "gpt-4" }, { "id": "gpt-3.5-turbo" }, { "bogus": true } ]
        })));
        let (client, _) = client(transport, 3);

        let status = client.check_connection().await;
        assert!(!status.is_ok());
        assert!(status.is_connected());
        let message = status.message();
        assert!(message.contains("API connection successful"));
        assert!(message.contains("not available"));
        assert!(message.contains("Available models include: gpt-4, gpt-3.5-turbo"));
    }

    #[tokio::test]
    async fn test_connection_auth_failure() {
        let transport = ScriptedTransport::new(vec![]).with_models(http(401, "Invalid API key"));
        let (client, _) = client(transport, 3);

        let status = client.check_connection().await;
        assert!(!status.is_connected());
        let message = status.message();
        assert!(message.contains("Authentication failed"));
        assert!(message.contains("Invalid API key"));
    }
}
