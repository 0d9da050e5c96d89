// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! User-facing failure text
//!
//! Every explanation the analysis client can produce lives here, so the
//! status-code table reads as one piece of data.

use super::transport::{ApiFailure, TransportKind};

/// Description used when a 200 response carries nothing usable
pub const FALLBACK_DESCRIPTION: &str = "Screenshot content";

pub const IMAGE_PREPARATION_FAILED: &str = "Failed to process image file";
pub const IMAGE_PREPARATION_DETAILS: &str = "Could not read, convert, or encode the image ({error}). \
     The file may be corrupted or in an unsupported format.";

pub const REFUSAL_SUMMARY: &str = "AI declined to analyze this content";
pub const REFUSAL_DETAILS: &str = "The model refused to describe this screenshot. This usually means \
     it shows sensitive or personal content (private messages, documents, faces). \
     The file was left unchanged. Model response: '{response}'";

pub const EXHAUSTED_SUMMARY: &str = "Failed after {attempts} attempts";

/// Values substituted into explanation templates
#[derive(Debug, Clone)]
pub struct ExplainContext<'a> {
    pub model: &'a str,
    pub timeout_secs: u64,
}

/// One row of the HTTP status table. `needle`, when present, must appear
/// (case-insensitively) in the upstream message for the row to apply.
struct StatusRule {
    status: u16,
    needle: Option<&'static str>,
    explanation: &'static str,
}

const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        status: 401,
        needle: None,
        explanation: "Authentication failed (401): Invalid or expired API key. \
                      Check OPENAI_API_KEY in your environment or config file.",
    },
    StatusRule {
        status: 403,
        needle: None,
        explanation: "Permission denied (403): Your API key does not have access to this \
                      resource. Check your organization and project permissions.",
    },
    StatusRule {
        status: 429,
        needle: Some("quota"),
        explanation: "Quota exceeded (429): You have reached your usage limit. \
                      Check your plan and billing details.",
    },
    StatusRule {
        status: 429,
        needle: None,
        explanation: "Rate limit exceeded (429): Too many requests in a short time. \
                      The request will be retried with backoff.",
    },
    StatusRule {
        status: 400,
        needle: Some("model"),
        explanation: "Invalid model (400): The model '{model}' may not exist or may not \
                      support images. Check OPENAI_MODEL.",
    },
    StatusRule {
        status: 400,
        needle: None,
        explanation: "Bad request (400): The API rejected the request format. \
                      The image may be too large or malformed.",
    },
    StatusRule {
        status: 404,
        needle: None,
        explanation: "Not found (404): The API endpoint or model was not found. \
                      Check OPENAI_BASE_URL and OPENAI_MODEL.",
    },
    StatusRule {
        status: 422,
        needle: None,
        explanation: "Unprocessable entity (422): The request was understood but rejected, \
                      often because of unsupported image formats or sizes.",
    },
    StatusRule {
        status: 500,
        needle: None,
        explanation: "OpenAI server error (500): This is usually temporary. \
                      The request will be retried.",
    },
    StatusRule {
        status: 502,
        needle: None,
        explanation: "Bad gateway (502): A problem in the API's server infrastructure. \
                      Usually temporary.",
    },
    StatusRule {
        status: 503,
        needle: None,
        explanation: "Service unavailable (503): The API is overloaded or down for \
                      maintenance. Try again later.",
    },
    StatusRule {
        status: 504,
        needle: None,
        explanation: "Gateway timeout (504): The request took too long to process. \
                      Large images or a busy service can cause this.",
    },
];

const UNKNOWN_STATUS: &str = "HTTP {status} error: The API returned an unexpected status.";

fn transport_explanation(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::Connect => "Network connection error: Could not reach the API. \
             Check your internet connection, proxy, and firewall settings.",
        TransportKind::Timeout => "Request timeout: The API did not respond within \
             {timeout} seconds. Raise API_TIMEOUT if this keeps happening.",
        TransportKind::Tls => "SSL/TLS error: Could not establish a secure connection. \
             Check system certificates and any intercepting proxy.",
        TransportKind::TooManyRedirects => "Too many redirects: Check the API URL configuration \
             (OPENAI_BASE_URL).",
        TransportKind::ChunkedEncoding => "Chunked encoding error: The connection broke while \
             receiving response data.",
        TransportKind::ContentDecoding => "Content decoding error: Failed while decoding the \
             response from the API.",
        TransportKind::Other => "Network request error: The request could not be completed.",
    }
}

/// Explain one failed request in terms a user can act on.
///
/// Upstream or underlying error text is always appended when present.
pub fn explain(failure: &ApiFailure, ctx: &ExplainContext<'_>) -> String {
    match failure {
        ApiFailure::Http { status, message } => {
            let lowered = message.as_deref().unwrap_or("").to_lowercase();
            let template = STATUS_RULES
                .iter()
                .find(|rule| {
                    rule.status == *status
                        && rule.needle.map_or(true, |needle| lowered.contains(needle))
                })
                .map(|rule| rule.explanation)
                .unwrap_or(UNKNOWN_STATUS);

            let text = fill(template, ctx).replace("{status}", &status.to_string());
            match message {
                Some(m) => format!("{} API message: {}", text, m),
                None => text,
            }
        }
        ApiFailure::Transport { kind, message } => {
            format!("{} ({})", fill(transport_explanation(*kind), ctx), message)
        }
        ApiFailure::Other { category, message } => {
            format!("Unexpected error ({}): {}", category, message)
        }
    }
}

fn fill(template: &str, ctx: &ExplainContext<'_>) -> String {
    template
        .replace("{model}", ctx.model)
        .replace("{timeout}", &ctx.timeout_secs.to_string())
}

pub fn image_preparation_details(error: &str) -> String {
    IMAGE_PREPARATION_DETAILS.replace("{error}", error)
}

pub fn refusal_details(response: &str) -> String {
    let excerpt: String = response.chars().take(50).collect();
    REFUSAL_DETAILS.replace("{response}", &excerpt)
}

pub fn exhausted_summary(attempts: u32) -> String {
    EXHAUSTED_SUMMARY.replace("{attempts}", &attempts.to_string())
}
