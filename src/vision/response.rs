// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Turning an untrusted completion payload into a short description

use serde_json::Value;
use tracing::{debug, warn};

use super::messages::FALLBACK_DESCRIPTION;

/// Lowercase substrings that mark a model declining to describe an image
pub const REFUSAL_PHRASES: [&str; 16] = [
    "i'm sorry, i can't help",
    "i can't help with that",
    "i'm not able to help",
    "i cannot help",
    "i'm sorry, but i can't",
    "i can't assist with",
    "i'm unable to help",
    "i cannot assist",
    "i'm sorry, i cannot",
    "i can't provide",
    "i'm not able to provide",
    "i cannot provide",
    "i can't analyze",
    "i cannot analyze",
    "i'm not able to analyze",
    "i'm sorry, i can't analyze",
];

/// Lead-ins models like to add; stripped case-insensitively
const BOILERPLATE_PREFIXES: [&str; 6] = [
    "This screenshot shows",
    "The screenshot shows",
    "This image shows",
    "The image shows",
    "Screenshot of",
    "Image of",
];

pub const MAX_DESCRIPTION_WORDS: usize = 5;

/// What a 200 response amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Usable description (possibly the fallback placeholder)
    Description(String),
    /// The model declined; carries the raw text
    Refusal(String),
}

/// Interpret a completion payload. Malformed payloads never fail: they
/// degrade to the placeholder description.
pub fn interpret(payload: &Value) -> Interpretation {
    let raw = match extract_content(payload) {
        Some(text) => text,
        None => return Interpretation::Description(FALLBACK_DESCRIPTION.to_string()),
    };

    let unquoted = strip_quotes(&raw);
    if unquoted.is_empty() {
        debug!("Empty completion content, using fallback description");
        return Interpretation::Description(FALLBACK_DESCRIPTION.to_string());
    }

    if is_refusal(unquoted) {
        let excerpt: String = unquoted.chars().take(50).collect();
        warn!("AI refused to analyze image (safety filter): {}...", excerpt);
        return Interpretation::Refusal(unquoted.to_string());
    }

    Interpretation::Description(clean_description(unquoted))
}

/// Walk `choices[0].message.content`, checking shape at every level
fn extract_content(payload: &Value) -> Option<String> {
    let Some(root) = payload.as_object() else {
        warn!("API response is not a JSON object");
        return None;
    };

    let Some(first) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        warn!("API response has no choices");
        return None;
    };

    let Some(content) = first.get("message").and_then(|m| m.get("content")) else {
        warn!("API response choice has no message content");
        return None;
    };

    match content {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn strip_quotes(text: &str) -> &str {
    text.trim().trim_matches('"').trim_matches('\'').trim()
}

/// Case-insensitive substring match against [`REFUSAL_PHRASES`].
/// Typographic apostrophes count as plain ones.
pub fn is_refusal(text: &str) -> bool {
    let lowered = text.replace('\u{2019}', "'").to_lowercase();
    REFUSAL_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Strip boilerplate lead-ins and cap to five words
pub fn clean_description(text: &str) -> String {
    let mut description = text.trim();
    for prefix in BOILERPLATE_PREFIXES {
        let matches = description
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            description = description[prefix.len()..].trim();
        }
    }

    let capped = description
        .split_whitespace()
        .take(MAX_DESCRIPTION_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    if capped.chars().count() < 2 {
        FALLBACK_DESCRIPTION.to_string()
    } else {
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completion(content: Value) -> Value {
        json!({ "choices": [ { "message": { "content": content } } ] })
    }

    fn describe(text: &str) -> Interpretation {
        interpret(&completion(json!(text)))
    }

    fn fallback() -> Interpretation {
        Interpretation::Description(FALLBACK_DESCRIPTION.to_string())
    }

    #[test]
    fn test_plain_description() {
        assert_eq!(
            describe("Code editor Python file"),
            Interpretation::Description("Code editor Python file".to_string())
        );
    }

    #[test]
    fn test_malformed_payloads_fall_back() {
        assert_eq!(interpret(&json!({ "data": "invalid structure" })), fallback());
        assert_eq!(interpret(&json!({ "choices": [] })), fallback());
        assert_eq!(interpret(&json!({ "choices": "nope" })), fallback());
        assert_eq!(interpret(&json!({ "choices": [ { "text": "legacy" } ] })), fallback());
        assert_eq!(interpret(&json!(["not", "an", "object"])), fallback());
        assert_eq!(interpret(&Value::Null), fallback());
    }

    #[test]
    fn test_null_and_blank_content_fall_back() {
        assert_eq!(interpret(&completion(Value::Null)), fallback());
        assert_eq!(describe("   "), fallback());
        assert_eq!(describe("\"\""), fallback());
    }

    #[test]
    fn test_non_string_content_is_coerced() {
        assert_eq!(
            interpret(&completion(json!(123))),
            Interpretation::Description("123".to_string())
        );
    }

    #[test]
    fn test_all_canonical_refusals_detected() {
        let refusals = [
            "I'm sorry, I can't help with that request.",
            "I can't help with that.",
            "I'm not able to help with this image.",
            "I cannot help analyze this content.",
            "I'm sorry, but I can't provide information about this image.",
            "I can't assist with analyzing this screenshot.",
            "I'm unable to help with this request.",
            "I cannot assist with this type of content.",
            "I'm sorry, I cannot analyze this image.",
            "I can't provide a description of this content.",
            "I'm not able to provide analysis of this image.",
            "I cannot provide information about this screenshot.",
            "I can't analyze this type of content.",
            "I cannot analyze images containing children.",
            "I'm not able to analyze this screenshot.",
            "I'm sorry, I can't analyze this image.",
        ];
        for text in refusals {
            assert!(
                matches!(describe(text), Interpretation::Refusal(_)),
                "missed refusal: {}",
                text
            );
        }
    }

    #[test]
    fn test_refusal_is_case_insensitive_substring() {
        assert!(matches!(describe("I'M SORRY, I CAN'T HELP"), Interpretation::Refusal(_)));
        assert!(matches!(describe("I Can't Help With That"), Interpretation::Refusal(_)));
        assert!(matches!(
            describe("Unfortunately, I can't analyze this type of content for safety reasons."),
            Interpretation::Refusal(_)
        ));
        assert!(matches!(
            describe("\"i can't help with that\""),
            Interpretation::Refusal(_)
        ));
        assert!(matches!(
            describe("I\u{2019}m sorry, I can\u{2019}t help with this."),
            Interpretation::Refusal(_)
        ));
    }

    #[test]
    fn test_near_misses_are_not_refusals() {
        for text in [
            "I can help you with this screenshot",
            "This image cannot be displayed properly",
            "I'm sorry to say this is a complex interface",
            "Web browser article reading",
        ] {
            assert!(
                matches!(describe(text), Interpretation::Description(_)),
                "false refusal: {}",
                text
            );
        }
    }

    #[test]
    fn test_quotes_and_prefixes_stripped() {
        assert_eq!(clean_description("This screenshot shows a terminal"), "a terminal");
        assert_eq!(clean_description("screenshot of Settings panel"), "Settings panel");
        assert_eq!(
            describe("'The image shows email inbox'"),
            Interpretation::Description("email inbox".to_string())
        );
    }

    #[test]
    fn test_capped_at_five_words() {
        assert_eq!(
            clean_description("Video conference call with six participants today"),
            "Video conference call with six"
        );
        assert_eq!(clean_description("one two three four five six"), "one two three four five");
    }

    #[test]
    fn test_too_short_after_cleanup_falls_back() {
        assert_eq!(clean_description("Image of"), FALLBACK_DESCRIPTION);
        assert_eq!(clean_description("x"), FALLBACK_DESCRIPTION);
        assert_eq!(clean_description("ok"), "ok");
    }

    #[test]
    fn test_multibyte_text_does_not_panic_on_prefix_check() {
        assert_eq!(clean_description("日本語のスクリーンショット"), "日本語のスクリーンショット");
    }
}
