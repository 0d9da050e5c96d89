// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename patterns for macOS screenshot names
//!
//! `Screenshot 2025-06-09 at 9.15.24.png`, `Screen Shot 2022-05-21 at 21.21.27 (2).png`.

use regex::Regex;
use std::sync::OnceLock;

use super::FormatVariant;

/// What a matching filename yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub timestamp_key: String,
    pub sequence_number: Option<u32>,
    pub format_variant: FormatVariant,
}

/// One naming form: a prefix, plain or numbered
#[derive(Debug)]
pub struct NamePattern {
    variant: FormatVariant,
    numbered: bool,
    regex: Regex,
}

impl NamePattern {
    /// Build a pattern for `prefix`, accepting hours of `min_hour_digits..=2` digits.
    pub fn new(variant: FormatVariant, numbered: bool, min_hour_digits: usize) -> Self {
        let suffix = if numbered { r" \((\d+)\)" } else { "" };
        let source = format!(
            r"^{} (\d{{4}}-\d{{2}}-\d{{2}} at \d{{{},2}}\.\d{{2}}\.\d{{2}}){}\.png$",
            regex::escape(variant.prefix()),
            min_hour_digits.clamp(1, 2),
            suffix,
        );
        let regex = Regex::new(&source).expect("screenshot pattern is a valid regex");

        Self { variant, numbered, regex }
    }

    pub fn variant(&self) -> FormatVariant {
        self.variant
    }

    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Match a bare filename (no directory components)
    pub fn parse(&self, filename: &str) -> Option<ParsedName> {
        let caps = self.regex.captures(filename)?;
        let timestamp_key = caps.get(1)?.as_str().to_string();
        let sequence_number = if self.numbered {
            Some(caps.get(2)?.as_str().parse().ok()?)
        } else {
            None
        };

        Some(ParsedName {
            timestamp_key,
            sequence_number,
            format_variant: self.variant,
        })
    }
}

/// Ordered set of patterns; the first match wins
#[derive(Debug)]
pub struct ScreenshotMatcher {
    patterns: Vec<NamePattern>,
}

impl ScreenshotMatcher {
    /// Numbered forms come before plain ones so `... (1).png` is never
    /// mistaken for an unnumbered capture.
    pub fn new(min_hour_digits: usize) -> Self {
        let patterns = vec![
            NamePattern::new(FormatVariant::Modern, true, min_hour_digits),
            NamePattern::new(FormatVariant::Legacy, true, min_hour_digits),
            NamePattern::new(FormatVariant::Modern, false, min_hour_digits),
            NamePattern::new(FormatVariant::Legacy, false, min_hour_digits),
        ];
        Self { patterns }
    }

    /// Shared matcher accepting one- or two-digit hours
    pub fn standard() -> &'static ScreenshotMatcher {
        static MATCHER: OnceLock<ScreenshotMatcher> = OnceLock::new();
        MATCHER.get_or_init(|| ScreenshotMatcher::new(1))
    }

    pub fn parse(&self, filename: &str) -> Option<ParsedName> {
        self.patterns.iter().find_map(|p| p.parse(filename))
    }

    pub fn patterns(&self) -> &[NamePattern] {
        &self.patterns
    }
}
