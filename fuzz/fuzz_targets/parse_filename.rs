// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use screenshot_renamer::catalog::pattern::ScreenshotMatcher;
use screenshot_renamer::catalog::sanitize_description;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(parsed) = ScreenshotMatcher::standard().parse(text) {
        assert!(text.ends_with(".png"));
        assert!(text.contains(&parsed.timestamp_key));
    }

    let sanitized = sanitize_description(text);
    assert!(!sanitized.is_empty());
    assert!(!sanitized.contains(['/', '\\', ':', '.']));
});
