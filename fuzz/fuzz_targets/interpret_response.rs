// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use screenshot_renamer::vision::response::{interpret, Interpretation, MAX_DESCRIPTION_WORDS};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Interpretation::Description(text) = interpret(&payload) {
        assert!(text.split_whitespace().count() <= MAX_DESCRIPTION_WORDS);
    }
});
