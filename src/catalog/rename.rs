// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Composing new names and moving files
//!
//! Renames never fail loudly: each attempt produces a `RenameOutcome`
//! so one stubborn file cannot stop a batch.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ScreenshotRecord;

/// Characters removed from descriptions. `.` is included so a description
/// can never smuggle in an extension.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '.'];

/// Longest description kept in a filename, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 50;

/// Used when a description sanitizes away to nothing
const EMPTY_DESCRIPTION_FALLBACK: &str = "Screenshot content";

/// Result of one rename attempt
#[derive(Debug, Clone, Serialize)]
pub struct RenameOutcome {
    pub original_path: PathBuf,
    /// New location on success, error text on failure
    pub result: std::result::Result<PathBuf, String>,
}

impl RenameOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn new_path(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Clean a model description for use inside a filename
pub fn sanitize_description(description: &str) -> String {
    let stripped: String = description
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    let Some(first) = chars.next() else {
        return EMPTY_DESCRIPTION_FALLBACK.to_string();
    };
    let capitalized = format!("{}{}", capitalize_char(first), chars.as_str().to_lowercase());

    truncate_at_word(&capitalized, MAX_DESCRIPTION_CHARS)
}

/// Single-character uppercase of `c`. Characters whose uppercase form
/// expands (`ß` to `SS`) stay as they are.
fn capitalize_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Cut to `max` characters, backing up to the previous space if the cut
/// would split a word. A single word longer than `max` is cut mid-word.
fn truncate_at_word(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let cut = text.char_indices().nth(max).map(|(i, _)| i).unwrap_or(text.len());
    let head = &text[..cut];
    let lands_on_boundary = text[cut..].starts_with(' ');

    let kept = if lands_on_boundary {
        head
    } else {
        match head.rfind(' ') {
            Some(space) => &head[..space],
            None => head,
        }
    };

    kept.trim_end().to_string()
}

/// Return `target` if free, otherwise the first free `<stem> (k).<ext>`, k = 1, 2, ...
pub fn resolve_conflict(target: &Path) -> PathBuf {
    if !target.exists() {
        return target.to_path_buf();
    }

    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|k| parent.join(format!("{} ({}){}", stem, k, ext)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| target.to_path_buf())
}

/// Filename a grouped rename would give `record`:
/// `<prefix> <timestamp> - <description>[ (<n>)].png`
pub fn proposed_group_name(record: &ScreenshotRecord, description: &str) -> String {
    let base = format!(
        "{} {} - {}",
        record.format_variant.prefix(),
        record.timestamp_key,
        sanitize_description(description)
    );

    match record.sequence_number {
        Some(n) => format!("{} ({}).png", base, n),
        None => format!("{}.png", base),
    }
}

/// Rename every record of a capture group with one shared description.
/// Each record keeps its own prefix and sequence suffix.
pub fn rename_group(records: &[ScreenshotRecord], description: &str) -> Vec<RenameOutcome> {
    records
        .iter()
        .map(|record| execute_rename(record, &proposed_group_name(record, description)))
        .collect()
}

/// Append the description to the original name, keeping it verbatim:
/// `<original without .png> - <description>.png`
pub fn rename_single(record: &ScreenshotRecord, description: &str) -> RenameOutcome {
    let stem = record
        .original_name
        .strip_suffix(".png")
        .unwrap_or(&record.original_name);
    let new_name = format!("{} - {}.png", stem, sanitize_description(description));

    execute_rename(record, &new_name)
}

fn execute_rename(record: &ScreenshotRecord, new_name: &str) -> RenameOutcome {
    let original_path = record.path.clone();
    let parent = original_path.parent().unwrap_or_else(|| Path::new(""));
    let target = resolve_conflict(&parent.join(new_name));

    // rename(2) silently replaces an existing target on Unix
    if target.exists() {
        return RenameOutcome {
            original_path,
            result: Err(format!("Target already exists: {}", target.display())),
        };
    }

    debug!("Renaming {:?} -> {:?}", original_path, target);
    match std::fs::rename(&original_path, &target) {
        Ok(()) => {
            info!("Renamed to: {:?}", target.file_name().unwrap_or_default());
            RenameOutcome { original_path, result: Ok(target) }
        }
        Err(e) => RenameOutcome { original_path, result: Err(e.to_string()) },
    }
}
