// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Screenshot discovery, grouping and renaming
//!
//! Scans one flat directory for macOS screenshot files, parses the capture
//! timestamp and `(N)` sequence suffix out of each name, and groups files
//! that were captured together so they can share one description.

pub mod pattern;
pub mod rename;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::Result;
use pattern::ScreenshotMatcher;

pub use rename::{
    proposed_group_name, rename_group, rename_single, resolve_conflict, sanitize_description,
    RenameOutcome,
};

/// Glob prefixes enumerated by a scan; nothing else is ever inspected
pub const SCAN_GLOBS: [&str; 2] = ["Screenshot*.png", "Screen Shot*.png"];

/// Which macOS naming convention a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatVariant {
    /// `Screenshot ...` (current macOS)
    Modern,
    /// `Screen Shot ...` (older macOS)
    Legacy,
}

impl FormatVariant {
    /// Filename prefix used when composing a new name
    pub fn prefix(self) -> &'static str {
        match self {
            FormatVariant::Modern => "Screenshot",
            FormatVariant::Legacy => "Screen Shot",
        }
    }
}

/// A recognized screenshot file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotRecord {
    pub path: PathBuf,
    pub original_name: String,
    /// Capture-time text, e.g. `2025-06-09 at 9.15.24`. Compared verbatim.
    pub timestamp_key: String,
    /// The `(N)` suffix; `None` for the first or only file of a capture
    pub sequence_number: Option<u32>,
    pub format_variant: FormatVariant,
}

impl ScreenshotRecord {
    /// Parse a path into a record, or `None` if the name is not a screenshot
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let parsed = ScreenshotMatcher::standard().parse(name)?;

        Some(Self {
            path: path.to_path_buf(),
            original_name: name.to_string(),
            timestamp_key: parsed.timestamp_key,
            sequence_number: parsed.sequence_number,
            format_variant: parsed.format_variant,
        })
    }
}

/// Records sharing a capture moment, keyed by timestamp text.
/// Each list is ordered unnumbered first, then by ascending sequence number.
pub type CaptureGroups = BTreeMap<String, Vec<ScreenshotRecord>>;

/// Scanner for a single screenshot directory
pub struct ScreenshotCatalog {
    dir: PathBuf,
}

impl ScreenshotCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Find every recognized screenshot in the directory (non-recursive).
    ///
    /// Modern-prefixed files are returned before legacy ones, each in
    /// glob (lexical) order.
    pub fn scan(&self) -> Result<Vec<ScreenshotRecord>> {
        let base = glob::Pattern::escape(&self.dir.to_string_lossy());
        let mut records = Vec::new();

        for prefix_glob in SCAN_GLOBS {
            let pattern = format!("{}/{}", base, prefix_glob);
            for entry in glob::glob(&pattern)? {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };

                if !path.is_file() {
                    continue;
                }

                match ScreenshotRecord::from_path(&path) {
                    Some(record) => records.push(record),
                    None => debug!("Not a screenshot name: {:?}", path.file_name()),
                }
            }
        }

        Ok(records)
    }

    /// Number of recognized screenshots
    pub fn count(&self) -> Result<usize> {
        Ok(self.scan()?.len())
    }
}

/// Group records by exact timestamp text.
///
/// The sort is stable, so records with equal sequence numbers keep scan order.
pub fn group_by_timestamp(records: Vec<ScreenshotRecord>) -> CaptureGroups {
    let mut groups = CaptureGroups::new();
    for record in records {
        groups
            .entry(record.timestamp_key.clone())
            .or_default()
            .push(record);
    }

    for group in groups.values_mut() {
        group.sort_by_key(|r| r.sequence_number.unwrap_or(0));
    }

    groups
}

/// A file is worth analyzing only if it can afterwards be renamed:
/// it must exist and be readable, and its directory must be writable.
pub fn validate_file_access(path: &Path) -> bool {
    if !path.is_file() || File::open(path).is_err() {
        return false;
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    dir_is_writable(parent)
}

/// Whether this process may create entries in `dir` (`access(2)` with `W_OK`)
#[cfg(unix)]
pub fn dir_is_writable(dir: &Path) -> bool {
    dir.is_dir() && rustix::fs::access(dir, rustix::fs::Access::WRITE_OK).is_ok()
}

/// Whether this process may create entries in `dir`
#[cfg(not(unix))]
pub fn dir_is_writable(dir: &Path) -> bool {
    std::fs::metadata(dir)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false)
}
