// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for the screenshot renamer
//!
//! Only setup-level failures use these. Per-file problems are reported
//! through `RenameOutcome` and `AnalysisOutcome` instead.

use thiserror::Error;

/// Result type alias for renamer operations
pub type Result<T> = std::result::Result<T, RenamerError>;

/// Renamer error types
#[derive(Error, Debug)]
pub enum RenamerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scan pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}
