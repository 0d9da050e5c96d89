// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Screenshot Renamer: descriptive names for macOS screenshots
//!
//! Finds `Screenshot ... at ....png` files, groups captures taken in the
//! same second, asks a vision model for a short description of each group
//! and renames the files with it.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod session_log;
pub mod vision;

pub use config::AppConfig;
pub use error::{RenamerError, Result};
