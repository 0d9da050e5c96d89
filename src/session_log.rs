// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Append-only audit trail of a renaming session
//!
//! Every line is written and flushed as the event happens, so an
//! interrupted run still leaves a complete record up to that point.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::catalog::RenameOutcome;
use crate::cost::{ActualCosts, CostEstimate};
use crate::vision::AnalysisOutcome;

const RULE: &str = "============================================================";

/// Counters for one session
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub total_files: usize,
    pub successful_renames: usize,
    pub failed_renames: usize,
    pub api_failures: usize,
    pub errors: Vec<String>,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}

impl ProcessingSummary {
    fn new() -> Self {
        let now = Local::now();
        Self {
            total_files: 0,
            successful_renames: 0,
            failed_renames: 0,
            api_failures: 0,
            errors: Vec::new(),
            estimated_cost: 0.0,
            actual_cost: 0.0,
            start_time: now,
            end_time: now,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Percentage of found files that were renamed
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.successful_renames as f64 / self.total_files as f64 * 100.0
        }
    }

    fn render(&self) -> String {
        let duration = self.duration();
        let mut text = format!(
            "\nProcessing Summary:\n\
             ------------------\n\
             Total files found: {}\n\
             Successful renames: {}\n\
             Failed renames: {}\n\
             API failures: {}\n\
             Success rate: {:.1}%\n\
             Duration: {}.{:03}s\n\
             \n\
             Cost Information:\n\
             -----------------\n\
             Estimated cost: ${:.4}\n\
             Actual cost: ${:.4}\n\
             Cost per file: ${:.4}\n",
            self.total_files,
            self.successful_renames,
            self.failed_renames,
            self.api_failures,
            self.success_rate(),
            duration.num_seconds(),
            duration.num_milliseconds().rem_euclid(1000),
            self.estimated_cost,
            self.actual_cost,
            self.actual_cost / self.successful_renames.max(1) as f64,
        );

        if !self.errors.is_empty() {
            text.push_str(&format!("\nErrors ({}):\n", self.errors.len()));
            for (i, error) in self.errors.iter().enumerate() {
                text.push_str(&format!("  {}. {}\n", i + 1, error));
            }
        }

        text
    }
}

/// Session log writer
pub struct ActionLog {
    path: PathBuf,
    summary: ProcessingSummary,
}

impl ActionLog {
    /// Start a session, appending its header to `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let log = Self {
            path: path.into(),
            summary: ProcessingSummary::new(),
        };
        let header = format!(
            "\n{}\nScreenshot Renaming Session - {}\n{}",
            RULE,
            log.summary.start_time.format("%Y-%m-%d %H:%M:%S"),
            RULE
        );
        log.write(&header);
        log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> &ProcessingSummary {
        &self.summary
    }

    fn write(&self, line: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                writeln!(file, "{}", line)?;
                file.flush()
            });

        if let Err(e) = result {
            warn!("Failed to write session log {:?}: {}", self.path, e);
        }
    }

    fn entry(&self, tag: &str, message: &str) {
        self.write(&format!("[{}] {}", tag, message));
    }

    pub fn log_scan_results(&mut self, total_files: usize) {
        self.summary.total_files = total_files;
        let message = format!("Found {} screenshot files to process", total_files);
        info!("{}", message);
        self.entry("SCAN", &message);
    }

    /// `groups` API calls will cover `files` screenshots
    pub fn log_cost_estimate(&mut self, estimate: &CostEstimate, files: usize) {
        self.summary.estimated_cost = estimate.total_estimated_cost;
        info!(
            "Estimated cost: ${:.4} ({} API calls instead of {})",
            estimate.total_estimated_cost, estimate.total_images, files
        );
        info!("  Image processing: ${:.4}", estimate.estimated_image_cost);
        info!("  Token generation: ${:.4}", estimate.estimated_token_cost);
        info!("  Average image size: {:.2} MB", estimate.avg_image_size_mb);
        self.entry(
            "COST_ESTIMATE",
            &format!("{} ({} API calls instead of {})", estimate, estimate.total_images, files),
        );
    }

    pub fn log_actual_costs(&mut self, costs: &ActualCosts) {
        self.summary.actual_cost = costs.estimated_cost;
        info!("Actual cost: ${:.4}", costs.estimated_cost);
        self.entry("ACTUAL_COSTS", &costs.to_string());
    }

    pub fn log_analysis_start(&mut self, filename: &str) {
        let message = format!("Analyzing: {}", filename);
        info!("{}", message);
        self.entry("ANALYSIS", &message);
    }

    pub fn log_analysis_result(&mut self, filename: &str, outcome: &AnalysisOutcome) {
        let message = match &outcome.result {
            Ok(description) => {
                let mut message = format!("Generated description for {}: '{}'", filename, description);
                if outcome.retries() > 0 {
                    message.push_str(&format!(" (after {} retries)", outcome.retries()));
                }
                info!("{}", message);
                message
            }
            Err(failure) => {
                self.summary.api_failures += 1;
                self.summary.errors.push(format!(
                    "Analysis failed for {}: {} | {}",
                    filename, failure.summary, failure.details
                ));
                let message = format!(
                    "Failed to analyze {}: {}\n    Details: {}",
                    filename, failure.summary, failure.details
                );
                warn!("{}", message);
                message
            }
        };
        self.entry("ANALYSIS", &message);
    }

    pub fn log_rename_result(&mut self, outcome: &RenameOutcome) {
        let original = display_name(&outcome.original_path);
        let message = match &outcome.result {
            Ok(new_path) => {
                self.summary.successful_renames += 1;
                format!("Renamed: {} -> {}", original, display_name(new_path))
            }
            Err(e) => {
                self.summary.failed_renames += 1;
                self.summary
                    .errors
                    .push(format!("Rename failed for {}: {}", original, e));
                format!("Failed to rename {}: {}", original, e)
            }
        };
        info!("{}", message);
        self.entry("RENAME", &message);
    }

    /// Record the name a file would receive, without counting a rename
    pub fn log_dry_run(&mut self, original: &Path, proposed: &str) {
        let message = format!("Would rename: {} -> {}", display_name(original), proposed);
        info!("{}", message);
        self.entry("RENAME", &format!("(dry run) {}", message));
    }

    pub fn log_progress(&mut self, current: usize, total: usize) {
        let percentage = if total > 0 {
            current as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let message = format!("Progress: {}/{} ({:.1}%)", current, total, percentage);
        info!("{}", message);
        self.entry("PROGRESS", &message);
    }

    pub fn log_error(&mut self, message: &str, context: Option<&str>) {
        let mut full = format!("ERROR: {}", message);
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            full.push_str(&format!(" (Context: {})", context));
        }
        error!("{}", full);
        self.summary.errors.push(full.clone());
        self.entry("ERROR", &full);
    }

    /// Close the session with the summary block
    pub fn finish(&mut self) -> ProcessingSummary {
        self.summary.end_time = Local::now();
        let text = self.summary.render();
        for line in text.lines().filter(|l| !l.is_empty()) {
            info!("{}", line);
        }
        self.entry("SUMMARY", &text);
        self.summary.clone()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
