// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sequential processing of capture groups
//!
//! One analysis per group, its description shared by every member.

use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::{
    proposed_group_name, rename_group, validate_file_access, CaptureGroups, ScreenshotRecord,
};
use crate::config::AppConfig;
use crate::session_log::ActionLog;
use crate::vision::AnalysisClient;

/// Knobs for one batch run
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Log proposed names instead of renaming
    pub dry_run: bool,
    /// Pause between groups
    pub group_delay: Duration,
    /// Log progress every N files; 0 disables intermediate lines
    pub progress_interval: usize,
}

impl BatchSettings {
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Self {
        Self {
            dry_run,
            group_delay: Duration::from_millis(config.group_delay_ms),
            progress_interval: config.progress_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub groups_processed: usize,
    pub groups_skipped: usize,
    pub files_processed: usize,
}

/// Analyze and rename every group in key order.
///
/// Per-group failures are logged and skipped; nothing here aborts the batch.
pub async fn process_groups(
    groups: &CaptureGroups,
    client: &AnalysisClient,
    log: &mut ActionLog,
    settings: &BatchSettings,
) -> BatchReport {
    let total_files: usize = groups.values().map(Vec::len).sum();
    let mut report = BatchReport::default();
    let mut next_progress = settings.progress_interval;

    for (index, (key, group)) in groups.iter().enumerate() {
        let Some(representative) = group.first() else {
            continue;
        };

        if group.len() > 1 {
            info!("Processing group {} with {} files", key, group.len());
        }

        if process_group(group, representative, client, log, settings).await {
            report.groups_processed += 1;
        } else {
            report.groups_skipped += 1;
        }
        report.files_processed += group.len();

        if settings.progress_interval > 0 && report.files_processed >= next_progress {
            log.log_progress(report.files_processed, total_files);
            while next_progress <= report.files_processed {
                next_progress += settings.progress_interval;
            }
        }

        if index + 1 < groups.len() && !settings.group_delay.is_zero() {
            debug!("Pausing {:?} before next group", settings.group_delay);
            tokio::time::sleep(settings.group_delay).await;
        }
    }

    log.log_progress(report.files_processed, total_files);
    report
}

/// Returns whether the group got a description
async fn process_group(
    group: &[ScreenshotRecord],
    representative: &ScreenshotRecord,
    client: &AnalysisClient,
    log: &mut ActionLog,
    settings: &BatchSettings,
) -> bool {
    if !validate_file_access(&representative.path) {
        log.log_error("Cannot access file", Some(&representative.original_name));
        return false;
    }

    log.log_analysis_start(&representative.original_name);
    let outcome = client.analyze(&representative.path).await;
    log.log_analysis_result(&representative.original_name, &outcome);

    let Some(description) = outcome.description() else {
        return false;
    };

    if settings.dry_run {
        for record in group {
            log.log_dry_run(&record.path, &proposed_group_name(record, description));
        }
    } else {
        for result in rename_group(group, description) {
            log.log_rename_result(&result);
        }
    }

    true
}
