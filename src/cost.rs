// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! API usage tracking and rough cost estimates

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use crate::catalog::CaptureGroups;

/// Approximate vision pricing: per-image base charge
pub const COST_PER_IMAGE_BASE: f64 = 0.01;
/// Approximate output token pricing
pub const COST_PER_1K_OUTPUT_TOKENS: f64 = 0.03;
/// Typical tokens in a 4-5 word answer
pub const AVERAGE_TOKENS_PER_RESPONSE: u64 = 15;

/// Samples used to estimate average file size
const SIZE_SAMPLE: usize = 5;

/// Receives one callback per API request attempt
pub trait UsageTracker: Send + Sync {
    fn track_request(&self, success: bool, response_text: Option<&str>);
}

/// Pre-run cost estimate
#[derive(Debug, Clone, Default, Serialize)]
pub struct CostEstimate {
    /// API calls expected (one per capture group)
    pub total_images: usize,
    pub estimated_image_cost: f64,
    pub estimated_token_cost: f64,
    pub total_estimated_cost: f64,
    pub avg_image_size_mb: f64,
}

impl CostEstimate {
    fn for_calls(calls: usize, avg_image_size_mb: f64) -> Self {
        if calls == 0 {
            return Self::default();
        }

        let estimated_image_cost = calls as f64 * COST_PER_IMAGE_BASE;
        let estimated_tokens = calls as u64 * AVERAGE_TOKENS_PER_RESPONSE;
        let estimated_token_cost = estimated_tokens as f64 / 1000.0 * COST_PER_1K_OUTPUT_TOKENS;

        Self {
            total_images: calls,
            estimated_image_cost,
            estimated_token_cost,
            total_estimated_cost: estimated_image_cost + estimated_token_cost,
            avg_image_size_mb,
        }
    }

    /// Estimated cost of one call
    pub fn per_call(&self) -> f64 {
        if self.total_images == 0 {
            0.0
        } else {
            self.total_estimated_cost / self.total_images as f64
        }
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Images: {} x ${:.4} = ${:.4}; Tokens: ~{} = ${:.4}; Total: ${:.4}",
            self.total_images,
            self.per_call(),
            self.estimated_image_cost,
            self.total_images as u64 * AVERAGE_TOKENS_PER_RESPONSE,
            self.estimated_token_cost,
            self.total_estimated_cost
        )
    }
}

/// Usage accumulated during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActualCosts {
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_output_tokens: u64,
    pub estimated_cost: f64,
}

impl ActualCosts {
    pub fn add_request(&mut self, success: bool, output_tokens: u64) {
        if success {
            self.successful_requests += 1;
            self.total_output_tokens += output_tokens;
            self.estimated_cost += COST_PER_IMAGE_BASE;
            self.estimated_cost += output_tokens as f64 * COST_PER_1K_OUTPUT_TOKENS / 1000.0;
        } else {
            self.failed_requests += 1;
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.successful_requests + self.failed_requests
    }
}

impl fmt::Display for ActualCosts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successful requests: {}; Failed requests: {}; Estimated tokens: ~{}; Estimated cost: ${:.4}",
            self.successful_requests,
            self.failed_requests,
            self.total_output_tokens,
            self.estimated_cost
        )
    }
}

/// Thread-safe usage tracker and estimator
#[derive(Debug, Default)]
pub struct CostCalculator {
    actual: Mutex<ActualCosts>,
}

impl CostCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One API call per file
    pub fn estimate(&self, paths: &[&Path]) -> CostEstimate {
        CostEstimate::for_calls(paths.len(), average_size_mb(paths))
    }

    /// One API call per capture group; sizes sampled from representatives
    pub fn estimate_grouped(&self, groups: &CaptureGroups) -> CostEstimate {
        let representatives: Vec<&Path> = groups
            .values()
            .filter_map(|group| group.first())
            .map(|record| record.path.as_path())
            .collect();
        CostEstimate::for_calls(groups.len(), average_size_mb(&representatives))
    }

    pub fn actual_costs(&self) -> ActualCosts {
        self.actual.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl UsageTracker for CostCalculator {
    fn track_request(&self, success: bool, response_text: Option<&str>) {
        let tokens = match response_text {
            Some(text) if !text.trim().is_empty() => {
                (text.split_whitespace().count() as f64 * 1.3) as u64
            }
            _ => AVERAGE_TOKENS_PER_RESPONSE,
        };

        if let Ok(mut costs) = self.actual.lock() {
            costs.add_request(success, tokens);
        }
    }
}

fn average_size_mb(paths: &[&Path]) -> f64 {
    let sizes: Vec<f64> = paths
        .iter()
        .take(SIZE_SAMPLE)
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .collect();

    if sizes.is_empty() {
        1.0
    } else {
        sizes.iter().sum::<f64>() / sizes.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{group_by_timestamp, ScreenshotRecord};
    use std::path::PathBuf;

    fn record(name: &str) -> ScreenshotRecord {
        ScreenshotRecord::from_path(&PathBuf::from("/nowhere").join(name)).unwrap()
    }

    #[test]
    fn test_grouped_estimate_counts_groups() {
        let groups = group_by_timestamp(vec![
            record("Screenshot 2025-01-15 at 14.30.22.png"),
            record("Screenshot 2025-01-15 at 14.30.22 (1).png"),
            record("Screenshot 2025-01-15 at 14.31.00.png"),
        ]);

        let estimate = CostCalculator::new().estimate_grouped(&groups);
        assert_eq!(estimate.total_images, 2);
        assert!((estimate.estimated_image_cost - 0.02).abs() < 1e-9);
        assert!((estimate.estimated_token_cost - 0.0009).abs() < 1e-9);
        // Unreadable files fall back to 1 MB
        assert!((estimate.avg_image_size_mb - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_estimate() {
        let estimate = CostCalculator::new().estimate(&[]);
        assert_eq!(estimate.total_images, 0);
        assert_eq!(estimate.total_estimated_cost, 0.0);
        assert_eq!(estimate.per_call(), 0.0);
    }

    #[test]
    fn test_tracking() {
        let calc = CostCalculator::new();
        calc.track_request(true, Some("Code editor python file"));
        calc.track_request(false, None);

        let actual = calc.actual_costs();
        assert_eq!(actual.successful_requests, 1);
        assert_eq!(actual.failed_requests, 1);
        assert_eq!(actual.total_requests(), 2);
        assert_eq!(actual.total_output_tokens, 5);
        assert!((actual.estimated_cost - (0.01 + 5.0 * 0.00003)).abs() < 1e-9);
    }
}
