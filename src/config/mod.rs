// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for the screenshot renamer
//!
//! Settings come from an optional JSON file and are then overridden by
//! environment variables, so a `.env`-style shell setup keeps working.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{RenamerError, Result};

/// Name of the append-only log written next to the screenshots
pub const LOG_FILE_NAME: &str = "screenshot_rename_log.txt";

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directory holding the screenshots (defaults to ~/Desktop)
    #[serde(default)]
    pub desktop_path: Option<String>,

    /// Session log location (defaults to a file inside the desktop directory)
    #[serde(default)]
    pub log_file: Option<String>,

    /// Vision API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pause between capture groups, in milliseconds
    #[serde(default = "default_group_delay")]
    pub group_delay_ms: u64,

    /// Log a progress line every N files
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Bearer credential; only ever read from the environment or the file
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

// Default value functions
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_model() -> String { "gpt-4o".to_string() }
fn default_max_tokens() -> u32 { 50 }
fn default_temperature() -> f32 { 0.3 }
fn default_timeout() -> u64 { 30 }
fn default_retries() -> u32 { 3 }
fn default_group_delay() -> u64 { 1000 }
fn default_progress_interval() -> usize { 5 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            desktop_path: None,
            log_file: None,
            api: ApiConfig::default(),
            group_delay_ms: default_group_delay(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| RenamerError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override settings from environment-style variables.
    ///
    /// `lookup` is injected so tests do not have to mutate the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.api.api_key = key;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.api.model = model;
        }
        if let Some(value) = lookup("MAX_TOKENS") {
            self.api.max_tokens = parse_env("MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("API_TIMEOUT") {
            self.api.timeout_secs = parse_env("API_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("MAX_RETRIES") {
            self.api.max_retries = parse_env("MAX_RETRIES", &value)?;
        }
        if let Some(path) = lookup("DESKTOP_PATH") {
            self.desktop_path = Some(path);
        }
        Ok(())
    }

    /// Directory that is scanned for screenshots
    pub fn desktop_dir(&self) -> PathBuf {
        match &self.desktop_path {
            Some(path) => PathBuf::from(path),
            None => home_dir().join("Desktop"),
        }
    }

    /// Where the session log is appended
    pub fn log_file_path(&self) -> PathBuf {
        match &self.log_file {
            Some(path) => PathBuf::from(path),
            None => self.desktop_dir().join(LOG_FILE_NAME),
        }
    }

    /// Check that a run can proceed: credential present, directory usable
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            return Err(RenamerError::Config(
                "OpenAI API key not found. Set OPENAI_API_KEY in the environment \
                 or in the config file."
                    .to_string(),
            ));
        }

        let dir = self.desktop_dir();
        if !dir.is_dir() {
            return Err(RenamerError::Config(format!(
                "Desktop directory not found at {}",
                dir.display()
            )));
        }
        if !crate::catalog::dir_is_writable(&dir) {
            return Err(RenamerError::Config(format!(
                "No write permission to desktop directory {}",
                dir.display()
            )));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RenamerError::Config(format!("{} must be a non-negative integer, got '{}'", name, value))
    })
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.max_tokens, 50);
        assert_eq!(config.group_delay_ms, 1000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_MODEL", "gpt-4o-mini"),
                ("API_TIMEOUT", "10"),
                ("MAX_RETRIES", "1"),
                ("DESKTOP_PATH", "/tmp/shots"),
            ]))
            .unwrap();

        assert_eq!(config.api.api_key, "sk-test");
        assert_eq!(config.api.model, "gpt-4o-mini");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.max_retries, 1);
        assert_eq!(config.desktop_dir(), PathBuf::from("/tmp/shots"));
        assert_eq!(config.log_file_path(), PathBuf::from("/tmp/shots").join(LOG_FILE_NAME));
    }

    #[test]
    fn test_bad_numeric_env_is_config_error() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("MAX_RETRIES", "lots")])).unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES"));
    }

    #[test]
    fn test_api_key_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.api.api_key = "sk-secret".to_string();
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-secret"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: AppConfig = serde_json::from_str(r#"{"api": {"model": "custom"}}"#).unwrap();
        assert_eq!(parsed.api.model, "custom");
        assert_eq!(parsed.api.max_retries, 3);
        assert_eq!(parsed.progress_interval, 5);
    }

    #[test]
    fn test_validate_requires_key() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.desktop_path = Some(dir.path().to_string_lossy().to_string());
        assert!(config.validate().is_err());

        config.api.api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_directory() {
        let mut config = AppConfig::default();
        config.api.api_key = "sk-test".to_string();
        config.desktop_path = Some("/definitely/not/here".to_string());
        assert!(config.validate().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_checks_real_write_access() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.api.api_key = "sk-test".to_string();
        config.desktop_path = Some(dir.path().to_string_lossy().to_string());

        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
        let can_write = std::fs::File::create(dir.path().join("write-check")).is_ok();
        let _ = std::fs::remove_file(dir.path().join("write-check"));
        assert_eq!(config.validate().is_ok(), can_write);

        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(config.validate().is_ok());
    }
}
