//! Configuration file handling.
//!
//! This module handles loading `.review-notifier.toml`, applying environment
//! overrides and CLI arguments, and resolving the result into the settings
//! the pipeline and notifier are built from.

use crate::notify::AutopilotConfig;
use crate::pipeline::PipelineSettings;
use crate::window::{ReportingPeriod, WindowMode};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".review-notifier.toml";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "AUTOPILOT_API_KEY";

/// Environment variable holding the report recipient.
pub const TARGET_EMAIL_ENV: &str = "TARGET_EMAIL";

/// Environment variable holding the record export path.
pub const RECORDS_PATH_ENV: &str = "REVIEW_RECORDS_PATH";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Email provider and recipients.
    #[serde(default)]
    pub email: EmailConfig,

    /// Where review records are read from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Report period selection.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Email provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Transactional send endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Provider API key. Usually supplied through `AUTOPILOT_API_KEY`.
    #[serde(default)]
    pub api_key: String,

    /// Report recipient. Usually supplied through `TARGET_EMAIL`.
    #[serde(default)]
    pub to: String,

    /// Addresses copied on every report.
    #[serde(default)]
    pub cc: Vec<String>,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Provider-side email name.
    #[serde(default = "default_email_name")]
    pub email_name: String,

    /// Value recorded as the contact's signup context.
    #[serde(default = "default_source_context")]
    pub source_context: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            to: String::new(),
            cc: Vec::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            email_name: default_email_name(),
            source_context: default_source_context(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.ap3api.com/v1/transactional/send".to_string()
}

fn default_from_email() -> String {
    "reports@example.com".to_string()
}

fn default_from_name() -> String {
    "Review Reports <reports@example.com>".to_string()
}

fn default_email_name() -> String {
    "monthly-review-report".to_string()
}

fn default_source_context() -> String {
    "Review Notifier".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Record source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to a JSON export of the review table scan.
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
        }
    }
}

fn default_records_path() -> PathBuf {
    PathBuf::from("review-records.json")
}

/// Report settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// How record timestamps are matched to the reporting month.
    #[serde(default)]
    pub window: WindowMode,

    /// Fixed reporting period as `YYYY-MM`. Defaults to the previous month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, skipping empty values.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(API_KEY_ENV) {
            self.email.api_key = key;
        }
        if let Some(to) = get(TARGET_EMAIL_ENV) {
            self.email.to = to;
        }
        if let Some(path) = get(RECORDS_PATH_ENV) {
            self.source.records_path = PathBuf::from(path);
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file and environment settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref records) = args.records {
            self.source.records_path = records.clone();
        }
        if let Some(ref to) = args.to {
            self.email.to = to.clone();
        }
        if let Some(ref cc) = args.cc {
            self.email.cc = cc.clone();
        }
        if let Some(window) = args.window {
            self.report.window = window;
        }
        if let Some(ref period) = args.period {
            self.report.period = Some(period.clone());
        }
        if let Some(timeout) = args.timeout {
            self.email.timeout_seconds = timeout;
        }
    }

    /// Check that everything needed for a real send is present.
    pub fn validate(&self, dry_run: bool) -> Result<()> {
        self.reporting_period()?;

        if dry_run {
            return Ok(());
        }
        if self.email.api_key.trim().is_empty() {
            bail!("No email provider API key configured (set {})", API_KEY_ENV);
        }
        if self.email.to.trim().is_empty() {
            bail!("No report recipient configured (set {})", TARGET_EMAIL_ENV);
        }
        if !self.email.api_url.starts_with("http://") && !self.email.api_url.starts_with("https://")
        {
            bail!("Email API URL must start with 'http://' or 'https://'");
        }
        if self.email.timeout_seconds == 0 {
            bail!("Email timeout must be at least 1 second");
        }
        Ok(())
    }

    /// The fixed reporting period, if one is configured.
    pub fn reporting_period(&self) -> Result<Option<ReportingPeriod>> {
        self.report
            .period
            .as_deref()
            .map(|p| p.parse::<ReportingPeriod>().map_err(anyhow::Error::msg))
            .transpose()
            .context("Invalid report period")
    }

    /// Settings for the pipeline run.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            window: self.report.window,
            period: self.reporting_period()?,
            to: self.email.to.clone(),
            cc: self.email.cc.clone(),
            email_name: self.email.email_name.clone(),
        })
    }

    /// Settings for the Autopilot client.
    pub fn autopilot(&self) -> AutopilotConfig {
        AutopilotConfig {
            api_url: self.email.api_url.clone(),
            api_key: self.email.api_key.clone(),
            from_email: self.email.from_email.clone(),
            from_name: self.email.from_name.clone(),
            source_context: self.email.source_context.clone(),
            timeout_seconds: self.email.timeout_seconds,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
