//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::window::{ReportingPeriod, WindowMode};
use clap::Parser;
use std::path::PathBuf;

/// Review Notifier - monthly customer review summary by email
///
/// Reads the stored review batches, keeps last month's, removes duplicates,
/// tallies the star ratings and emails an HTML summary through the
/// transactional email provider. The run result is printed as JSON.
///
/// Examples:
///   review-notifier --records reviews.json
///   review-notifier --records reviews.json --dry-run --output report.html
///   review-notifier --period 2026-08 --window month-of-year
///   review-notifier --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON export of the review table scan
    ///
    /// Can also be set via REVIEW_RECORDS_PATH env var or .review-notifier.toml.
    #[arg(long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Report recipient (overrides TARGET_EMAIL)
    #[arg(long, value_name = "EMAIL")]
    pub to: Option<String>,

    /// Addresses to copy (comma-separated)
    #[arg(long, value_name = "EMAILS", value_delimiter = ',')]
    pub cc: Option<Vec<String>>,

    /// Report on this month instead of the previous one (YYYY-MM)
    #[arg(long, value_name = "YYYY-MM")]
    pub period: Option<String>,

    /// How record timestamps are matched to the reporting month
    #[arg(long, value_name = "MODE")]
    pub window: Option<WindowMode>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .review-notifier.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Email provider request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Build the report without sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the rendered report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Format of the file written by --output
    #[arg(long, default_value = "html", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Exit with code 2 when the report was not delivered
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .review-notifier.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// HTML email body (default)
    #[default]
    Html,
    /// JSON summary
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref period) = self.period {
            period.parse::<ReportingPeriod>()?;
        }

        if let Some(ref to) = self.to {
            if !to.contains('@') {
                return Err(format!("Recipient is not an email address: {}", to));
            }
        }

        if let Some(ref cc) = self.cc {
            if let Some(bad) = cc.iter().find(|c| !c.contains('@')) {
                return Err(format!("CC entry is not an email address: {}", bad));
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref records) = self.records {
            if !records.is_file() {
                return Err(format!("Records file does not exist: {}", records.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            records: None,
            to: None,
            cc: None,
            period: None,
            window: None,
            config: None,
            timeout: None,
            dry_run: false,
            output: None,
            format: OutputFormat::Html,
            strict: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "review-notifier",
            "--period",
            "2026-08",
            "--window",
            "month-of-year",
            "--cc",
            "a@example.com,b@example.com",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.period.as_deref(), Some("2026-08"));
        assert_eq!(args.window, Some(WindowMode::MonthOfYear));
        assert_eq!(args.cc.map(|c| c.len()), Some(2));
        assert!(args.dry_run);
        assert_eq!(args.format, OutputFormat::Html);
    }

    #[test]
    fn test_validation_invalid_period() {
        let mut args = make_args();
        args.period = Some("2026-13".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_recipient() {
        let mut args = make_args();
        args.to = Some("not-an-address".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_records_file() {
        let mut args = make_args();
        args.records = Some(PathBuf::from("/nonexistent/reviews.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
