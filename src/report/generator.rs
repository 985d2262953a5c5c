//! HTML report generation.
//!
//! This module renders the monthly rating summary as the HTML body of the
//! notification email, and as JSON for dry runs.

use crate::analysis::format_percentage;
use crate::models::{Rating, ReviewSummary};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate the complete HTML report.
pub fn generate_html_report(summary: &ReviewSummary) -> String {
    let mut output = String::new();

    output.push_str("<html>\n<body>\n");
    output.push_str(&generate_heading(summary));
    output.push_str(&generate_rating_section(summary));
    output.push_str(&generate_notices(summary));
    output.push_str("</body>\n</html>\n");

    output
}

fn generate_heading(summary: &ReviewSummary) -> String {
    format!(
        "  <h3 style=\"font-size: 24px;\">{} Reviews</h3>\n",
        escape_html(summary.period.label())
    )
}

/// Generate the five rating lines and the total line.
fn generate_rating_section(summary: &ReviewSummary) -> String {
    let mut section = String::new();
    let total = summary.total();

    section.push_str("  <p>\n");
    for rating in Rating::all() {
        section.push_str(&format!("    {}<br/>\n", rating_line(summary, rating)));
    }

    let total_share = if total == 0 { "n/a" } else { "100%" };
    section.push_str(&format!("    Total = {} reviews ({})\n", total, total_share));
    section.push_str("  </p>\n");

    section
}

fn rating_line(summary: &ReviewSummary, rating: Rating) -> String {
    format!(
        "Rating {} = {} reviews ({})",
        rating,
        summary.tally.count(rating),
        format_percentage(&summary.tally, rating)
    )
}

/// Notices for an empty month or rejected input.
fn generate_notices(summary: &ReviewSummary) -> String {
    let mut notices = String::new();

    if summary.total() == 0 {
        notices.push_str("  <p><em>No reviews were recorded for this period.</em></p>\n");
    }

    if !summary.skipped.is_empty() {
        notices.push_str(&format!(
            "  <p><small>{} input(s) were excluded because they were malformed.</small></p>\n",
            summary.skipped.len()
        ));
    }

    notices
}

/// Subject line for the notification email.
pub fn email_subject(summary: &ReviewSummary) -> String {
    format!("Monthly Review Report - [{}]", summary.period.label())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Generate a JSON report.
pub fn generate_json_report(summary: &ReviewSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write a rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregationInputError;
    use crate::models::RatingTally;
    use crate::window::ReportingPeriod;

    fn create_test_summary(ratings: &[u8]) -> ReviewSummary {
        let mut tally = RatingTally::default();
        for r in ratings {
            tally.record(Rating::new(*r).unwrap());
        }

        ReviewSummary {
            period: ReportingPeriod::new(2026, 9).unwrap(),
            records_in_window: ratings.len(),
            raw_reviews: ratings.len(),
            unique_reviews: ratings.len(),
            tally,
            skipped: vec![],
        }
    }

    #[test]
    fn test_generate_html_report() {
        let summary = create_test_summary(&[5, 5, 4, 1]);
        let html = generate_html_report(&summary);

        assert!(html.contains("September Reviews"));
        assert!(html.contains("Rating 1 = 1 reviews (25.00%)"));
        assert!(html.contains("Rating 2 = 0 reviews (0.00%)"));
        assert!(html.contains("Rating 4 = 1 reviews (25.00%)"));
        assert!(html.contains("Rating 5 = 2 reviews (50.00%)"));
        assert!(html.contains("Total = 4 reviews (100%)"));
        assert!(!html.contains("No reviews were recorded"));
    }

    #[test]
    fn test_generate_html_report_empty_month() {
        let summary = create_test_summary(&[]);
        let html = generate_html_report(&summary);

        for rating in 1..=5 {
            assert!(html.contains(&format!("Rating {} = 0 reviews (n/a)", rating)));
        }
        assert!(html.contains("Total = 0 reviews (n/a)"));
        assert!(html.contains("No reviews were recorded for this period."));
        assert!(!html.contains("NaN"));
    }

    #[test]
    fn test_generate_html_report_two_decimals() {
        let summary = create_test_summary(&[1, 2, 2]);
        let html = generate_html_report(&summary);

        assert!(html.contains("Rating 1 = 1 reviews (33.33%)"));
        assert!(html.contains("Rating 2 = 2 reviews (66.67%)"));
    }

    #[test]
    fn test_skipped_notice() {
        let mut summary = create_test_summary(&[3]);
        summary.skipped.push(AggregationInputError::InvalidRating {
            identifier: "google-9".to_string(),
            rating: "7".to_string(),
        });

        let html = generate_html_report(&summary);
        assert!(html.contains("1 input(s) were excluded"));
    }

    #[test]
    fn test_email_subject() {
        let summary = create_test_summary(&[]);
        assert_eq!(email_subject(&summary), "Monthly Review Report - [September]");
    }

    #[test]
    fn test_generate_json_report() {
        let summary = create_test_summary(&[5]);
        let json = generate_json_report(&summary).unwrap();

        assert!(json.contains("\"period\""));
        assert!(json.contains("\"tally\""));
        assert!(json.contains("\"5\": 1"));
        assert!(json.contains("\"skipped\""));
    }
}
