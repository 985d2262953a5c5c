//! The monthly report run.
//!
//! Scan the store, keep the reporting month, deduplicate and tally, render,
//! send. Only a failed scan stops the run early; everything after it
//! degrades to a defined value and the run always produces a [`RunOutcome`].

use crate::analysis::{generate_summary_text, summarize};
use crate::models::ReviewSummary;
use crate::notify::{Delivery, Notifier, OutgoingEmail};
use crate::report::{email_subject, generate_html_report};
use crate::source::RecordSource;
use crate::window::{filter_window, ReportingPeriod, WindowMode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

/// Per-run settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window: WindowMode,
    /// Fixed period; when `None` the month before `now` is used.
    pub period: Option<ReportingPeriod>,
    pub to: String,
    pub cc: Vec<String>,
    pub email_name: String,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Delivered,
    NotDelivered,
    SourceError,
}

/// Result of one run, printed as JSON by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub period: ReportingPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReviewSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rendered body, kept for `--output`.
    #[serde(skip)]
    pub html: Option<String>,
}

impl RunOutcome {
    pub fn delivered(&self) -> bool {
        self.status == RunStatus::Delivered
    }
}

pub struct ReportPipeline {
    source: Box<dyn RecordSource>,
    notifier: Box<dyn Notifier>,
    settings: PipelineSettings,
}

impl ReportPipeline {
    pub fn new(
        source: Box<dyn RecordSource>,
        notifier: Box<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            settings,
        }
    }

    /// The period a run at `now` reports on.
    pub fn period_for(&self, now: DateTime<Utc>) -> ReportingPeriod {
        self.settings
            .period
            .unwrap_or_else(|| ReportingPeriod::previous_month(now))
    }

    /// Run the pipeline once.
    pub async fn run(&self, now: DateTime<Utc>) -> RunOutcome {
        let period = self.period_for(now);
        info!("Building review report for {} ({})", period.label(), period);

        let records = match self.source.scan_all().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to read review records: {}", e);
                return RunOutcome {
                    status: RunStatus::SourceError,
                    period,
                    summary: None,
                    delivery: None,
                    error: Some(e.to_string()),
                    html: None,
                };
            }
        };
        info!("Scanned {} records", records.len());

        let windowed = filter_window(records, &period, self.settings.window);
        let mut summary = summarize(period, &windowed.records);
        if !windowed.skipped.is_empty() {
            let mut skipped = windowed.skipped;
            skipped.append(&mut summary.skipped);
            summary.skipped = skipped;
        }
        info!("{}", generate_summary_text(&summary));

        let html = generate_html_report(&summary);
        let email = OutgoingEmail {
            to: self.settings.to.clone(),
            cc: self.settings.cc.clone(),
            subject: email_subject(&summary),
            email_name: self.settings.email_name.clone(),
            html_body: html.clone(),
        };

        let delivery = self.notifier.send(&email).await;
        let status = if delivery.delivered {
            RunStatus::Delivered
        } else {
            RunStatus::NotDelivered
        };

        RunOutcome {
            status,
            period,
            summary: Some(summary),
            delivery: Some(delivery),
            error: None,
            html: Some(html),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::models::{BatchRecord, Rating};
    use crate::error::AggregationInputError;
    use crate::source::{JsonFileSource, MemorySource};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Records every email and answers with a fixed delivery.
    #[derive(Clone)]
    struct RecordingNotifier {
        response: Delivery,
        sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    }

    impl RecordingNotifier {
        fn answering(response: Delivery) -> Self {
            Self {
                response,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, email: &OutgoingEmail) -> Delivery {
            self.sent.lock().unwrap().push(email.clone());
            self.response.clone()
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            window: WindowMode::CalendarMonth,
            period: None,
            to: "ops@example.com".to_string(),
            cc: vec!["lead@example.com".to_string()],
            email_name: "monthly-review-report".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    fn record(day: u32, month: u32, reviews: serde_json::Value) -> BatchRecord {
        serde_json::from_value(json!({
            "addedOn": Utc.with_ymd_and_hms(2026, month, day, 0, 0, 0).unwrap().to_rfc3339(),
            "data": reviews,
        }))
        .unwrap()
    }

    fn pipeline(records: Vec<BatchRecord>, notifier: &RecordingNotifier) -> ReportPipeline {
        ReportPipeline::new(
            Box::new(MemorySource::new(records)),
            Box::new(notifier.clone()),
            settings(),
        )
    }

    #[tokio::test]
    async fn test_run_deduplicates_and_sends() {
        let notifier = RecordingNotifier::answering(Delivery::sent());
        let records = vec![
            record(2, 9, json!([{"source": "google", "id": "a", "rating": 5}])),
            record(9, 9, json!([{"source": "google", "id": "a", "rating": 5}])),
            record(16, 9, json!([{"source": "google", "id": "b", "rating": 3}])),
        ];

        let outcome = pipeline(records, &notifier).run(now()).await;

        assert_eq!(outcome.status, RunStatus::Delivered);
        let summary = outcome.summary.unwrap();
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.tally.count(Rating::new(5).unwrap()), 1);
        assert_eq!(summary.tally.count(Rating::new(3).unwrap()), 1);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Monthly Review Report - [September]");
        assert_eq!(sent[0].cc, vec!["lead@example.com".to_string()]);
        assert!(sent[0].html_body.contains("Rating 5 = 1 reviews (50.00%)"));
        assert!(sent[0].html_body.contains("Rating 3 = 1 reviews (50.00%)"));
    }

    #[tokio::test]
    async fn test_run_empty_window_still_notifies() {
        let notifier = RecordingNotifier::answering(Delivery::sent());
        let records = vec![record(
            5,
            10,
            json!([{"source": "google", "id": "a", "rating": 4}]),
        )];

        let outcome = pipeline(records, &notifier).run(now()).await;

        assert_eq!(outcome.summary.as_ref().map(|s| s.total()), Some(0));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html_body.contains("Rating 1 = 0 reviews (n/a)"));
        assert!(sent[0].html_body.contains("No reviews were recorded"));
    }

    #[tokio::test]
    async fn test_run_provider_error_completes() {
        let notifier = RecordingNotifier::answering(Delivery::failed(NotifyError::Provider(
            "Invalid asset".to_string(),
        )));
        let records = vec![record(
            3,
            9,
            json!([{"source": "google", "id": "a", "rating": 2}]),
        )];

        let outcome = pipeline(records, &notifier).run(now()).await;

        assert_eq!(outcome.status, RunStatus::NotDelivered);
        assert!(!outcome.delivered());
        assert!(outcome.summary.is_some());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "not_delivered");
        assert_eq!(json["delivery"]["delivered"], false);
        assert_eq!(json["delivery"]["error"]["kind"], "provider");
    }

    #[tokio::test]
    async fn test_run_excludes_invalid_rating() {
        let notifier = RecordingNotifier::answering(Delivery::sent());
        let records = vec![record(
            12,
            9,
            json!([
                {"source": "google", "id": "a", "rating": 7},
                {"source": "google", "id": "b", "rating": 4},
                {"source": "google", "id": "c", "rating": 4}
            ]),
        )];

        let outcome = pipeline(records, &notifier).run(now()).await;

        let summary = outcome.summary.unwrap();
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.tally.count(Rating::new(4).unwrap()), 2);
        assert!(notifier.sent.lock().unwrap()[0]
            .html_body
            .contains("Rating 4 = 2 reviews (100.00%)"));
    }

    #[tokio::test]
    async fn test_run_source_error_skips_notification() {
        let notifier = RecordingNotifier::answering(Delivery::sent());
        let pipeline = ReportPipeline::new(
            Box::new(MemorySource::failing("ResourceNotFoundException")),
            Box::new(notifier.clone()),
            settings(),
        );

        let outcome = pipeline.run(now()).await;

        assert_eq!(outcome.status, RunStatus::SourceError);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("ResourceNotFoundException"));
        assert!(outcome.summary.is_none());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_with_fixed_period() {
        let notifier = RecordingNotifier::answering(Delivery::sent());
        let records = vec![record(
            20,
            3,
            json!([{"source": "google", "id": "a", "rating": 1}]),
        )];
        let pipeline = ReportPipeline::new(
            Box::new(MemorySource::new(records)),
            Box::new(notifier.clone()),
            PipelineSettings {
                period: ReportingPeriod::new(2026, 3),
                ..settings()
            },
        );

        let outcome = pipeline.run(now()).await;

        assert_eq!(outcome.period, ReportingPeriod::new(2026, 3).unwrap());
        assert_eq!(outcome.summary.map(|s| s.total()), Some(1));
        assert_eq!(
            notifier.sent.lock().unwrap()[0].subject,
            "Monthly Review Report - [March]"
        );
    }

    #[tokio::test]
    async fn test_run_tolerates_badly_typed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            json!([
                {"addedOn": "2026-09-02T10:00:00Z", "data": [{"source": "google", "id": "a", "rating": 5}]},
                {"addedOn": "2026-09-03T10:00:00Z", "data": [{"source": 42, "id": "b", "rating": 4}]},
                {"addedOn": "2026-09-04T10:00:00Z", "data": [{"source": "google", "id": true, "rating": 3}]},
                {"addedOn": "", "data": [{"source": "google", "id": "c", "rating": 1}]}
            ])
            .to_string()
            .as_bytes(),
        )
        .unwrap();

        let notifier = RecordingNotifier::answering(Delivery::sent());
        let pipeline = ReportPipeline::new(
            Box::new(JsonFileSource::new(file.path())),
            Box::new(notifier.clone()),
            settings(),
        );

        let outcome = pipeline.run(now()).await;

        assert_eq!(outcome.status, RunStatus::Delivered);
        let summary = outcome.summary.unwrap();
        assert_eq!(summary.records_in_window, 3);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.tally.count(Rating::new(4).unwrap()), 1);
        assert_eq!(summary.tally.count(Rating::new(3).unwrap()), 1);
        assert_eq!(summary.tally.count(Rating::new(1).unwrap()), 0);
        assert_eq!(
            summary.skipped,
            vec![AggregationInputError::InvalidTimestamp { position: 3 }]
        );
        assert!(notifier.sent.lock().unwrap()[0]
            .html_body
            .contains("1 input(s) were excluded"));
    }
}
