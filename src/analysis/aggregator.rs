//! Review deduplication and rating statistics.
//!
//! Reviews are flattened out of their batch records, collapsed onto their
//! `source-id` key and then tallied by star rating.

use crate::error::AggregationInputError;
use crate::models::{BatchRecord, Rating, RatingTally, ReviewSummary, UniqueReview};
use crate::window::ReportingPeriod;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Reviews left after deduplication, plus any records that had no reviews.
#[derive(Debug, Clone, Default)]
pub struct FlattenedReviews {
    pub reviews: Vec<UniqueReview>,
    pub skipped: Vec<AggregationInputError>,
    /// Number of reviews before deduplication.
    pub flattened: usize,
}

/// Expand batch records into individual reviews and drop duplicates.
///
/// A later review with the same key replaces the earlier one but keeps the
/// position where that key was first seen.
pub fn flatten_unique(records: &[BatchRecord]) -> FlattenedReviews {
    let mut unique: IndexMap<String, UniqueReview> = IndexMap::new();
    let mut skipped = Vec::new();
    let mut flattened = 0;

    for record in records {
        let Some(data) = &record.data else {
            let error = AggregationInputError::MissingData {
                added_on: record.added_on,
            };
            warn!("Skipping record: {}", error);
            skipped.push(error);
            continue;
        };

        for review in data {
            flattened += 1;
            let entry = UniqueReview::new(review.clone());
            unique.insert(entry.unique_identifier.clone(), entry);
        }
    }

    debug!(
        "Flattened {} reviews into {} unique reviews",
        flattened,
        unique.len()
    );

    FlattenedReviews {
        reviews: unique.into_values().collect(),
        skipped,
        flattened,
    }
}

/// Tally reviews by rating.
///
/// Reviews whose rating is missing or outside 1-5 are left out of the tally
/// and returned as skipped inputs.
pub fn tally_ratings(reviews: &[UniqueReview]) -> (RatingTally, Vec<AggregationInputError>) {
    let mut tally = RatingTally::default();
    let mut skipped = Vec::new();

    for review in reviews {
        match review.review.rating.as_ref().and_then(Rating::from_value) {
            Some(rating) => tally.record(rating),
            None => {
                let error = AggregationInputError::InvalidRating {
                    identifier: review.unique_identifier.clone(),
                    rating: review
                        .review
                        .rating
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "undefined".to_string()),
                };
                warn!("Skipping review: {}", error);
                skipped.push(error);
            }
        }
    }

    (tally, skipped)
}

/// Build the summary for the records already restricted to `period`.
pub fn summarize(period: ReportingPeriod, records: &[BatchRecord]) -> ReviewSummary {
    let flattened = flatten_unique(records);
    let (tally, rating_errors) = tally_ratings(&flattened.reviews);

    let mut skipped = flattened.skipped;
    skipped.extend(rating_errors);

    ReviewSummary {
        period,
        records_in_window: records.len(),
        raw_reviews: flattened.flattened,
        unique_reviews: flattened.reviews.len(),
        tally,
        skipped,
    }
}

/// Format a rating's share of the total, or `n/a` when there is no data.
pub fn format_percentage(tally: &RatingTally, rating: Rating) -> String {
    match tally.percentage(rating) {
        Some(p) => format!("{:.2}%", p),
        None => "n/a".to_string(),
    }
}

/// Generate a one-line text summary, used for logs and dry runs.
pub fn generate_summary_text(summary: &ReviewSummary) -> String {
    let buckets: Vec<String> = summary
        .tally
        .iter()
        .map(|(rating, count)| format!("{}★ {}", rating, count))
        .collect();

    format!(
        "{} {}: {} reviews ({})",
        summary.period.label(),
        summary.period.year,
        summary.total(),
        buckets.join(", ")
    )
}
