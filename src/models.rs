//! Data models for the review notifier.
//!
//! This module contains the records read from the review store, the
//! deduplicated reviews derived from them, and the rating tally that the
//! report is built from.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::AggregationInputError;
use crate::window::ReportingPeriod;

/// A single review as recorded by its source platform.
///
/// `source` and `id` are kept as stored. Platforms disagree on whether ids
/// are numbers or strings, and older rows hold the odd `null` or boolean.
/// An absent field stays `None`; a stored `null` is `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawReview {
    /// Tag of the originating platform (e.g. "google", "productreview").
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<Value>,
    /// Id of the review, unique within `source`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    /// Star rating. Kept untyped until aggregation validates it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<Value>,
    /// Any other fields the platform stored alongside the review.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawReview {
    /// Builds the composite `source-id` key used for deduplication.
    ///
    /// An absent component renders as `undefined` and a stored `null` as
    /// `null`, so malformed reviews still collapse onto a shared key instead
    /// of being dropped.
    pub fn unique_identifier(&self) -> String {
        format!(
            "{}-{}",
            key_part(self.source.as_ref()),
            key_part(self.id.as_ref())
        )
    }
}

/// Renders one component of the dedup key.
fn key_part(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => number_text(n),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => key_part(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// Integral floats print without a fraction (`4.0` keys as `4`).
fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// One row of the review store: a batch of reviews collected together.
///
/// Rows are read leniently. A missing or unreadable `addedOn` leaves
/// `added_on` empty and the window stage skips the row; a `data` value that
/// is not an array reads as absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchRecord {
    /// When the batch was written to the store.
    #[serde(
        rename = "addedOn",
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub added_on: Option<DateTime<Utc>>,
    /// The reviews in this batch. Older rows may lack the field entirely.
    #[serde(
        default,
        deserialize_with = "deserialize_reviews",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Vec<RawReview>>,
}

/// A review after deduplication, carrying its composite key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueReview {
    #[serde(rename = "uniqueIdentifier")]
    pub unique_identifier: String,
    #[serde(flatten)]
    pub review: RawReview,
}

impl UniqueReview {
    pub fn new(review: RawReview) -> Self {
        Self {
            unique_identifier: review.unique_identifier(),
            review,
        }
    }
}

/// A validated star rating in the range 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// All ratings in ascending order.
    pub fn all() -> impl Iterator<Item = Rating> {
        (Self::MIN..=Self::MAX).map(Rating)
    }

    /// Creates a rating, returning `None` when out of range.
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Rating(value))
    }

    /// Interprets a stored rating value.
    ///
    /// Accepts integers, integral floats (`4.0`) and numeric strings (`"4"`).
    pub fn from_value(value: &Value) -> Option<Self> {
        let n = match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => i,
                None => {
                    let f = n.as_f64()?;
                    if f.fract() != 0.0 {
                        return None;
                    }
                    f as i64
                }
            },
            Value::String(s) => s.trim().parse::<i64>().ok()?,
            _ => return None,
        };
        u8::try_from(n).ok().and_then(Self::new)
    }

    fn index(self) -> usize {
        usize::from(self.0 - Self::MIN)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Count of reviews per star rating.
///
/// Serializes as a map keyed `"1"` to `"5"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingTally {
    counts: [usize; 5],
}

impl RatingTally {
    pub fn record(&mut self, rating: Rating) {
        self.counts[rating.index()] += 1;
    }

    pub fn count(&self, rating: Rating) -> usize {
        self.counts[rating.index()]
    }

    /// Total number of tallied reviews.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Share of reviews with this rating, in percent.
    ///
    /// Returns `None` when nothing was tallied.
    pub fn percentage(&self, rating: Rating) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(self.count(rating) as f64 / total as f64 * 100.0)
    }

    /// Iterates `(rating, count)` pairs from 1 to 5.
    pub fn iter(&self) -> impl Iterator<Item = (Rating, usize)> + '_ {
        Rating::all().map(move |r| (r, self.count(r)))
    }
}

impl Serialize for RatingTally {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.iter().map(|(rating, count)| (rating.to_string(), count)))
    }
}

/// The aggregate a report is rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    /// Month the summary covers.
    pub period: ReportingPeriod,
    /// Batch records that fell inside the period.
    pub records_in_window: usize,
    /// Reviews found in those records, duplicates included.
    pub raw_reviews: usize,
    /// Reviews left after deduplication, before rating validation.
    pub unique_reviews: usize,
    /// Per-rating counts of accepted reviews.
    pub tally: RatingTally,
    /// Inputs rejected during aggregation.
    pub skipped: Vec<AggregationInputError>,
}

impl ReviewSummary {
    pub fn total(&self) -> usize {
        self.tally.total()
    }
}

/// Keeps a field that was present, even as `null`, distinct from one that
/// was absent.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Reads `addedOn` as epoch milliseconds or as an ISO 8601 string.
///
/// Anything else, including an empty string, reads as `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(timestamp_from_value(&value))
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Reads `data` as a list of reviews.
///
/// An entry that is not a review object becomes an empty review, which
/// aggregation later rejects for its missing rating.
fn deserialize_reviews<'de, D>(deserializer: D) -> Result<Option<Vec<RawReview>>, D::Error>
where
    D: Deserializer<'de>,
{
    let reviews = match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
        ),
        _ => None,
    };
    Ok(reviews)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
