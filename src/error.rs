//! Error types for the review pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reading records from the review store. Ends the run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read records from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse records from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Input rejected while aggregating. The run continues without it.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationInputError {
    #[error("review {identifier} has rating {rating}, expected 1-5")]
    InvalidRating { identifier: String, rating: String },

    #[error("batch record added on {} has no review data", describe_timestamp(.added_on))]
    MissingData { added_on: Option<DateTime<Utc>> },

    #[error("batch record #{position} has no readable addedOn timestamp")]
    InvalidTimestamp { position: usize },
}

fn describe_timestamp(added_on: &Option<DateTime<Utc>>) -> String {
    added_on
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "an unknown date".to_string())
}

/// Failure delivering the report. Reported as `delivered = false`.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum NotifyError {
    #[error("email rejected before sending: {0}")]
    InvalidEmail(String),

    #[error("request to email provider failed: {0}")]
    Transport(String),

    #[error("email provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode email provider response: {0}")]
    Decode(String),

    #[error("email provider reported an error: {0}")]
    Provider(String),
}
